use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Policy;
use crate::models::ScoreTarget;
use crate::store::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreAward {
    pub bonus: f64,
    pub blackmarks: f64,
}

impl ScoreAward {
    pub fn credit(self, target: ScoreTarget) -> Write {
        Write::Credit {
            target,
            bonus: self.bonus,
            blackmarks: self.blackmarks,
        }
    }
}

/// Hours between the deadline and the completion, negative when early.
pub fn delay_hours(eta: DateTime<Utc>, completed_at: DateTime<Utc>) -> f64 {
    (completed_at - eta).num_milliseconds() as f64 / 3_600_000.0
}

/// Bonus and blackmarks earned by one completed assignment.
pub fn score_completion(
    policy: &Policy,
    eta: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    rating: u8,
    override_blackmark: bool,
) -> ScoreAward {
    let delay = delay_hours(eta, completed_at);

    let mut bonus = 0.0;
    if delay <= 0.0 {
        bonus += policy.bonus_on_time;
    }
    bonus += policy.star_bonus(rating);

    let mut blackmarks = 0.0;
    if delay > 1.0 && !override_blackmark {
        blackmarks += delay.floor() * policy.bm_delay_per_hr;
    }

    ScoreAward { bonus, blackmarks }
}

/// Score a completion and produce the single ledger write that records it.
/// Task completions reach the ledger through here and nowhere else.
pub fn apply_score(
    policy: &Policy,
    target: ScoreTarget,
    eta: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    rating: u8,
    override_blackmark: bool,
) -> (ScoreAward, Write) {
    let award = score_completion(policy, eta, completed_at, rating, override_blackmark);
    tracing::debug!(
        ?target,
        rating,
        bonus = award.bonus,
        blackmarks = award.blackmarks,
        "scored completion"
    );
    (award, award.credit(target))
}

/// Flat penalty charged to the original doer of reworked scope.
pub fn rework_penalty(policy: &Policy) -> ScoreAward {
    ScoreAward {
        bonus: 0.0,
        blackmarks: policy.bm_rework,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn eta() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 17, 0, 0).unwrap()
    }

    #[test]
    fn early_five_star_earns_on_time_and_star_bonus() {
        let policy = Policy::default();
        let award = score_completion(&policy, eta(), eta() - Duration::hours(1), 5, false);
        assert_eq!(award.bonus, policy.bonus_on_time + policy.bonus_star_5);
        assert_eq!(award.blackmarks, 0.0);
    }

    #[test]
    fn exactly_on_deadline_counts_as_on_time() {
        let award = score_completion(&Policy::default(), eta(), eta(), 2, false);
        assert_eq!(award.bonus, 3.0);
        assert_eq!(award.blackmarks, 0.0);
    }

    #[test]
    fn three_hours_late_costs_three_blackmarks() {
        let policy = Policy::default();
        let award = score_completion(&policy, eta(), eta() + Duration::hours(3), 3, false);
        assert_eq!(award.blackmarks, 3.0 * policy.bm_delay_per_hr);
        assert_eq!(award.bonus, policy.bonus_star_3);
    }

    #[test]
    fn within_the_first_hour_late_has_no_blackmark_and_no_on_time_bonus() {
        let award = score_completion(
            &Policy::default(),
            eta(),
            eta() + Duration::minutes(50),
            4,
            false,
        );
        assert_eq!(award.bonus, 2.0);
        assert_eq!(award.blackmarks, 0.0);
    }

    #[test]
    fn partial_hours_are_floored() {
        let policy = Policy {
            bm_delay_per_hr: 2.0,
            ..Policy::default()
        };
        let award = score_completion(&policy, eta(), eta() + Duration::minutes(150), 1, false);
        assert_eq!(award.blackmarks, 4.0);
        assert_eq!(award.bonus, 0.0);
    }

    #[test]
    fn override_suppresses_delay_blackmarks() {
        let award = score_completion(
            &Policy::default(),
            eta(),
            eta() + Duration::hours(30),
            5,
            true,
        );
        assert_eq!(award.blackmarks, 0.0);
        assert_eq!(award.bonus, 3.0);
    }

    #[test]
    fn apply_score_emits_one_credit_for_the_target() {
        let member = Uuid::new_v4();
        let (award, write) = apply_score(
            &Policy::default(),
            ScoreTarget::User(member),
            eta(),
            eta() + Duration::hours(2),
            4,
            false,
        );
        assert_eq!(
            write,
            Write::Credit {
                target: ScoreTarget::User(member),
                bonus: award.bonus,
                blackmarks: award.blackmarks,
            }
        );
        assert_eq!(award.blackmarks, 2.0);
    }

    #[test]
    fn rework_penalty_is_flat() {
        let award = rework_penalty(&Policy::default());
        assert_eq!(award.bonus, 0.0);
        assert_eq!(award.blackmarks, 5.0);
    }
}
