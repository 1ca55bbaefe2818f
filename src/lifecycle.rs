//! Assignment lifecycles.
//!
//! Each assignment kind has a finite transition table of
//! `(from, event) -> to` rows. A pair missing from the table is an
//! [`EngineError::InvalidTransition`], and so is a listed pair whose guard
//! fails. Every check runs before the record is touched, so a rejected event
//! leaves the aggregate unchanged.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Entity, GroupAssignment, MemberAssignment, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Start,
    Submit,
    Acknowledge,
    Reject,
    RevokeSubmission,
    RequestRejection,
    ConfirmRejection,
    RevokeRejection,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Submit => "submit",
            Self::Acknowledge => "acknowledge",
            Self::Reject => "reject",
            Self::RevokeSubmission => "revoke submission",
            Self::RequestRejection => "request rejection",
            Self::ConfirmRejection => "confirm rejection",
            Self::RevokeRejection => "revoke rejection",
        }
    }
}

type Row = (Status, EventKind, Status);

pub const GROUP_TRANSITIONS: &[Row] = &[
    (Status::Pending, EventKind::Start, Status::InProgress),
    (Status::InProgress, EventKind::Submit, Status::PendingAck),
    (Status::PendingAck, EventKind::Acknowledge, Status::Completed),
    (Status::PendingAck, EventKind::RevokeSubmission, Status::InProgress),
    (Status::Pending, EventKind::RequestRejection, Status::RejectionReq),
    (Status::InProgress, EventKind::RequestRejection, Status::RejectionReq),
    (Status::RejectionReq, EventKind::ConfirmRejection, Status::Rejected),
    (Status::RejectionReq, EventKind::RevokeRejection, Status::InProgress),
];

pub const MEMBER_TRANSITIONS: &[Row] = &[
    (Status::InProgress, EventKind::Submit, Status::PendingAck),
    (Status::PendingAck, EventKind::Acknowledge, Status::Completed),
    (Status::PendingAck, EventKind::Reject, Status::Rejected),
    (Status::PendingAck, EventKind::RevokeSubmission, Status::InProgress),
    (Status::InProgress, EventKind::RequestRejection, Status::RejectionReq),
    (Status::RejectionReq, EventKind::ConfirmRejection, Status::Rejected),
    (Status::RejectionReq, EventKind::RevokeRejection, Status::InProgress),
];

pub fn next_status(table: &[Row], from: Status, event: EventKind) -> Option<Status> {
    table
        .iter()
        .find(|(f, e, _)| *f == from && *e == event)
        .map(|(_, _, to)| *to)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Status,
    pub to: Status,
    pub event: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupEvent {
    Start,
    Submit,
    Acknowledge {
        rating: Option<u8>,
        override_blackmark: bool,
    },
    RevokeSubmission,
    RequestRejection {
        reason: Option<String>,
    },
    ConfirmRejection,
    RevokeRejection,
}

impl GroupEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start => EventKind::Start,
            Self::Submit => EventKind::Submit,
            Self::Acknowledge { .. } => EventKind::Acknowledge,
            Self::RevokeSubmission => EventKind::RevokeSubmission,
            Self::RequestRejection { .. } => EventKind::RequestRejection,
            Self::ConfirmRejection => EventKind::ConfirmRejection,
            Self::RevokeRejection => EventKind::RevokeRejection,
        }
    }

    /// The event a request to move from `current` to `target` stands for.
    pub fn for_target(
        current: Status,
        target: Status,
        rating: Option<u8>,
        override_blackmark: bool,
        reason: Option<String>,
    ) -> Option<Self> {
        match target {
            Status::Pending => None,
            Status::InProgress => Some(match current {
                Status::PendingAck => Self::RevokeSubmission,
                Status::RejectionReq => Self::RevokeRejection,
                _ => Self::Start,
            }),
            Status::PendingAck => Some(Self::Submit),
            Status::Completed => Some(Self::Acknowledge {
                rating,
                override_blackmark,
            }),
            Status::RejectionReq => Some(Self::RequestRejection { reason }),
            Status::Rejected => Some(Self::ConfirmRejection),
        }
    }
}

/// Facts about the rest of the ledger that group guards depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupGuards {
    pub completion_percent: u8,
    pub active_members: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Submission {
    pub completed_at: Option<DateTime<Utc>>,
    pub proof: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberEvent {
    Submit(Submission),
    Acknowledge {
        rating: Option<u8>,
        override_blackmark: bool,
    },
    Reject {
        reason: Option<String>,
    },
    RevokeSubmission,
    RequestRejection {
        reason: Option<String>,
    },
    ConfirmRejection,
    RevokeRejection,
}

impl MemberEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Submit(_) => EventKind::Submit,
            Self::Acknowledge { .. } => EventKind::Acknowledge,
            Self::Reject { .. } => EventKind::Reject,
            Self::RevokeSubmission => EventKind::RevokeSubmission,
            Self::RequestRejection { .. } => EventKind::RequestRejection,
            Self::ConfirmRejection => EventKind::ConfirmRejection,
            Self::RevokeRejection => EventKind::RevokeRejection,
        }
    }

    pub fn for_target(
        current: Status,
        target: Status,
        rating: Option<u8>,
        override_blackmark: bool,
        reason: Option<String>,
        submission: Submission,
    ) -> Option<Self> {
        match target {
            Status::Pending => None,
            Status::InProgress => match current {
                Status::PendingAck => Some(Self::RevokeSubmission),
                Status::RejectionReq => Some(Self::RevokeRejection),
                _ => None,
            },
            Status::PendingAck => Some(Self::Submit(submission)),
            Status::Completed => Some(Self::Acknowledge {
                rating,
                override_blackmark,
            }),
            Status::RejectionReq => Some(Self::RequestRejection { reason }),
            Status::Rejected => Some(match current {
                Status::PendingAck => Self::Reject { reason },
                _ => Self::ConfirmRejection,
            }),
        }
    }
}

fn refuse(
    entity: Entity,
    id: Uuid,
    from: Status,
    event: EventKind,
    reason: impl Into<String>,
) -> EngineError {
    let reason = reason.into();
    tracing::debug!(%entity, %id, %from, event = event.as_str(), %reason, "transition refused");
    EngineError::InvalidTransition {
        entity,
        id,
        from: from.as_str().to_string(),
        event: event.as_str(),
        reason,
    }
}

fn check_table(
    table: &[Row],
    entity: Entity,
    id: Uuid,
    from: Status,
    event: EventKind,
) -> Result<Status, EngineError> {
    next_status(table, from, event).ok_or_else(|| {
        let reason = if from.is_terminal() {
            format!("{from} is terminal")
        } else {
            "not a permitted transition".to_string()
        };
        refuse(entity, id, from, event, reason)
    })
}

fn check_rating(
    entity: Entity,
    id: Uuid,
    from: Status,
    rating: Option<u8>,
) -> Result<u8, EngineError> {
    match rating {
        Some(r @ 1..=5) => Ok(r),
        Some(r) => Err(refuse(
            entity,
            id,
            from,
            EventKind::Acknowledge,
            format!("rating {r} is outside 1..=5"),
        )),
        None => Err(refuse(
            entity,
            id,
            from,
            EventKind::Acknowledge,
            "a rating is required",
        )),
    }
}

fn check_reason(
    entity: Entity,
    id: Uuid,
    from: Status,
    event: EventKind,
    reason: &Option<String>,
) -> Result<String, EngineError> {
    match reason.as_deref().map(str::trim) {
        Some(r) if !r.is_empty() => Ok(r.to_string()),
        _ => Err(refuse(entity, id, from, event, "a reason is required")),
    }
}

pub fn apply_group_event(
    group: &mut GroupAssignment,
    event: &GroupEvent,
    guards: GroupGuards,
    now: DateTime<Utc>,
) -> Result<Transition, EngineError> {
    let entity = Entity::GroupAssignment;
    let from = group.status;
    let kind = event.kind();
    let to = check_table(GROUP_TRANSITIONS, entity, group.id, from, kind)?;

    match event {
        GroupEvent::Start | GroupEvent::ConfirmRejection => {}
        GroupEvent::Submit => {
            if guards.completion_percent < 100 {
                return Err(refuse(
                    entity,
                    group.id,
                    from,
                    kind,
                    format!("scope is {}% complete", guards.completion_percent),
                ));
            }
            group.completion_time = Some(now);
        }
        GroupEvent::Acknowledge { rating, .. } => {
            let rating = check_rating(entity, group.id, from, *rating)?;
            group.rating = Some(rating);
            group.completion_time = Some(now);
        }
        GroupEvent::RevokeSubmission => group.completion_time = None,
        GroupEvent::RequestRejection { reason } => {
            if guards.active_members > 0 {
                return Err(refuse(
                    entity,
                    group.id,
                    from,
                    kind,
                    format!("{} member assignment(s) are still active", guards.active_members),
                ));
            }
            group.rejection_reason = Some(check_reason(entity, group.id, from, kind, reason)?);
        }
        GroupEvent::RevokeRejection => group.rejection_reason = None,
    }

    group.status = to;
    Ok(Transition { from, to, event: kind })
}

pub fn apply_member_event(
    member: &mut MemberAssignment,
    event: &MemberEvent,
    allow_time_edit: bool,
    now: DateTime<Utc>,
) -> Result<Transition, EngineError> {
    let entity = Entity::MemberAssignment;
    let from = member.status;
    let kind = event.kind();
    let to = check_table(MEMBER_TRANSITIONS, entity, member.id, from, kind)?;

    match event {
        MemberEvent::Submit(submission) => {
            let completed_at = match submission.completed_at {
                Some(_) if !allow_time_edit => return Err(EngineError::TimeEditDisabled),
                Some(at) => at,
                None => now,
            };
            member.completion_time = Some(completed_at);
            if submission.proof.is_some() {
                member.proof = submission.proof.clone();
            }
            if submission.remarks.is_some() {
                member.remarks = submission.remarks.clone();
            }
        }
        MemberEvent::Acknowledge { rating, .. } => {
            let rating = check_rating(entity, member.id, from, *rating)?;
            member.rating = Some(rating);
            if member.completion_time.is_none() {
                member.completion_time = Some(now);
            }
        }
        MemberEvent::Reject { reason } | MemberEvent::RequestRejection { reason } => {
            member.rejection_reason = Some(check_reason(entity, member.id, from, kind, reason)?);
        }
        MemberEvent::ConfirmRejection => {}
        MemberEvent::RevokeSubmission => member.completion_time = None,
        MemberEvent::RevokeRejection => member.rejection_reason = None,
    }

    member.status = to;
    Ok(Transition { from, to, event: kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap()
    }

    fn group(status: Status) -> GroupAssignment {
        GroupAssignment {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            scope: Scope::default(),
            file_size: "2GB".to_string(),
            assigned_time: now() - Duration::days(2),
            eta: now(),
            status,
            rating: None,
            remarks: None,
            completion_time: None,
            rejection_reason: None,
            version: 0,
        }
    }

    fn member(status: Status) -> MemberAssignment {
        MemberAssignment {
            id: Uuid::new_v4(),
            group_assignment_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            scope: Scope::default(),
            assigned_time: now() - Duration::days(1),
            eta: now(),
            completion_time: None,
            status,
            rating: None,
            remarks: None,
            rework_from_id: None,
            bonus_awarded: 0.0,
            blackmarks_awarded: 0.0,
            rejection_reason: None,
            proof: None,
            version: 0,
        }
    }

    const DONE: GroupGuards = GroupGuards {
        completion_percent: 100,
        active_members: 0,
    };

    #[test]
    fn tables_have_no_exits_from_terminal_states() {
        for table in [GROUP_TRANSITIONS, MEMBER_TRANSITIONS] {
            assert!(table.iter().all(|(from, _, _)| !from.is_terminal()));
        }
    }

    #[test]
    fn members_never_enter_pending() {
        assert!(MEMBER_TRANSITIONS
            .iter()
            .all(|(from, _, to)| *from != Status::Pending && *to != Status::Pending));
    }

    #[test]
    fn group_happy_path() {
        let mut g = group(Status::Pending);
        apply_group_event(&mut g, &GroupEvent::Start, DONE, now()).unwrap();
        apply_group_event(&mut g, &GroupEvent::Submit, DONE, now()).unwrap();
        assert_eq!(g.status, Status::PendingAck);
        let t = apply_group_event(
            &mut g,
            &GroupEvent::Acknowledge {
                rating: Some(4),
                override_blackmark: false,
            },
            DONE,
            now(),
        )
        .unwrap();
        assert_eq!(t.from, Status::PendingAck);
        assert_eq!(t.to, Status::Completed);
        assert_eq!(g.rating, Some(4));
        assert_eq!(g.completion_time, Some(now()));
    }

    #[test]
    fn group_submit_requires_full_completion() {
        let mut g = group(Status::InProgress);
        let guards = GroupGuards {
            completion_percent: 50,
            active_members: 1,
        };
        let err = apply_group_event(&mut g, &GroupEvent::Submit, guards, now()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert_eq!(g.status, Status::InProgress);
        assert_eq!(g.completion_time, None);
    }

    #[test]
    fn group_acknowledge_without_rating_is_refused() {
        let mut g = group(Status::PendingAck);
        let event = GroupEvent::Acknowledge {
            rating: None,
            override_blackmark: false,
        };
        assert!(apply_group_event(&mut g, &event, DONE, now()).is_err());
        let event = GroupEvent::Acknowledge {
            rating: Some(6),
            override_blackmark: false,
        };
        assert!(apply_group_event(&mut g, &event, DONE, now()).is_err());
        assert_eq!(g.status, Status::PendingAck);
    }

    #[test]
    fn group_rejection_blocked_by_active_members() {
        let mut g = group(Status::InProgress);
        let event = GroupEvent::RequestRejection {
            reason: Some("wrong drawings".to_string()),
        };
        let busy = GroupGuards {
            completion_percent: 0,
            active_members: 2,
        };
        assert!(apply_group_event(&mut g, &event, busy, now()).is_err());

        apply_group_event(&mut g, &event, DONE, now()).unwrap();
        assert_eq!(g.status, Status::RejectionReq);
        assert_eq!(g.rejection_reason.as_deref(), Some("wrong drawings"));

        apply_group_event(&mut g, &GroupEvent::RevokeRejection, DONE, now()).unwrap();
        assert_eq!(g.status, Status::InProgress);
        assert_eq!(g.rejection_reason, None);
    }

    #[test]
    fn completed_group_refuses_everything() {
        let events = [
            GroupEvent::Start,
            GroupEvent::Submit,
            GroupEvent::Acknowledge {
                rating: Some(5),
                override_blackmark: false,
            },
            GroupEvent::RevokeSubmission,
            GroupEvent::ConfirmRejection,
        ];
        for event in events {
            let mut g = group(Status::Completed);
            let err = apply_group_event(&mut g, &event, DONE, now()).unwrap_err();
            assert!(err.to_string().contains("COMPLETED is terminal"), "{err}");
        }
    }

    #[test]
    fn member_submit_records_time_and_proof() {
        let mut m = member(Status::InProgress);
        let submission = Submission {
            completed_at: None,
            proof: Some("uploads/proof-17.png".to_string()),
            remarks: Some("done".to_string()),
        };
        apply_member_event(&mut m, &MemberEvent::Submit(submission), false, now()).unwrap();
        assert_eq!(m.status, Status::PendingAck);
        assert_eq!(m.completion_time, Some(now()));
        assert_eq!(m.proof.as_deref(), Some("uploads/proof-17.png"));
    }

    #[test]
    fn member_submit_time_edit_follows_policy() {
        let earlier = now() - Duration::hours(5);
        let submission = Submission {
            completed_at: Some(earlier),
            ..Submission::default()
        };

        let mut m = member(Status::InProgress);
        let err = apply_member_event(&mut m, &MemberEvent::Submit(submission.clone()), false, now())
            .unwrap_err();
        assert!(matches!(err, EngineError::TimeEditDisabled));
        assert_eq!(m.status, Status::InProgress);

        apply_member_event(&mut m, &MemberEvent::Submit(submission), true, now()).unwrap();
        assert_eq!(m.completion_time, Some(earlier));
    }

    #[test]
    fn member_revokes_clear_terminal_signals() {
        let mut m = member(Status::PendingAck);
        m.completion_time = Some(now());
        apply_member_event(&mut m, &MemberEvent::RevokeSubmission, false, now()).unwrap();
        assert_eq!(m.status, Status::InProgress);
        assert_eq!(m.completion_time, None);

        let request = MemberEvent::RequestRejection {
            reason: Some("scope belongs to another team".to_string()),
        };
        apply_member_event(&mut m, &request, false, now()).unwrap();
        apply_member_event(&mut m, &MemberEvent::RevokeRejection, false, now()).unwrap();
        assert_eq!(m.status, Status::InProgress);
        assert_eq!(m.rejection_reason, None);
    }

    #[test]
    fn reviewer_can_reject_submitted_work_directly() {
        let mut m = member(Status::PendingAck);
        let event = MemberEvent::for_target(
            Status::PendingAck,
            Status::Rejected,
            None,
            false,
            Some("blurry output".to_string()),
            Submission::default(),
        )
        .unwrap();
        assert_eq!(event.kind(), EventKind::Reject);
        apply_member_event(&mut m, &event, false, now()).unwrap();
        assert_eq!(m.status, Status::Rejected);

        let again = MemberEvent::Reject {
            reason: Some("again".to_string()),
        };
        assert!(apply_member_event(&mut m, &again, false, now()).is_err());
    }

    #[test]
    fn target_mapping_picks_revokes() {
        let revoke = GroupEvent::for_target(Status::PendingAck, Status::InProgress, None, false, None);
        assert_eq!(revoke, Some(GroupEvent::RevokeSubmission));
        let revoke = GroupEvent::for_target(Status::RejectionReq, Status::InProgress, None, false, None);
        assert_eq!(revoke, Some(GroupEvent::RevokeRejection));
        assert_eq!(
            GroupEvent::for_target(Status::InProgress, Status::Pending, None, false, None),
            None
        );
    }

    #[test]
    fn member_rejection_request_needs_a_reason() {
        let mut m = member(Status::InProgress);
        let event = MemberEvent::RequestRejection {
            reason: Some("   ".to_string()),
        };
        assert!(apply_member_event(&mut m, &event, false, now()).is_err());
        assert_eq!(m.rejection_reason, None);
    }
}
