//! Policy knobs and process settings.

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreError;

pub const BONUS_ON_TIME: &str = "BONUS_ON_TIME";
pub const BONUS_STAR_3: &str = "BONUS_STAR_3";
pub const BONUS_STAR_4: &str = "BONUS_STAR_4";
pub const BONUS_STAR_5: &str = "BONUS_STAR_5";
pub const BM_DELAY_PER_HR: &str = "BM_DELAY_PER_HR";
pub const BM_REWORK: &str = "BM_REWORK";
pub const ALLOW_TIME_EDIT: &str = "ALLOW_TIME_EDIT";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Policy {
    pub bonus_on_time: f64,
    pub bonus_star_3: f64,
    pub bonus_star_4: f64,
    pub bonus_star_5: f64,
    pub bm_delay_per_hr: f64,
    pub bm_rework: f64,
    pub allow_time_edit: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            bonus_on_time: 3.0,
            bonus_star_3: 1.0,
            bonus_star_4: 2.0,
            bonus_star_5: 3.0,
            bm_delay_per_hr: 1.0,
            bm_rework: 5.0,
            allow_time_edit: false,
        }
    }
}

impl Policy {
    /// Build a policy from stored `(key, value)` rows. Unknown keys are
    /// ignored and missing ones keep their default.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut policy = Self::default();
        for (key, value) in entries {
            match key.as_ref() {
                BONUS_ON_TIME => policy.bonus_on_time = value,
                BONUS_STAR_3 => policy.bonus_star_3 = value,
                BONUS_STAR_4 => policy.bonus_star_4 = value,
                BONUS_STAR_5 => policy.bonus_star_5 = value,
                BM_DELAY_PER_HR => policy.bm_delay_per_hr = value,
                BM_REWORK => policy.bm_rework = value,
                ALLOW_TIME_EDIT => policy.allow_time_edit = value != 0.0,
                other => tracing::debug!(key = other, "ignoring unknown policy key"),
            }
        }
        policy
    }

    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        vec![
            (BONUS_ON_TIME, self.bonus_on_time),
            (BONUS_STAR_3, self.bonus_star_3),
            (BONUS_STAR_4, self.bonus_star_4),
            (BONUS_STAR_5, self.bonus_star_5),
            (BM_DELAY_PER_HR, self.bm_delay_per_hr),
            (BM_REWORK, self.bm_rework),
            (ALLOW_TIME_EDIT, if self.allow_time_edit { 1.0 } else { 0.0 }),
        ]
    }

    pub fn star_bonus(&self, rating: u8) -> f64 {
        match rating {
            3 => self.bonus_star_3,
            4 => self.bonus_star_4,
            5 => self.bonus_star_5,
            _ => 0.0,
        }
    }
}

/// Where the engine reads its policy from, once per operation.
#[async_trait]
pub trait PolicySource: Send + Sync {
    async fn policy(&self) -> Result<Policy, StoreError>;
}

#[async_trait]
impl PolicySource for Policy {
    async fn policy(&self) -> Result<Policy, StoreError> {
        Ok(*self)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;
        let max_connections = match std::env::var("WORK_ALLOCATION_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("invalid WORK_ALLOCATION_MAX_CONNECTIONS '{raw}'"))?,
            Err(_) => 5,
        };
        Ok(Self {
            database_url,
            max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let policy = Policy::from_entries(Vec::<(String, f64)>::new());
        assert_eq!(policy, Policy::default());
        assert_eq!(policy.bonus_on_time, 3.0);
        assert_eq!(policy.bm_rework, 5.0);
        assert!(!policy.allow_time_edit);
    }

    #[test]
    fn stored_values_override_defaults() {
        let policy = Policy::from_entries([
            ("BONUS_ON_TIME", 4.0),
            ("BM_REWORK", 0.0),
            ("ALLOW_TIME_EDIT", 1.0),
            ("ALLOW_SIGNUP", 1.0),
        ]);
        assert_eq!(policy.bonus_on_time, 4.0);
        assert_eq!(policy.bm_rework, 0.0);
        assert!(policy.allow_time_edit);
        assert_eq!(policy.bonus_star_5, 3.0);
    }

    #[test]
    fn star_bonus_only_for_three_and_up() {
        let policy = Policy::default();
        assert_eq!(policy.star_bonus(1), 0.0);
        assert_eq!(policy.star_bonus(2), 0.0);
        assert_eq!(policy.star_bonus(3), 1.0);
        assert_eq!(policy.star_bonus(4), 2.0);
        assert_eq!(policy.star_bonus(5), 3.0);
    }

    #[test]
    fn entries_round_trip_through_from_entries() {
        let policy = Policy {
            bm_delay_per_hr: 2.5,
            allow_time_edit: true,
            ..Policy::default()
        };
        assert_eq!(Policy::from_entries(policy.entries()), policy);
    }
}
