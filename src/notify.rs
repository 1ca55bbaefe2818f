//! Notification outbox and sinks.
//!
//! The engine never talks to a sink while it is deciding what to write. It
//! queues [`Notification`]s on the changeset and hands them to a
//! [`Notifier`] once the commit has succeeded. Sinks are fire-and-forget:
//! delivery failures are logged, not returned.

use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    User {
        user_id: Uuid,
        message: String,
    },
    Team {
        team_id: Uuid,
        message: String,
        role: Option<Role>,
    },
    /// Every project manager and admin.
    Managers { message: String },
}

impl Notification {
    pub fn user(user_id: Uuid, message: impl Into<String>) -> Self {
        Self::User {
            user_id,
            message: message.into(),
        }
    }

    pub fn team_leads(team_id: Uuid, message: impl Into<String>) -> Self {
        Self::Team {
            team_id,
            message: message.into(),
            role: Some(Role::TeamLead),
        }
    }

    pub fn managers(message: impl Into<String>) -> Self {
        Self::Managers {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::User { message, .. } | Self::Team { message, .. } | Self::Managers { message } => {
                message
            }
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: Uuid, message: &str);

    async fn notify_team(&self, team_id: Uuid, message: &str, role: Option<Role>);

    async fn notify_managers(&self, message: &str);

    async fn deliver(&self, notification: &Notification) {
        match notification {
            Notification::User { user_id, message } => self.notify(*user_id, message).await,
            Notification::Team {
                team_id,
                message,
                role,
            } => self.notify_team(*team_id, message, *role).await,
            Notification::Managers { message } => self.notify_managers(message).await,
        }
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: Uuid, message: &str) {
        tracing::info!(%user_id, message, "notify user");
    }

    async fn notify_team(&self, team_id: Uuid, message: &str, role: Option<Role>) {
        tracing::info!(%team_id, role = role.map(|r| r.as_str()), message, "notify team");
    }

    async fn notify_managers(&self, message: &str) {
        tracing::info!(message, "notify managers");
    }
}

/// Keeps every delivered notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn messages_for(&self, user_id: Uuid) -> Vec<String> {
        self.delivered()
            .into_iter()
            .filter_map(|n| match n {
                Notification::User {
                    user_id: to,
                    message,
                } if to == user_id => Some(message),
                _ => None,
            })
            .collect()
    }

    fn record(&self, notification: Notification) {
        match self.delivered.lock() {
            Ok(mut delivered) => delivered.push(notification),
            Err(e) => e.into_inner().push(notification),
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: Uuid, message: &str) {
        self.record(Notification::user(user_id, message));
    }

    async fn notify_team(&self, team_id: Uuid, message: &str, role: Option<Role>) {
        self.record(Notification::Team {
            team_id,
            message: message.to_string(),
            role,
        });
    }

    async fn notify_managers(&self, message: &str) {
        self.record(Notification::managers(message));
    }
}

/// Inserts one `notifications` row per recipient.
#[derive(Debug, Clone)]
pub struct PgNotifier {
    pool: PgPool,
}

impl PgNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn report(result: Result<sqlx::postgres::PgQueryResult, sqlx::Error>, message: &str) {
        match result {
            Ok(done) => tracing::debug!(rows = done.rows_affected(), message, "notification stored"),
            Err(err) => tracing::warn!(error = %err, message, "failed to store notification"),
        }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn notify(&self, user_id: Uuid, message: &str) {
        let result = sqlx::query(
            r#"
            INSERT INTO work_allocation.notifications (id, user_id, message, is_read, created_at)
            VALUES ($1, $2, $3, FALSE, now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(message)
        .execute(&self.pool)
        .await;
        Self::report(result, message);
    }

    async fn notify_team(&self, team_id: Uuid, message: &str, role: Option<Role>) {
        let result = sqlx::query(
            r#"
            INSERT INTO work_allocation.notifications (id, user_id, message, is_read, created_at)
            SELECT gen_random_uuid(), u.id, $2, FALSE, now()
            FROM work_allocation.users u
            WHERE u.team_id = $1 AND ($3::TEXT IS NULL OR $3 = ANY(u.roles))
            "#,
        )
        .bind(team_id)
        .bind(message)
        .bind(role.map(|r| r.as_str()))
        .execute(&self.pool)
        .await;
        Self::report(result, message);
    }

    async fn notify_managers(&self, message: &str) {
        let result = sqlx::query(
            r#"
            INSERT INTO work_allocation.notifications (id, user_id, message, is_read, created_at)
            SELECT gen_random_uuid(), u.id, $1, FALSE, now()
            FROM work_allocation.users u
            WHERE 'PROJECT_MANAGER' = ANY(u.roles) OR 'ADMIN' = ANY(u.roles)
            "#,
        )
        .bind(message)
        .execute(&self.pool)
        .await;
        Self::report(result, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deliver_routes_by_recipient_kind() {
        let sink = RecordingNotifier::new();
        let user = Uuid::new_v4();
        let team = Uuid::new_v4();

        sink.deliver(&Notification::user(user, "You have a new task assignment."))
            .await;
        sink.deliver(&Notification::team_leads(team, "Member submitted work."))
            .await;
        sink.deliver(&Notification::managers("Please review.")).await;

        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 3);
        assert_eq!(
            delivered[1],
            Notification::Team {
                team_id: team,
                message: "Member submitted work.".to_string(),
                role: Some(Role::TeamLead),
            }
        );
        assert_eq!(sink.messages_for(user), vec!["You have a new task assignment."]);
    }
}
