//! Rework dispatch.
//!
//! Defective scope is re-issued as a fresh project with one pending group
//! assignment, leaving the source project and its scoring untouched. Every
//! member who ever held overlapping scope on the source project is charged
//! the flat rework penalty, once per member.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Policy;
use crate::error::EngineError;
use crate::models::{GroupAssignment, Project, ProjectGraph, ProjectStatus, ScoreTarget, Status};
use crate::notify::Notification;
use crate::scope::{check_scope_overlap, Scope};
use crate::scoring::rework_penalty;
use crate::store::{Changeset, Write};

pub const SHADOW_PROJECT_REMARKS: &str = "REWORK Generated";
pub const REWORK_ORDER_REMARKS: &str = "REWORK ORDER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReworkOrder {
    pub project_id: Uuid,
    pub team_id: Uuid,
    pub scope: Scope,
    pub assigned_time: DateTime<Utc>,
    pub eta: DateTime<Utc>,
    #[serde(default)]
    pub file_size: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReworkOutcome {
    pub new_project_id: Uuid,
    pub assignment_id: Uuid,
    /// Distinct members charged the rework penalty.
    pub penalized: Vec<Uuid>,
}

/// Members whose historical assignments on the project overlap `scope`.
pub fn culprits(graph: &ProjectGraph, scope: &Scope) -> Vec<Uuid> {
    graph
        .members
        .iter()
        .filter(|m| check_scope_overlap(&m.scope, scope))
        .map(|m| m.member_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn plan_rework(
    graph: &ProjectGraph,
    order: &ReworkOrder,
    policy: &Policy,
    today: NaiveDate,
) -> Result<(Changeset, ReworkOutcome), EngineError> {
    graph.project.catalog.validate(&order.scope)?;
    if order.eta < order.assigned_time {
        return Err(EngineError::InvalidInput(
            "rework eta is earlier than its assigned time".to_string(),
        ));
    }

    let mut changes = Changeset::new();

    let penalized = culprits(graph, &order.scope);
    let penalty = rework_penalty(policy);
    for member_id in &penalized {
        changes
            .push(penalty.credit(ScoreTarget::User(*member_id)))
            .notify(Notification::user(
                *member_id,
                format!(
                    "REWORK generated. You received {} Blackmarks.",
                    penalty.blackmarks
                ),
            ));
    }

    let shadow = Project {
        id: Uuid::new_v4(),
        name: format!("{} R", graph.project.name),
        date: today,
        catalog: order.scope.catalog(),
        status: ProjectStatus::Active,
        remarks: Some(SHADOW_PROJECT_REMARKS.to_string()),
        hold_start_time: None,
        total_hold_duration: 0,
        rework_of: Some(graph.project.id),
        version: 0,
    };
    let assignment = GroupAssignment {
        id: Uuid::new_v4(),
        project_id: shadow.id,
        team_id: order.team_id,
        scope: order.scope.clone(),
        file_size: order.file_size.clone(),
        assigned_time: order.assigned_time,
        eta: order.eta,
        status: Status::Pending,
        rating: None,
        remarks: Some(REWORK_ORDER_REMARKS.to_string()),
        completion_time: None,
        rejection_reason: None,
        version: 0,
    };

    let outcome = ReworkOutcome {
        new_project_id: shadow.id,
        assignment_id: assignment.id,
        penalized,
    };

    changes.notify(Notification::team_leads(
        order.team_id,
        format!("New rework order assigned: {}.", shadow.name),
    ));
    changes
        .push(Write::InsertProject(shadow))
        .push(Write::InsertGroup(assignment));

    tracing::debug!(
        source = %graph.project.id,
        new_project = %outcome.new_project_id,
        culprits = outcome.penalized.len(),
        "planned rework"
    );

    Ok((changes, outcome))
}
