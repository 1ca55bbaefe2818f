//! Project pause and resume.
//!
//! Deadlines do not move while a project is held. On resume the whole held
//! span, in whole minutes, is added to the ETA of every assignment under the
//! project that is not yet completed. Completed records keep their original
//! ETA because scoring was measured against it.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Entity, ProjectGraph, ProjectStatus, Status};
use crate::notify::Notification;
use crate::store::{Changeset, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldOutcome {
    pub project_id: Uuid,
    pub status: ProjectStatus,
    /// Minutes added to open deadlines by this call.
    pub extended_minutes: i64,
    pub extended_assignments: usize,
}

fn refuse(graph: &ProjectGraph, event: &'static str, reason: &str) -> EngineError {
    EngineError::InvalidTransition {
        entity: Entity::Project,
        id: graph.project.id,
        from: graph.project.status.as_str().to_string(),
        event,
        reason: reason.to_string(),
    }
}

fn notify_teams(changes: &mut Changeset, graph: &ProjectGraph, message: &str) {
    let mut teams: Vec<Uuid> = graph.groups.iter().map(|g| g.team_id).collect();
    teams.sort();
    teams.dedup();
    for team_id in teams {
        changes.notify(Notification::team_leads(team_id, message));
    }
}

pub fn plan_hold(
    graph: &ProjectGraph,
    now: DateTime<Utc>,
) -> Result<(Changeset, HoldOutcome), EngineError> {
    match graph.project.status {
        ProjectStatus::OnHold => return Err(refuse(graph, "hold", "project is already on hold")),
        ProjectStatus::Completed => return Err(refuse(graph, "hold", "project is completed")),
        ProjectStatus::Active => {}
    }

    let mut project = graph.project.clone();
    project.status = ProjectStatus::OnHold;
    project.hold_start_time = Some(now);

    let mut changes = Changeset::new();
    changes.push(Write::UpdateProject(project));
    notify_teams(
        &mut changes,
        graph,
        &format!("Project '{}' is on hold.", graph.project.name),
    );

    Ok((
        changes,
        HoldOutcome {
            project_id: graph.project.id,
            status: ProjectStatus::OnHold,
            extended_minutes: 0,
            extended_assignments: 0,
        },
    ))
}

/// Whole minutes held, never negative. A missing start counts as zero.
pub fn held_minutes(hold_start: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    hold_start
        .map(|start| (now - start).num_minutes().max(0))
        .unwrap_or(0)
}

pub fn plan_resume(
    graph: &ProjectGraph,
    now: DateTime<Utc>,
) -> Result<(Changeset, HoldOutcome), EngineError> {
    if graph.project.status == ProjectStatus::Completed {
        return Err(refuse(graph, "resume", "project is completed"));
    }

    let minutes = held_minutes(graph.project.hold_start_time, now);

    let mut project = graph.project.clone();
    project.status = ProjectStatus::Active;
    project.hold_start_time = None;
    project.total_hold_duration += minutes;

    let mut changes = Changeset::new();
    changes.push(Write::UpdateProject(project));

    let mut extended = 0;
    if minutes > 0 {
        let shift = Duration::minutes(minutes);
        for group in graph.groups.iter().filter(|g| g.status != Status::Completed) {
            let mut group = group.clone();
            group.eta += shift;
            changes.push(Write::UpdateGroup(group));
            extended += 1;
        }
        for member in graph.members.iter().filter(|m| m.status != Status::Completed) {
            let mut member = member.clone();
            member.eta += shift;
            changes.push(Write::UpdateMember(member));
            extended += 1;
        }
    }

    notify_teams(
        &mut changes,
        graph,
        &format!(
            "Project '{}' resumed. Deadlines extended by {minutes} minutes.",
            graph.project.name
        ),
    );

    Ok((
        changes,
        HoldOutcome {
            project_id: graph.project.id,
            status: ProjectStatus::Active,
            extended_minutes: minutes,
            extended_assignments: extended,
        },
    ))
}
