//! The exposed operations.
//!
//! Each write operation loads what it needs, plans a [`Changeset`] with the
//! pure lifecycle/scoring/hold/rework code, commits it in one atomic step and
//! only then hands the outbox to the notifier. Records carry a version, so a
//! request that planned against a stale copy fails with
//! `ConcurrentModification` instead of applying its side effects twice.

use std::sync::Arc;

use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::completion::{self, GroupStats, ProjectStats};
use crate::config::{Policy, PolicySource};
use crate::error::{EngineError, ScopeError};
use crate::hold::{self, HoldOutcome};
use crate::lifecycle::{
    apply_group_event, apply_member_event, GroupEvent, GroupGuards, MemberEvent, Submission,
};
use crate::models::{
    Entity, GroupAssignment, GroupChange, MemberAssignment, MemberChange, NewGroupAssignment,
    NewMemberAssignment, NewProject, Project, ProjectGraph, ProjectStatus, Role, ScoreLedger,
    ScoreTarget, Status, Team, User,
};
use crate::notify::{Notification, Notifier};
use crate::report::{
    self, MemberActivity, MemberStanding, Overview, ReportFilter, ReportRow, TeamStanding,
};
use crate::rework::{self, ReworkOrder, ReworkOutcome};
use crate::scoring::apply_score;
use crate::store::{Changeset, Store, Write};

pub struct Engine {
    store: Arc<dyn Store>,
    policy: Arc<dyn PolicySource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

fn not_found(entity: Entity, id: Uuid) -> EngineError {
    EngineError::NotFound { entity, id }
}

fn refuse(
    entity: Entity,
    id: Uuid,
    from: Status,
    event: &'static str,
    reason: &str,
) -> EngineError {
    EngineError::InvalidTransition {
        entity,
        id,
        from: from.as_str().to_string(),
        event,
        reason: reason.to_string(),
    }
}

fn check_window(
    assigned: chrono::DateTime<chrono::Utc>,
    eta: chrono::DateTime<chrono::Utc>,
) -> Result<(), EngineError> {
    if eta < assigned {
        return Err(EngineError::InvalidInput(
            "eta is earlier than the assigned time".to_string(),
        ));
    }
    Ok(())
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        policy: Arc<dyn PolicySource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            policy,
            notifier,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn policy(&self) -> Result<Policy, EngineError> {
        Ok(self.policy.policy().await?)
    }

    async fn commit(&self, operation: &'static str, changes: Changeset) -> Result<(), EngineError> {
        if let Err(err) = self.store.commit(&changes).await {
            tracing::warn!(operation, error = %err, "commit failed");
            return Err(err.into());
        }
        tracing::info!(
            operation,
            writes = changes.writes.len(),
            notifications = changes.outbox.len(),
            "committed"
        );
        for notification in &changes.outbox {
            self.notifier.deliver(notification).await;
        }
        Ok(())
    }

    async fn load_project(&self, id: Uuid) -> Result<Project, EngineError> {
        self.store
            .project(id)
            .await?
            .ok_or_else(|| not_found(Entity::Project, id))
    }

    async fn load_graph(&self, id: Uuid) -> Result<ProjectGraph, EngineError> {
        self.store
            .project_graph(id)
            .await?
            .ok_or_else(|| not_found(Entity::Project, id))
    }

    async fn load_group(&self, id: Uuid) -> Result<GroupAssignment, EngineError> {
        self.store
            .group_assignment(id)
            .await?
            .ok_or_else(|| not_found(Entity::GroupAssignment, id))
    }

    async fn load_member(&self, id: Uuid) -> Result<MemberAssignment, EngineError> {
        self.store
            .member_assignment(id)
            .await?
            .ok_or_else(|| not_found(Entity::MemberAssignment, id))
    }

    async fn load_user(&self, id: Uuid) -> Result<User, EngineError> {
        self.store
            .user(id)
            .await?
            .ok_or_else(|| not_found(Entity::User, id))
    }

    async fn load_team(&self, id: Uuid) -> Result<Team, EngineError> {
        self.store
            .team(id)
            .await?
            .ok_or_else(|| not_found(Entity::Team, id))
    }

    pub async fn create_team(&self, name: &str, lead_ids: Vec<Uuid>) -> Result<Team, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidInput("team name is empty".to_string()));
        }
        let team = Team {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            lead_ids,
            ledger: ScoreLedger::default(),
        };
        let mut changes = Changeset::new();
        changes.push(Write::InsertTeam(team.clone()));
        self.commit("create_team", changes).await?;
        Ok(team)
    }

    pub async fn create_user(
        &self,
        name: &str,
        username: &str,
        roles: Vec<Role>,
        team_id: Option<Uuid>,
    ) -> Result<User, EngineError> {
        if username.trim().is_empty() {
            return Err(EngineError::InvalidInput("username is empty".to_string()));
        }
        if let Some(team_id) = team_id {
            self.load_team(team_id).await?;
        }
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            username: username.trim().to_string(),
            roles,
            team_id,
            ledger: ScoreLedger::default(),
        };
        let mut changes = Changeset::new();
        changes.push(Write::InsertUser(user.clone()));
        self.commit("create_user", changes).await?;
        Ok(user)
    }

    pub async fn create_project(&self, input: NewProject) -> Result<Project, EngineError> {
        if input.name.trim().is_empty() {
            return Err(EngineError::InvalidInput("project name is empty".to_string()));
        }
        let project = Project {
            id: Uuid::new_v4(),
            name: input.name,
            date: input.date,
            catalog: input.catalog,
            status: ProjectStatus::Active,
            remarks: input.remarks,
            hold_start_time: None,
            total_hold_duration: 0,
            rework_of: None,
            version: 0,
        };
        let mut changes = Changeset::new();
        changes.push(Write::InsertProject(project.clone()));
        self.commit("create_project", changes).await?;
        Ok(project)
    }

    /// Hard delete of the project and every assignment under it.
    pub async fn delete_project(&self, id: Uuid) -> Result<(), EngineError> {
        self.load_project(id).await?;
        let mut changes = Changeset::new();
        changes.push(Write::DeleteProject(id));
        self.commit("delete_project", changes).await
    }

    pub async fn create_group_assignment(
        &self,
        input: NewGroupAssignment,
    ) -> Result<GroupAssignment, EngineError> {
        let project = self.load_project(input.project_id).await?;
        if project.status == ProjectStatus::Completed {
            return Err(EngineError::InvalidInput(format!(
                "project {} is completed",
                project.id
            )));
        }
        self.load_team(input.team_id).await?;
        project.catalog.validate(&input.scope)?;
        check_window(input.assigned_time, input.eta)?;

        let group = GroupAssignment {
            id: Uuid::new_v4(),
            project_id: project.id,
            team_id: input.team_id,
            scope: input.scope,
            file_size: input.file_size,
            assigned_time: input.assigned_time,
            eta: input.eta,
            status: Status::Pending,
            rating: None,
            remarks: input.remarks,
            completion_time: None,
            rejection_reason: None,
            version: 0,
        };

        let mut changes = Changeset::new();
        changes
            .push(Write::InsertGroup(group.clone()))
            .notify(Notification::team_leads(
                group.team_id,
                format!("New project assignment: {}.", project.name),
            ));
        self.commit("create_group_assignment", changes).await?;
        Ok(group)
    }

    pub async fn update_group_assignment(
        &self,
        id: Uuid,
        change: GroupChange,
    ) -> Result<GroupAssignment, EngineError> {
        let mut group = self.load_group(id).await?;
        let project = self.load_project(group.project_id).await?;
        let members = self.store.member_assignments_for_group(id).await?;
        let now = self.clock.now();
        let mut changes = Changeset::new();

        let edits_schedule =
            change.eta.is_some() || change.scope.is_some() || change.file_size.is_some();
        if edits_schedule && group.status.is_terminal() {
            return Err(refuse(
                Entity::GroupAssignment,
                id,
                group.status,
                "edit",
                "eta, scope and file size are frozen once terminal",
            ));
        }
        if change.status.is_none()
            && (change.rejection_reason.is_some()
                || change.rating.is_some()
                || change.override_blackmark)
        {
            return Err(EngineError::InvalidInput(
                "rejection reason and rating need a status change".to_string(),
            ));
        }
        let reads_members = change.scope.is_some() || change.status.is_some();

        if let Some(scope) = change.scope {
            project.catalog.validate(&scope)?;
            for member in members.iter().filter(|m| m.status != Status::Rejected) {
                member.scope.check_within(&scope)?;
            }
            group.scope = scope;
        }
        if let Some(eta) = change.eta {
            check_window(group.assigned_time, eta)?;
            group.eta = eta;
        }
        if let Some(file_size) = change.file_size {
            group.file_size = file_size;
        }
        if let Some(remarks) = change.remarks {
            group.remarks = Some(remarks);
        }

        if let Some(target) = change.status {
            let event = GroupEvent::for_target(
                group.status,
                target,
                change.rating,
                change.override_blackmark,
                change.rejection_reason,
            )
            .ok_or_else(|| {
                refuse(
                    Entity::GroupAssignment,
                    id,
                    group.status,
                    "update",
                    "PENDING cannot be re-entered",
                )
            })?;

            let guards = GroupGuards {
                completion_percent: completion::group_stats(&group, &members)
                    .summary
                    .completion_percent,
                active_members: completion::active_members(&members),
            };
            let transition = apply_group_event(&mut group, &event, guards, now)?;
            tracing::debug!(
                group = %id,
                from = %transition.from,
                to = %transition.to,
                "group transition"
            );

            match (transition.to, &event) {
                (Status::PendingAck, _) => {
                    changes.notify(Notification::managers(format!(
                        "Team work submitted for review on project '{}'.",
                        project.name
                    )));
                }
                (
                    Status::Completed,
                    GroupEvent::Acknowledge {
                        override_blackmark, ..
                    },
                ) => {
                    let policy = self.policy.policy().await?;
                    let rating = group.rating.unwrap_or_default();
                    let (award, credit) = apply_score(
                        &policy,
                        ScoreTarget::Team(group.team_id),
                        group.eta,
                        now,
                        rating,
                        *override_blackmark,
                    );
                    changes.push(credit).notify(Notification::team_leads(
                        group.team_id,
                        format!(
                            "Team work accepted on project '{}'. Rating: {rating}/5. Points: +{}, BM: {}",
                            project.name, award.bonus, award.blackmarks
                        ),
                    ));
                }
                (Status::RejectionReq, _) => {
                    changes.notify(Notification::managers(format!(
                        "Rejection requested for an assignment on project '{}'.",
                        project.name
                    )));
                }
                (Status::Rejected, _) => {
                    changes.notify(Notification::team_leads(
                        group.team_id,
                        format!("Assignment on project '{}' was rejected.", project.name),
                    ));
                }
                _ => {}
            }
        }

        changes.push(Write::UpdateGroup(group.clone()));
        if reads_members {
            changes.expect_members(id, &members);
        }
        self.commit("update_group_assignment", changes).await?;
        group.version += 1;
        Ok(group)
    }

    /// Hard delete of the group assignment and its member assignments.
    pub async fn delete_group_assignment(&self, id: Uuid) -> Result<(), EngineError> {
        self.load_group(id).await?;
        let mut changes = Changeset::new();
        changes.push(Write::DeleteGroup(id));
        self.commit("delete_group_assignment", changes).await
    }

    pub async fn create_member_assignment(
        &self,
        input: NewMemberAssignment,
    ) -> Result<MemberAssignment, EngineError> {
        let group = self.load_group(input.group_assignment_id).await?;
        if !matches!(group.status, Status::Pending | Status::InProgress) {
            return Err(refuse(
                Entity::GroupAssignment,
                group.id,
                group.status,
                "allocate",
                "work can only be allocated from PENDING or IN_PROGRESS",
            ));
        }
        self.load_user(input.member_id).await?;
        if let Some(source) = input.rework_from_id {
            self.load_member(source).await?;
        }
        if input.scope.is_empty() {
            return Err(ScopeError::Empty.into());
        }
        input.scope.check_within(&group.scope)?;
        check_window(input.assigned_time, input.eta)?;

        let member = MemberAssignment {
            id: Uuid::new_v4(),
            group_assignment_id: group.id,
            member_id: input.member_id,
            scope: input.scope,
            assigned_time: input.assigned_time,
            eta: input.eta,
            completion_time: None,
            status: Status::InProgress,
            rating: None,
            remarks: input.remarks,
            rework_from_id: input.rework_from_id,
            bonus_awarded: 0.0,
            blackmarks_awarded: 0.0,
            rejection_reason: None,
            proof: None,
            version: 0,
        };

        let mut changes = Changeset::new();
        changes
            .push(Write::ExpectGroup {
                id: group.id,
                version: group.version,
            })
            .push(Write::InsertMember(member.clone()))
            .notify(Notification::user(
                member.member_id,
                "You have a new task assignment.",
            ));
        self.commit("create_member_assignment", changes).await?;
        Ok(member)
    }

    pub async fn update_member_assignment(
        &self,
        id: Uuid,
        change: MemberChange,
    ) -> Result<MemberAssignment, EngineError> {
        let mut member = self.load_member(id).await?;
        let group = self.load_group(member.group_assignment_id).await?;
        let policy = self.policy.policy().await?;
        let now = self.clock.now();
        let mut changes = Changeset::new();

        if (change.eta.is_some() || change.scope.is_some()) && member.status.is_terminal() {
            return Err(refuse(
                Entity::MemberAssignment,
                id,
                member.status,
                "edit",
                "eta and scope are frozen once terminal",
            ));
        }
        if let Some(scope) = change.scope {
            if scope.is_empty() {
                return Err(ScopeError::Empty.into());
            }
            scope.check_within(&group.scope)?;
            member.scope = scope;
        }
        if let Some(eta) = change.eta {
            check_window(member.assigned_time, eta)?;
            member.eta = eta;
        }

        let Some(target) = change.status else {
            if let Some(at) = change.completion_time {
                if !policy.allow_time_edit {
                    return Err(EngineError::TimeEditDisabled);
                }
                if member.status != Status::PendingAck {
                    return Err(EngineError::InvalidInput(
                        "completion time can only be edited on submitted work".to_string(),
                    ));
                }
                member.completion_time = Some(at);
            }
            if change.remarks.is_some() {
                member.remarks = change.remarks;
            }
            if change.proof.is_some() {
                member.proof = change.proof;
            }
            changes.push(Write::UpdateMember(member.clone()));
            self.commit("update_member_assignment", changes).await?;
            member.version += 1;
            return Ok(member);
        };

        let submission = Submission {
            completed_at: change.completion_time,
            proof: change.proof,
            remarks: change.remarks.clone(),
        };
        let event = MemberEvent::for_target(
            member.status,
            target,
            change.rating,
            change.override_blackmark,
            change.rejection_reason,
            submission,
        )
        .ok_or_else(|| {
            refuse(
                Entity::MemberAssignment,
                id,
                member.status,
                "update",
                &format!("{target} cannot be requested from {}", member.status),
            )
        })?;

        let transition = apply_member_event(&mut member, &event, policy.allow_time_edit, now)?;
        if !matches!(event, MemberEvent::Submit(_)) {
            if let Some(remarks) = change.remarks {
                member.remarks = Some(remarks);
            }
        }
        tracing::debug!(
            member = %id,
            from = %transition.from,
            to = %transition.to,
            "member transition"
        );

        match &event {
            MemberEvent::Submit(_) => {
                changes.notify(Notification::team_leads(
                    group.team_id,
                    "A member submitted work for review.",
                ));
            }
            MemberEvent::Acknowledge {
                override_blackmark, ..
            } => {
                let rating = member.rating.unwrap_or_default();
                let completed_at = member.completion_time.unwrap_or(now);
                let (award, credit) = apply_score(
                    &policy,
                    ScoreTarget::User(member.member_id),
                    member.eta,
                    completed_at,
                    rating,
                    *override_blackmark,
                );
                member.bonus_awarded = award.bonus;
                member.blackmarks_awarded = award.blackmarks;
                changes.push(credit).notify(Notification::user(
                    member.member_id,
                    format!(
                        "Work Accepted! Rating: {rating}/5. Points: +{}, BM: {}",
                        award.bonus, award.blackmarks
                    ),
                ));
            }
            MemberEvent::Reject { .. } => {
                changes.notify(Notification::user(
                    member.member_id,
                    format!(
                        "Your submission was rejected: {}",
                        member.rejection_reason.as_deref().unwrap_or_default()
                    ),
                ));
            }
            MemberEvent::RequestRejection { .. } => {
                changes.notify(Notification::team_leads(
                    group.team_id,
                    "A member requested rejection of a task.",
                ));
            }
            MemberEvent::ConfirmRejection => {
                changes.notify(Notification::user(
                    member.member_id,
                    "Your rejection request was approved.",
                ));
            }
            MemberEvent::RevokeSubmission | MemberEvent::RevokeRejection => {
                changes.notify(Notification::user(
                    member.member_id,
                    "Your task was returned to IN_PROGRESS.",
                ));
            }
        }

        changes.push(Write::UpdateMember(member.clone()));
        self.commit("update_member_assignment", changes).await?;
        member.version += 1;
        Ok(member)
    }

    pub async fn delete_member_assignment(&self, id: Uuid) -> Result<(), EngineError> {
        self.load_member(id).await?;
        let mut changes = Changeset::new();
        changes.push(Write::DeleteMember(id));
        self.commit("delete_member_assignment", changes).await
    }

    pub async fn toggle_hold(
        &self,
        project_id: Uuid,
        is_hold: bool,
    ) -> Result<HoldOutcome, EngineError> {
        let graph = self.load_graph(project_id).await?;
        let now = self.clock.now();
        let (changes, outcome) = if is_hold {
            hold::plan_hold(&graph, now)?
        } else {
            hold::plan_resume(&graph, now)?
        };
        self.commit(if is_hold { "hold" } else { "resume" }, changes)
            .await?;
        Ok(outcome)
    }

    pub async fn trigger_rework(&self, order: ReworkOrder) -> Result<ReworkOutcome, EngineError> {
        let graph = self.load_graph(order.project_id).await?;
        self.load_team(order.team_id).await?;
        let policy = self.policy.policy().await?;
        let today = self.clock.now().date_naive();
        let (changes, outcome) = rework::plan_rework(&graph, &order, &policy, today)?;
        self.commit("trigger_rework", changes).await?;
        Ok(outcome)
    }

    pub async fn compute_project_stats(
        &self,
        project_id: Uuid,
    ) -> Result<ProjectStats, EngineError> {
        let graph = self.load_graph(project_id).await?;
        Ok(completion::project_stats(&graph))
    }

    pub async fn compute_group_stats(&self, group_id: Uuid) -> Result<GroupStats, EngineError> {
        let group = self.load_group(group_id).await?;
        let members = self.store.member_assignments_for_group(group_id).await?;
        Ok(completion::group_stats(&group, &members))
    }

    pub async fn team_standings(&self) -> Result<Vec<TeamStanding>, EngineError> {
        let teams = self.store.teams().await?;
        let groups = self.store.group_assignments().await?;
        Ok(report::team_standings(&teams, &groups))
    }

    pub async fn member_standings(
        &self,
        team_id: Option<Uuid>,
    ) -> Result<Vec<MemberStanding>, EngineError> {
        if let Some(team_id) = team_id {
            self.load_team(team_id).await?;
        }
        let users = self.store.users().await?;
        Ok(report::member_standings(&users, team_id))
    }

    pub async fn overview(&self) -> Result<Overview, EngineError> {
        let projects = self.store.projects().await?;
        let teams = self.store.teams().await?;
        let groups = self.store.group_assignments().await?;
        let members = self.store.member_assignments().await?;
        Ok(report::overview(
            &projects,
            &teams,
            &groups,
            &members,
            self.clock.now(),
        ))
    }

    pub async fn member_activity(&self, user_id: Uuid) -> Result<MemberActivity, EngineError> {
        let user = self.load_user(user_id).await?;
        let members = self.store.member_assignments().await?;
        Ok(report::member_activity(&user, &members, self.clock.now()))
    }

    pub async fn assignment_report(
        &self,
        filter: ReportFilter,
    ) -> Result<Vec<ReportRow>, EngineError> {
        if filter.to < filter.from {
            return Err(EngineError::InvalidInput(
                "report range ends before it starts".to_string(),
            ));
        }
        let projects = self.store.projects().await?;
        let teams = self.store.teams().await?;
        let users = self.store.users().await?;
        let groups = self.store.group_assignments().await?;
        let members = self.store.member_assignments().await?;
        Ok(report::assignment_report(
            &filter, &projects, &teams, &users, &groups, &members,
        ))
    }
}
