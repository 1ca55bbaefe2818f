use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{Changeset, Store, Write};
use crate::config::{Policy, PolicySource};
use crate::error::StoreError;
use crate::models::{
    Entity, GroupAssignment, MemberAssignment, Project, ProjectGraph, ScoreTarget, Team, User,
};

#[derive(Debug, Clone, Default)]
struct State {
    projects: HashMap<Uuid, Project>,
    groups: HashMap<Uuid, GroupAssignment>,
    members: HashMap<Uuid, MemberAssignment>,
    users: HashMap<Uuid, User>,
    teams: HashMap<Uuid, Team>,
}

impl State {
    fn apply(&mut self, write: &Write) -> Result<(), StoreError> {
        match write {
            Write::InsertProject(project) => {
                self.projects.insert(project.id, project.clone());
            }
            Write::UpdateProject(project) => {
                let stored = self
                    .projects
                    .get_mut(&project.id)
                    .ok_or(StoreError::NotFound {
                        entity: Entity::Project,
                        id: project.id,
                    })?;
                check_version(Entity::Project, project.id, stored.version, project.version)?;
                *stored = Project {
                    version: project.version + 1,
                    ..project.clone()
                };
            }
            Write::DeleteProject(id) => {
                self.projects.remove(id).ok_or(StoreError::NotFound {
                    entity: Entity::Project,
                    id: *id,
                })?;
                let doomed: Vec<Uuid> = self
                    .groups
                    .values()
                    .filter(|g| g.project_id == *id)
                    .map(|g| g.id)
                    .collect();
                for group_id in doomed {
                    self.remove_group(group_id);
                }
            }
            Write::InsertGroup(group) => {
                self.groups.insert(group.id, group.clone());
            }
            Write::UpdateGroup(group) => {
                let stored = self
                    .groups
                    .get_mut(&group.id)
                    .ok_or(StoreError::NotFound {
                        entity: Entity::GroupAssignment,
                        id: group.id,
                    })?;
                check_version(Entity::GroupAssignment, group.id, stored.version, group.version)?;
                *stored = GroupAssignment {
                    version: group.version + 1,
                    ..group.clone()
                };
            }
            Write::DeleteGroup(id) => {
                if !self.groups.contains_key(id) {
                    return Err(StoreError::NotFound {
                        entity: Entity::GroupAssignment,
                        id: *id,
                    });
                }
                self.remove_group(*id);
            }
            Write::InsertMember(member) => {
                self.members.insert(member.id, member.clone());
            }
            Write::UpdateMember(member) => {
                let stored = self
                    .members
                    .get_mut(&member.id)
                    .ok_or(StoreError::NotFound {
                        entity: Entity::MemberAssignment,
                        id: member.id,
                    })?;
                check_version(Entity::MemberAssignment, member.id, stored.version, member.version)?;
                *stored = MemberAssignment {
                    version: member.version + 1,
                    ..member.clone()
                };
            }
            Write::DeleteMember(id) => {
                self.members.remove(id).ok_or(StoreError::NotFound {
                    entity: Entity::MemberAssignment,
                    id: *id,
                })?;
            }
            Write::InsertUser(user) => {
                self.users.insert(user.id, user.clone());
            }
            Write::InsertTeam(team) => {
                self.teams.insert(team.id, team.clone());
            }
            Write::ExpectGroup { id, version } => {
                let stored = self.groups.get(id).ok_or(StoreError::NotFound {
                    entity: Entity::GroupAssignment,
                    id: *id,
                })?;
                check_version(Entity::GroupAssignment, *id, stored.version, *version)?;
            }
            Write::ExpectMembers { group_id, seen } => {
                let mut current: Vec<(Uuid, i64)> = self
                    .members
                    .values()
                    .filter(|m| m.group_assignment_id == *group_id)
                    .map(|m| (m.id, m.version))
                    .collect();
                current.sort();
                if current != *seen {
                    return Err(StoreError::ConcurrentModification {
                        entity: Entity::GroupAssignment,
                        id: *group_id,
                    });
                }
            }
            Write::Credit {
                target,
                bonus,
                blackmarks,
            } => {
                let ledger = match target {
                    ScoreTarget::User(id) => self.users.get_mut(id).map(|u| &mut u.ledger),
                    ScoreTarget::Team(id) => self.teams.get_mut(id).map(|t| &mut t.ledger),
                };
                let ledger = ledger.ok_or(match target {
                    ScoreTarget::User(id) => StoreError::NotFound {
                        entity: Entity::User,
                        id: *id,
                    },
                    ScoreTarget::Team(id) => StoreError::NotFound {
                        entity: Entity::Team,
                        id: *id,
                    },
                })?;
                ledger.bonus_points += bonus;
                ledger.blackmarks += blackmarks;
            }
        }
        Ok(())
    }

    fn remove_group(&mut self, group_id: Uuid) {
        self.groups.remove(&group_id);
        self.members.retain(|_, m| m.group_assignment_id != group_id);
    }
}

fn check_version(entity: Entity, id: Uuid, stored: i64, seen: i64) -> Result<(), StoreError> {
    if stored != seen {
        return Err(StoreError::ConcurrentModification { entity, id });
    }
    Ok(())
}

/// In-process store. A commit is applied to a copy of the state and swapped
/// in only when every write succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    policy: Mutex<Policy>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: Policy) -> Self {
        Self {
            state: Mutex::default(),
            policy: Mutex::new(policy),
        }
    }

    pub fn set_policy(&self, policy: Policy) -> Result<(), StoreError> {
        let mut current = self.policy.lock().map_err(|_| StoreError::LockPoisoned)?;
        *current = policy;
        Ok(())
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl PolicySource for MemoryStore {
    async fn policy(&self) -> Result<Policy, StoreError> {
        Ok(*self.policy.lock().map_err(|_| StoreError::LockPoisoned)?)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn project(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        Ok(self.state()?.projects.get(&id).cloned())
    }

    async fn projects(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects: Vec<Project> = self.state()?.projects.values().cloned().collect();
        projects.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
        Ok(projects)
    }

    async fn project_graph(&self, id: Uuid) -> Result<Option<ProjectGraph>, StoreError> {
        let state = self.state()?;
        let Some(project) = state.projects.get(&id).cloned() else {
            return Ok(None);
        };
        let mut groups: Vec<GroupAssignment> = state
            .groups
            .values()
            .filter(|g| g.project_id == id)
            .cloned()
            .collect();
        groups.sort_by_key(|g| (g.assigned_time, g.id));
        let mut members: Vec<MemberAssignment> = state
            .members
            .values()
            .filter(|m| groups.iter().any(|g| g.id == m.group_assignment_id))
            .cloned()
            .collect();
        members.sort_by_key(|m| (m.assigned_time, m.id));
        Ok(Some(ProjectGraph {
            project,
            groups,
            members,
        }))
    }

    async fn group_assignment(&self, id: Uuid) -> Result<Option<GroupAssignment>, StoreError> {
        Ok(self.state()?.groups.get(&id).cloned())
    }

    async fn group_assignments(&self) -> Result<Vec<GroupAssignment>, StoreError> {
        let mut groups: Vec<GroupAssignment> = self.state()?.groups.values().cloned().collect();
        groups.sort_by_key(|g| (g.assigned_time, g.id));
        Ok(groups)
    }

    async fn member_assignment(&self, id: Uuid) -> Result<Option<MemberAssignment>, StoreError> {
        Ok(self.state()?.members.get(&id).cloned())
    }

    async fn member_assignments(&self) -> Result<Vec<MemberAssignment>, StoreError> {
        let mut members: Vec<MemberAssignment> =
            self.state()?.members.values().cloned().collect();
        members.sort_by_key(|m| (m.assigned_time, m.id));
        Ok(members)
    }

    async fn member_assignments_for_group(
        &self,
        group_id: Uuid,
    ) -> Result<Vec<MemberAssignment>, StoreError> {
        let mut members: Vec<MemberAssignment> = self
            .state()?
            .members
            .values()
            .filter(|m| m.group_assignment_id == group_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| (m.assigned_time, m.id));
        Ok(members)
    }

    async fn user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state()?.users.get(&id).cloned())
    }

    async fn users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.state()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn team(&self, id: Uuid) -> Result<Option<Team>, StoreError> {
        Ok(self.state()?.teams.get(&id).cloned())
    }

    async fn teams(&self) -> Result<Vec<Team>, StoreError> {
        let mut teams: Vec<Team> = self.state()?.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    async fn commit(&self, changes: &Changeset) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut state = self.state()?;
        let mut next = state.clone();
        for write in &changes.writes {
            next.apply(write)?;
        }
        *state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProjectStatus, ScoreLedger, Status};
    use crate::scope::{Catalog, Scope};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn project() -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "Harbor Bridge".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
            catalog: Catalog {
                divisions: vec!["D1".into()],
                part_nos: vec!["P1".into()],
                work_types: vec!["WT1".into()],
            },
            status: ProjectStatus::Active,
            remarks: None,
            hold_start_time: None,
            total_hold_duration: 0,
            rework_of: None,
            version: 0,
        }
    }

    fn group(project_id: Uuid) -> GroupAssignment {
        let at = Utc.with_ymd_and_hms(2026, 1, 12, 8, 0, 0).unwrap();
        GroupAssignment {
            id: Uuid::new_v4(),
            project_id,
            team_id: Uuid::new_v4(),
            scope: Scope::default(),
            file_size: String::new(),
            assigned_time: at,
            eta: at,
            status: Status::Pending,
            rating: None,
            remarks: None,
            completion_time: None,
            rejection_reason: None,
            version: 0,
        }
    }

    fn member(group_id: Uuid) -> MemberAssignment {
        let at = Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0).unwrap();
        MemberAssignment {
            id: Uuid::new_v4(),
            group_assignment_id: group_id,
            member_id: Uuid::new_v4(),
            scope: Scope::default(),
            assigned_time: at,
            eta: at,
            completion_time: None,
            status: Status::InProgress,
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

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Avery Lee".to_string(),
            username: "avery".to_string(),
            roles: vec![crate::models::Role::Member],
            team_id: None,
            ledger: ScoreLedger::default(),
        }
    }

    #[tokio::test]
    async fn updates_bump_version_and_reject_stale_copies() {
        let store = MemoryStore::new();
        let p = project();
        let g = group(p.id);
        let mut changes = Changeset::new();
        changes
            .push(Write::InsertProject(p.clone()))
            .push(Write::InsertGroup(g.clone()));
        store.commit(&changes).await.unwrap();

        let mut first = g.clone();
        first.status = Status::InProgress;
        store
            .commit(&Changeset {
                writes: vec![Write::UpdateGroup(first)],
                outbox: vec![],
            })
            .await
            .unwrap();
        let stored = store.group_assignment(g.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.status, Status::InProgress);

        let stale = Changeset {
            writes: vec![Write::UpdateGroup(g.clone())],
            outbox: vec![],
        };
        let err = store.commit(&stale).await.unwrap_err();
        assert!(matches!(err, StoreError::ConcurrentModification { .. }));
    }

    #[tokio::test]
    async fn failed_commit_leaves_nothing_behind() {
        let store = MemoryStore::new();
        let u = user();
        store
            .commit(&Changeset {
                writes: vec![Write::InsertUser(u.clone())],
                outbox: vec![],
            })
            .await
            .unwrap();

        let p = project();
        let changes = Changeset {
            writes: vec![
                Write::InsertProject(p.clone()),
                Write::Credit {
                    target: ScoreTarget::User(u.id),
                    bonus: 0.0,
                    blackmarks: 5.0,
                },
                Write::Credit {
                    target: ScoreTarget::Team(Uuid::new_v4()),
                    bonus: 1.0,
                    blackmarks: 0.0,
                },
            ],
            outbox: vec![],
        };
        let err = store.commit(&changes).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                entity: Entity::Team,
                ..
            }
        ));
        assert!(store.project(p.id).await.unwrap().is_none());
        assert_eq!(store.user(u.id).await.unwrap().unwrap().ledger.blackmarks, 0.0);
    }

    #[tokio::test]
    async fn deleting_a_project_cascades() {
        let store = MemoryStore::new();
        let p = project();
        let g = group(p.id);
        let m = member(g.id);
        let other = project();
        let other_group = group(other.id);
        store
            .commit(&Changeset {
                writes: vec![
                    Write::InsertProject(p.clone()),
                    Write::InsertGroup(g.clone()),
                    Write::InsertMember(m.clone()),
                    Write::InsertProject(other.clone()),
                    Write::InsertGroup(other_group.clone()),
                ],
                outbox: vec![],
            })
            .await
            .unwrap();

        store
            .commit(&Changeset {
                writes: vec![Write::DeleteProject(p.id)],
                outbox: vec![],
            })
            .await
            .unwrap();

        assert!(store.project_graph(p.id).await.unwrap().is_none());
        assert!(store.group_assignment(g.id).await.unwrap().is_none());
        assert!(store.member_assignment(m.id).await.unwrap().is_none());
        assert!(store.group_assignment(other_group.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn project_graph_collects_nested_assignments() {
        let store = MemoryStore::new();
        let p = project();
        let g = group(p.id);
        let m = member(g.id);
        store
            .commit(&Changeset {
                writes: vec![
                    Write::InsertProject(p.clone()),
                    Write::InsertGroup(g.clone()),
                    Write::InsertMember(m.clone()),
                ],
                outbox: vec![],
            })
            .await
            .unwrap();

        let graph = store.project_graph(p.id).await.unwrap().unwrap();
        assert_eq!(graph.groups, vec![g.clone()]);
        assert_eq!(graph.members_of(g.id).count(), 1);
    }

    #[tokio::test]
    async fn member_write_invalidates_a_pinned_member_snapshot() {
        let store = MemoryStore::new();
        let p = project();
        let g = group(p.id);
        let m = member(g.id);
        store
            .commit(&Changeset {
                writes: vec![
                    Write::InsertProject(p.clone()),
                    Write::InsertGroup(g.clone()),
                    Write::InsertMember(m.clone()),
                ],
                outbox: vec![],
            })
            .await
            .unwrap();

        // Plan a group write against the current members, then let a member
        // write land first.
        let snapshot = store.member_assignments_for_group(g.id).await.unwrap();
        let mut submit = Changeset::new();
        submit
            .push(Write::UpdateGroup(GroupAssignment {
                status: Status::PendingAck,
                ..g.clone()
            }))
            .expect_members(g.id, &snapshot);

        let mut moved = m.clone();
        moved.status = Status::PendingAck;
        store
            .commit(&Changeset {
                writes: vec![Write::UpdateMember(moved)],
                outbox: vec![],
            })
            .await
            .unwrap();

        let err = store.commit(&submit).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConcurrentModification {
                entity: Entity::GroupAssignment,
                ..
            }
        ));
        let stored = store.group_assignment(g.id).await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Pending);
        assert_eq!(stored.version, 0);

        let extra = member(g.id);
        let fresh = store.member_assignments_for_group(g.id).await.unwrap();
        let mut pinned = Changeset::new();
        pinned.expect_members(g.id, &fresh);
        store
            .commit(&Changeset {
                writes: vec![Write::InsertMember(extra)],
                outbox: vec![],
            })
            .await
            .unwrap();
        assert!(store.commit(&pinned).await.is_err());
    }

    #[tokio::test]
    async fn expect_group_rejects_a_moved_group() {
        let store = MemoryStore::new();
        let p = project();
        let g = group(p.id);
        store
            .commit(&Changeset {
                writes: vec![Write::InsertProject(p.clone()), Write::InsertGroup(g.clone())],
                outbox: vec![],
            })
            .await
            .unwrap();
        let guard = Changeset {
            writes: vec![Write::ExpectGroup {
                id: g.id,
                version: 0,
            }],
            outbox: vec![],
        };
        store.commit(&guard).await.unwrap();

        store
            .commit(&Changeset {
                writes: vec![Write::UpdateGroup(g.clone())],
                outbox: vec![],
            })
            .await
            .unwrap();
        let err = store.commit(&guard).await.unwrap_err();
        assert!(matches!(err, StoreError::ConcurrentModification { .. }));
    }

    #[tokio::test]
    async fn empty_changeset_is_a_no_op() {
        let store = MemoryStore::new();
        store.commit(&Changeset::new()).await.unwrap();
        assert!(store.group_assignments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn policy_is_replaceable() {
        let store = MemoryStore::new();
        assert_eq!(store.policy().await.unwrap(), Policy::default());
        let policy = Policy {
            allow_time_edit: true,
            ..Policy::default()
        };
        store.set_policy(policy).unwrap();
        assert!(store.policy().await.unwrap().allow_time_edit);
    }
}
