//! Persistence contract.
//!
//! Reads are plain lookups. Every write goes through [`Store::commit`], which
//! applies a whole [`Changeset`] atomically: either all writes land or none
//! do. Updates are checked against the record's `version`, so two requests
//! racing on the same row cannot both commit.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    GroupAssignment, MemberAssignment, Project, ProjectGraph, ScoreTarget, Team, User,
};
use crate::notify::Notification;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    InsertProject(Project),
    UpdateProject(Project),
    /// Hard delete; cascades to every group and member assignment.
    DeleteProject(Uuid),
    InsertGroup(GroupAssignment),
    UpdateGroup(GroupAssignment),
    /// Hard delete; cascades to the group's member assignments.
    DeleteGroup(Uuid),
    InsertMember(MemberAssignment),
    UpdateMember(MemberAssignment),
    DeleteMember(Uuid),
    InsertUser(User),
    InsertTeam(Team),
    /// Fails the commit unless the group is still at `version`.
    ExpectGroup { id: Uuid, version: i64 },
    /// Fails the commit unless the group's member assignments are exactly
    /// `seen`, by id and version.
    ExpectMembers {
        group_id: Uuid,
        seen: Vec<(Uuid, i64)>,
    },
    /// In-place ledger increment.
    Credit {
        target: ScoreTarget,
        bonus: f64,
        blackmarks: f64,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    pub writes: Vec<Write>,
    pub outbox: Vec<Notification>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: Write) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn notify(&mut self, notification: Notification) -> &mut Self {
        self.outbox.push(notification);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Pins the member snapshot a guard was evaluated on.
    pub fn expect_members(&mut self, group_id: Uuid, members: &[MemberAssignment]) -> &mut Self {
        let mut seen: Vec<(Uuid, i64)> = members.iter().map(|m| (m.id, m.version)).collect();
        seen.sort();
        self.push(Write::ExpectMembers { group_id, seen })
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn project(&self, id: Uuid) -> Result<Option<Project>, StoreError>;

    async fn projects(&self) -> Result<Vec<Project>, StoreError>;

    /// The project with all of its group and member assignments.
    async fn project_graph(&self, id: Uuid) -> Result<Option<ProjectGraph>, StoreError>;

    async fn group_assignment(&self, id: Uuid) -> Result<Option<GroupAssignment>, StoreError>;

    async fn group_assignments(&self) -> Result<Vec<GroupAssignment>, StoreError>;

    async fn member_assignment(&self, id: Uuid) -> Result<Option<MemberAssignment>, StoreError>;

    async fn member_assignments(&self) -> Result<Vec<MemberAssignment>, StoreError>;

    async fn member_assignments_for_group(
        &self,
        group_id: Uuid,
    ) -> Result<Vec<MemberAssignment>, StoreError>;

    async fn user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn users(&self) -> Result<Vec<User>, StoreError>;

    async fn team(&self, id: Uuid) -> Result<Option<Team>, StoreError>;

    async fn teams(&self) -> Result<Vec<Team>, StoreError>;

    async fn commit(&self, changes: &Changeset) -> Result<(), StoreError>;
}
