use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::{Catalog, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Project,
    GroupAssignment,
    MemberAssignment,
    User,
    Team,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::GroupAssignment => "group assignment",
            Self::MemberAssignment => "member assignment",
            Self::User => "user",
            Self::Team => "team",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assignment status, shared by group and member assignments. Members never
/// sit in `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pending,
    InProgress,
    PendingAck,
    Completed,
    Rejected,
    RejectionReq,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::PendingAck => "PENDING_ACK",
            Self::Completed => "COMPLETED",
            Self::Rejected => "REJECTED",
            Self::RejectionReq => "REJECTION_REQ",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "PENDING_ACK" => Ok(Self::PendingAck),
            "COMPLETED" => Ok(Self::Completed),
            "REJECTED" => Ok(Self::Rejected),
            "REJECTION_REQ" => Ok(Self::RejectionReq),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Active,
    OnHold,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::OnHold => "ON_HOLD",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "ON_HOLD" => Ok(Self::OnHold),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(format!("Invalid project status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    ProjectManager,
    TeamLead,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::ProjectManager => "PROJECT_MANAGER",
            Self::TeamLead => "TEAM_LEAD",
            Self::Member => "MEMBER",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "PROJECT_MANAGER" => Ok(Self::ProjectManager),
            "TEAM_LEAD" => Ok(Self::TeamLead),
            "MEMBER" => Ok(Self::Member),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Accumulated score of a user or team. Both counters only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreLedger {
    pub bonus_points: f64,
    pub blackmarks: f64,
}

impl ScoreLedger {
    pub fn net_score(&self) -> f64 {
        self.bonus_points - self.blackmarks
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreTarget {
    User(Uuid),
    Team(Uuid),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub roles: Vec<Role>,
    pub team_id: Option<Uuid>,
    #[serde(flatten)]
    pub ledger: ScoreLedger,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub lead_ids: Vec<Uuid>,
    #[serde(flatten)]
    pub ledger: ScoreLedger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub catalog: Catalog,
    pub status: ProjectStatus,
    pub remarks: Option<String>,
    pub hold_start_time: Option<DateTime<Utc>>,
    /// Minutes spent on hold across all hold/resume cycles.
    pub total_hold_duration: i64,
    /// Source project when this one was spawned by a rework order.
    pub rework_of: Option<Uuid>,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAssignment {
    pub id: Uuid,
    pub project_id: Uuid,
    pub team_id: Uuid,
    pub scope: Scope,
    pub file_size: String,
    pub assigned_time: DateTime<Utc>,
    pub eta: DateTime<Utc>,
    pub status: Status,
    pub rating: Option<u8>,
    pub remarks: Option<String>,
    pub completion_time: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberAssignment {
    pub id: Uuid,
    pub group_assignment_id: Uuid,
    pub member_id: Uuid,
    pub scope: Scope,
    pub assigned_time: DateTime<Utc>,
    pub eta: DateTime<Utc>,
    pub completion_time: Option<DateTime<Utc>>,
    pub status: Status,
    pub rating: Option<u8>,
    pub remarks: Option<String>,
    pub rework_from_id: Option<Uuid>,
    pub bonus_awarded: f64,
    pub blackmarks_awarded: f64,
    pub rejection_reason: Option<String>,
    /// Reference to the uploaded proof of work, stored elsewhere.
    pub proof: Option<String>,
    pub version: i64,
}

/// A project with every assignment underneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectGraph {
    pub project: Project,
    pub groups: Vec<GroupAssignment>,
    pub members: Vec<MemberAssignment>,
}

impl ProjectGraph {
    pub fn members_of(&self, group_id: Uuid) -> impl Iterator<Item = &MemberAssignment> {
        self.members
            .iter()
            .filter(move |member| member.group_assignment_id == group_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub catalog: Catalog,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroupAssignment {
    pub project_id: Uuid,
    pub team_id: Uuid,
    pub scope: Scope,
    #[serde(default)]
    pub file_size: String,
    pub assigned_time: DateTime<Utc>,
    pub eta: DateTime<Utc>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMemberAssignment {
    pub group_assignment_id: Uuid,
    pub member_id: Uuid,
    pub scope: Scope,
    pub assigned_time: DateTime<Utc>,
    pub eta: DateTime<Utc>,
    pub remarks: Option<String>,
    pub rework_from_id: Option<Uuid>,
}

/// Partial update of a group assignment. A `status` is turned into a
/// lifecycle event; everything else is patched as-is.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupChange {
    pub status: Option<Status>,
    pub rating: Option<u8>,
    #[serde(default)]
    pub override_blackmark: bool,
    pub rejection_reason: Option<String>,
    pub remarks: Option<String>,
    pub eta: Option<DateTime<Utc>>,
    pub file_size: Option<String>,
    pub scope: Option<Scope>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberChange {
    pub status: Option<Status>,
    pub rating: Option<u8>,
    #[serde(default)]
    pub override_blackmark: bool,
    pub rejection_reason: Option<String>,
    pub remarks: Option<String>,
    pub eta: Option<DateTime<Utc>>,
    pub scope: Option<Scope>,
    /// Operator-supplied submission time, honoured only when time edits are allowed.
    pub completion_time: Option<DateTime<Utc>>,
    pub proof: Option<String>,
}
