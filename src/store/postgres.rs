use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use super::{Changeset, Store, Write};
use crate::config::{Policy, PolicySource};
use crate::error::StoreError;
use crate::models::{
    Entity, GroupAssignment, MemberAssignment, Project, ProjectGraph, ProjectStatus, Role,
    ScoreLedger, ScoreTarget, Team, User,
};
use crate::scope::Catalog;

const PROJECT_COLUMNS: &str = "id, name, date, divisions, part_nos, work_types, status, remarks, \
     hold_start_time, total_hold_duration, rework_of, version";
const GROUP_COLUMNS: &str = "id, project_id, team_id, scope, file_size, assigned_time, eta, \
     status, rating, remarks, completion_time, rejection_reason, version";
const MEMBER_COLUMNS: &str = "id, group_assignment_id, member_id, scope, assigned_time, eta, \
     completion_time, status, rating, remarks, rework_from_id, bonus_awarded, \
     blackmarks_awarded, rejection_reason, proof, version";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_db(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn set_policy_value(&self, key: &str, value: f64) -> anyhow::Result<()> {
        let known = Policy::default().entries();
        if !known.iter().any(|(k, _)| *k == key) {
            anyhow::bail!("unknown policy key '{key}'");
        }
        sqlx::query(
            r#"
            INSERT INTO work_allocation.system_config (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn seed(&self) -> anyhow::Result<()> {
        for (key, value) in Policy::default().entries() {
            sqlx::query(
                "INSERT INTO work_allocation.system_config (key, value) VALUES ($1, $2) \
                 ON CONFLICT (key) DO NOTHING",
            )
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        }

        let team_id = Uuid::parse_str("5b1c0f2e-8d7a-4f0b-9a51-0c1d2e3f4a5b")?;
        let lead_id = Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?;

        sqlx::query(
            r#"
            INSERT INTO work_allocation.teams (id, name, lead_ids)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, lead_ids = EXCLUDED.lead_ids
            "#,
        )
        .bind(team_id)
        .bind("Survey Team North")
        .bind(vec![lead_id])
        .execute(&self.pool)
        .await?;

        let users = vec![
            (
                Uuid::parse_str("a41c7d0e-51b8-4a0c-9f4e-2f6d8a1b3c55")?,
                "Priya Raman",
                "priya.raman",
                vec![Role::ProjectManager],
                None,
            ),
            (lead_id, "Avery Lee", "avery.lee", vec![Role::TeamLead], Some(team_id)),
            (
                Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
                "Jules Moreno",
                "jules.moreno",
                vec![Role::Member],
                Some(team_id),
            ),
            (
                Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
                "Kiara Patel",
                "kiara.patel",
                vec![Role::Member],
                Some(team_id),
            ),
        ];

        for (id, name, username, roles, team) in users {
            let roles: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
            sqlx::query(
                r#"
                INSERT INTO work_allocation.users (id, name, username, roles, team_id)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (username) DO UPDATE
                SET name = EXCLUDED.name, roles = EXCLUDED.roles, team_id = EXCLUDED.team_id
                "#,
            )
            .bind(id)
            .bind(name)
            .bind(username)
            .bind(roles)
            .bind(team)
            .execute(&self.pool)
            .await?;
        }

        let project = Project {
            id: Uuid::parse_str("9e8d7c6b-5a49-4382-a1b0-c9d8e7f6a5b4")?,
            name: "Riverside Substation".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?,
            catalog: Catalog {
                divisions: vec!["Civil".into(), "Electrical".into()],
                part_nos: vec!["P1".into(), "P2".into(), "P3".into()],
                work_types: vec!["Drafting".into(), "QC".into()],
            },
            status: ProjectStatus::Active,
            remarks: None,
            hold_start_time: None,
            total_hold_duration: 0,
            rework_of: None,
            version: 0,
        };
        let exists = sqlx::query("SELECT 1 FROM work_allocation.projects WHERE id = $1")
            .bind(project.id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        if !exists {
            let mut conn = self.pool.acquire().await?;
            insert_project(&mut conn, &project).await?;
        }

        Ok(())
    }

    async fn groups_where(
        &self,
        clause: &str,
        id: Option<Uuid>,
    ) -> Result<Vec<GroupAssignment>, StoreError> {
        let sql = format!(
            "SELECT {GROUP_COLUMNS} FROM work_allocation.group_assignments {clause} \
             ORDER BY assigned_time, id"
        );
        let mut query = sqlx::query(&sql);
        if let Some(id) = id {
            query = query.bind(id);
        }
        query
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(group_from_row)
            .collect()
    }

    async fn members_where(
        &self,
        clause: &str,
        id: Option<Uuid>,
    ) -> Result<Vec<MemberAssignment>, StoreError> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM work_allocation.member_assignments {clause} \
             ORDER BY assigned_time, id"
        );
        let mut query = sqlx::query(&sql);
        if let Some(id) = id {
            query = query.bind(id);
        }
        query
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(member_from_row)
            .collect()
    }
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what}: {err}"))
}

fn parse_json<T: DeserializeOwned>(row: &PgRow, column: &str) -> Result<T, StoreError> {
    let value: serde_json::Value = row.try_get(column)?;
    serde_json::from_value(value).map_err(|e| corrupt(column, e))
}

fn parse_text<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: String| corrupt(column, e))
}

fn parse_rating(row: &PgRow) -> Result<Option<u8>, StoreError> {
    let raw: Option<i16> = row.try_get("rating")?;
    raw.map(|r| u8::try_from(r).map_err(|e| corrupt("rating", e)))
        .transpose()
}

fn project_from_row(row: &PgRow) -> Result<Project, StoreError> {
    Ok(Project {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        date: row.try_get("date")?,
        catalog: Catalog {
            divisions: row.try_get("divisions")?,
            part_nos: row.try_get("part_nos")?,
            work_types: row.try_get("work_types")?,
        },
        status: parse_text(row, "status")?,
        remarks: row.try_get("remarks")?,
        hold_start_time: row.try_get("hold_start_time")?,
        total_hold_duration: row.try_get("total_hold_duration")?,
        rework_of: row.try_get("rework_of")?,
        version: row.try_get("version")?,
    })
}

fn group_from_row(row: &PgRow) -> Result<GroupAssignment, StoreError> {
    Ok(GroupAssignment {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        team_id: row.try_get("team_id")?,
        scope: parse_json(row, "scope")?,
        file_size: row.try_get("file_size")?,
        assigned_time: row.try_get("assigned_time")?,
        eta: row.try_get("eta")?,
        status: parse_text(row, "status")?,
        rating: parse_rating(row)?,
        remarks: row.try_get("remarks")?,
        completion_time: row.try_get("completion_time")?,
        rejection_reason: row.try_get("rejection_reason")?,
        version: row.try_get("version")?,
    })
}

fn member_from_row(row: &PgRow) -> Result<MemberAssignment, StoreError> {
    Ok(MemberAssignment {
        id: row.try_get("id")?,
        group_assignment_id: row.try_get("group_assignment_id")?,
        member_id: row.try_get("member_id")?,
        scope: parse_json(row, "scope")?,
        assigned_time: row.try_get("assigned_time")?,
        eta: row.try_get("eta")?,
        completion_time: row.try_get("completion_time")?,
        status: parse_text(row, "status")?,
        rating: parse_rating(row)?,
        remarks: row.try_get("remarks")?,
        rework_from_id: row.try_get("rework_from_id")?,
        bonus_awarded: row.try_get("bonus_awarded")?,
        blackmarks_awarded: row.try_get("blackmarks_awarded")?,
        rejection_reason: row.try_get("rejection_reason")?,
        proof: row.try_get("proof")?,
        version: row.try_get("version")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let roles: Vec<String> = row.try_get("roles")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        username: row.try_get("username")?,
        roles: roles
            .iter()
            .map(|r| r.parse::<Role>().map_err(|e| corrupt("roles", e)))
            .collect::<Result<_, _>>()?,
        team_id: row.try_get("team_id")?,
        ledger: ScoreLedger {
            bonus_points: row.try_get("bonus_points")?,
            blackmarks: row.try_get("blackmarks")?,
        },
    })
}

fn team_from_row(row: &PgRow) -> Result<Team, StoreError> {
    Ok(Team {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        lead_ids: row.try_get("lead_ids")?,
        ledger: ScoreLedger {
            bonus_points: row.try_get("bonus_points")?,
            blackmarks: row.try_get("blackmarks")?,
        },
    })
}

fn expect_one(rows: u64, entity: Entity, id: Uuid) -> Result<(), StoreError> {
    if rows == 0 {
        return Err(StoreError::NotFound { entity, id });
    }
    Ok(())
}

/// An update that touched nothing either lost a version race or hit a
/// deleted row; tell the two apart.
async fn versioned(
    conn: &mut PgConnection,
    rows: u64,
    table: &str,
    entity: Entity,
    id: Uuid,
) -> Result<(), StoreError> {
    if rows > 0 {
        return Ok(());
    }
    let sql = format!("SELECT 1 FROM work_allocation.{table} WHERE id = $1");
    let exists = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .is_some();
    if exists {
        Err(StoreError::ConcurrentModification { entity, id })
    } else {
        Err(StoreError::NotFound { entity, id })
    }
}

/// Member writes share-lock their group so a group write that pinned the
/// member set waits for them, and they wait for it.
async fn lock_group(
    conn: &mut PgConnection,
    group_id: Uuid,
    exclusive: bool,
) -> Result<Option<i64>, StoreError> {
    let sql = if exclusive {
        "SELECT version FROM work_allocation.group_assignments WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT version FROM work_allocation.group_assignments WHERE id = $1 FOR SHARE"
    };
    let row = sqlx::query(sql)
        .bind(group_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(match row {
        Some(row) => Some(row.try_get("version")?),
        None => None,
    })
}

async fn insert_project(conn: &mut PgConnection, project: &Project) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO work_allocation.projects
        (id, name, date, divisions, part_nos, work_types, status, remarks,
         hold_start_time, total_hold_duration, rework_of, version)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(project.id)
    .bind(&project.name)
    .bind(project.date)
    .bind(project.catalog.divisions.as_slice())
    .bind(project.catalog.part_nos.as_slice())
    .bind(project.catalog.work_types.as_slice())
    .bind(project.status.as_str())
    .bind(&project.remarks)
    .bind(project.hold_start_time)
    .bind(project.total_hold_duration)
    .bind(project.rework_of)
    .bind(project.version)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn apply_write(conn: &mut PgConnection, write: &Write) -> Result<(), StoreError> {
    match write {
        Write::InsertProject(project) => insert_project(conn, project).await?,
        Write::UpdateProject(project) => {
            let done = sqlx::query(
                r#"
                UPDATE work_allocation.projects
                SET name = $3, date = $4, divisions = $5, part_nos = $6, work_types = $7,
                    status = $8, remarks = $9, hold_start_time = $10,
                    total_hold_duration = $11, rework_of = $12, version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(project.id)
            .bind(project.version)
            .bind(&project.name)
            .bind(project.date)
            .bind(project.catalog.divisions.as_slice())
            .bind(project.catalog.part_nos.as_slice())
            .bind(project.catalog.work_types.as_slice())
            .bind(project.status.as_str())
            .bind(&project.remarks)
            .bind(project.hold_start_time)
            .bind(project.total_hold_duration)
            .bind(project.rework_of)
            .execute(&mut *conn)
            .await?;
            versioned(conn, done.rows_affected(), "projects", Entity::Project, project.id).await?;
        }
        Write::DeleteProject(id) => {
            let done = sqlx::query("DELETE FROM work_allocation.projects WHERE id = $1")
                .bind(id)
                .execute(&mut *conn)
                .await?;
            expect_one(done.rows_affected(), Entity::Project, *id)?;
        }
        Write::InsertGroup(group) => {
            sqlx::query(
                r#"
                INSERT INTO work_allocation.group_assignments
                (id, project_id, team_id, scope, file_size, assigned_time, eta, status,
                 rating, remarks, completion_time, rejection_reason, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(group.id)
            .bind(group.project_id)
            .bind(group.team_id)
            .bind(sqlx::types::Json(&group.scope))
            .bind(&group.file_size)
            .bind(group.assigned_time)
            .bind(group.eta)
            .bind(group.status.as_str())
            .bind(group.rating.map(i16::from))
            .bind(&group.remarks)
            .bind(group.completion_time)
            .bind(&group.rejection_reason)
            .bind(group.version)
            .execute(&mut *conn)
            .await?;
        }
        Write::UpdateGroup(group) => {
            let done = sqlx::query(
                r#"
                UPDATE work_allocation.group_assignments
                SET team_id = $3, scope = $4, file_size = $5, assigned_time = $6, eta = $7,
                    status = $8, rating = $9, remarks = $10, completion_time = $11,
                    rejection_reason = $12, version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(group.id)
            .bind(group.version)
            .bind(group.team_id)
            .bind(sqlx::types::Json(&group.scope))
            .bind(&group.file_size)
            .bind(group.assigned_time)
            .bind(group.eta)
            .bind(group.status.as_str())
            .bind(group.rating.map(i16::from))
            .bind(&group.remarks)
            .bind(group.completion_time)
            .bind(&group.rejection_reason)
            .execute(&mut *conn)
            .await?;
            versioned(
                conn,
                done.rows_affected(),
                "group_assignments",
                Entity::GroupAssignment,
                group.id,
            )
            .await?;
        }
        Write::DeleteGroup(id) => {
            let done = sqlx::query("DELETE FROM work_allocation.group_assignments WHERE id = $1")
                .bind(id)
                .execute(&mut *conn)
                .await?;
            expect_one(done.rows_affected(), Entity::GroupAssignment, *id)?;
        }
        Write::InsertMember(member) => {
            lock_group(conn, member.group_assignment_id, false).await?;
            sqlx::query(
                r#"
                INSERT INTO work_allocation.member_assignments
                (id, group_assignment_id, member_id, scope, assigned_time, eta, completion_time,
                 status, rating, remarks, rework_from_id, bonus_awarded, blackmarks_awarded,
                 rejection_reason, proof, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                "#,
            )
            .bind(member.id)
            .bind(member.group_assignment_id)
            .bind(member.member_id)
            .bind(sqlx::types::Json(&member.scope))
            .bind(member.assigned_time)
            .bind(member.eta)
            .bind(member.completion_time)
            .bind(member.status.as_str())
            .bind(member.rating.map(i16::from))
            .bind(&member.remarks)
            .bind(member.rework_from_id)
            .bind(member.bonus_awarded)
            .bind(member.blackmarks_awarded)
            .bind(&member.rejection_reason)
            .bind(&member.proof)
            .bind(member.version)
            .execute(&mut *conn)
            .await?;
        }
        Write::UpdateMember(member) => {
            lock_group(conn, member.group_assignment_id, false).await?;
            let done = sqlx::query(
                r#"
                UPDATE work_allocation.member_assignments
                SET scope = $3, assigned_time = $4, eta = $5, completion_time = $6, status = $7,
                    rating = $8, remarks = $9, rework_from_id = $10, bonus_awarded = $11,
                    blackmarks_awarded = $12, rejection_reason = $13, proof = $14,
                    version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(member.id)
            .bind(member.version)
            .bind(sqlx::types::Json(&member.scope))
            .bind(member.assigned_time)
            .bind(member.eta)
            .bind(member.completion_time)
            .bind(member.status.as_str())
            .bind(member.rating.map(i16::from))
            .bind(&member.remarks)
            .bind(member.rework_from_id)
            .bind(member.bonus_awarded)
            .bind(member.blackmarks_awarded)
            .bind(&member.rejection_reason)
            .bind(&member.proof)
            .execute(&mut *conn)
            .await?;
            versioned(
                conn,
                done.rows_affected(),
                "member_assignments",
                Entity::MemberAssignment,
                member.id,
            )
            .await?;
        }
        Write::DeleteMember(id) => {
            let parent = sqlx::query(
                "SELECT group_assignment_id FROM work_allocation.member_assignments WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
            if let Some(row) = parent {
                lock_group(conn, row.try_get("group_assignment_id")?, false).await?;
            }
            let done = sqlx::query("DELETE FROM work_allocation.member_assignments WHERE id = $1")
                .bind(id)
                .execute(&mut *conn)
                .await?;
            expect_one(done.rows_affected(), Entity::MemberAssignment, *id)?;
        }
        Write::InsertUser(user) => {
            let roles: Vec<&str> = user.roles.iter().map(|r| r.as_str()).collect();
            sqlx::query(
                r#"
                INSERT INTO work_allocation.users
                (id, name, username, roles, team_id, bonus_points, blackmarks)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.username)
            .bind(roles)
            .bind(user.team_id)
            .bind(user.ledger.bonus_points)
            .bind(user.ledger.blackmarks)
            .execute(&mut *conn)
            .await?;
        }
        Write::InsertTeam(team) => {
            sqlx::query(
                r#"
                INSERT INTO work_allocation.teams (id, name, lead_ids, bonus_points, blackmarks)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(team.id)
            .bind(&team.name)
            .bind(team.lead_ids.as_slice())
            .bind(team.ledger.bonus_points)
            .bind(team.ledger.blackmarks)
            .execute(&mut *conn)
            .await?;
        }
        Write::ExpectGroup { id, version } => {
            let stored = lock_group(conn, *id, false)
                .await?
                .ok_or(StoreError::NotFound {
                    entity: Entity::GroupAssignment,
                    id: *id,
                })?;
            if stored != *version {
                return Err(StoreError::ConcurrentModification {
                    entity: Entity::GroupAssignment,
                    id: *id,
                });
            }
        }
        Write::ExpectMembers { group_id, seen } => {
            lock_group(conn, *group_id, true).await?;
            let rows = sqlx::query(
                "SELECT id, version FROM work_allocation.member_assignments \
                 WHERE group_assignment_id = $1 ORDER BY id",
            )
            .bind(group_id)
            .fetch_all(&mut *conn)
            .await?;
            let mut current = Vec::with_capacity(rows.len());
            for row in &rows {
                let id: Uuid = row.try_get("id")?;
                let version: i64 = row.try_get("version")?;
                current.push((id, version));
            }
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
            let (table, entity, id) = match target {
                ScoreTarget::User(id) => ("users", Entity::User, *id),
                ScoreTarget::Team(id) => ("teams", Entity::Team, *id),
            };
            let sql = format!(
                "UPDATE work_allocation.{table} \
                 SET bonus_points = bonus_points + $2, blackmarks = blackmarks + $3 \
                 WHERE id = $1"
            );
            let done = sqlx::query(&sql)
                .bind(id)
                .bind(bonus)
                .bind(blackmarks)
                .execute(&mut *conn)
                .await?;
            expect_one(done.rows_affected(), entity, id)?;
        }
    }
    Ok(())
}

#[async_trait]
impl PolicySource for PgStore {
    async fn policy(&self) -> Result<Policy, StoreError> {
        let rows = sqlx::query("SELECT key, value FROM work_allocation.system_config")
            .fetch_all(&self.pool)
            .await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: f64 = row.try_get("value")?;
            entries.push((key, value));
        }
        Ok(Policy::from_entries(entries))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn project(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM work_allocation.projects WHERE id = $1");
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(project_from_row)
            .transpose()
    }

    async fn projects(&self) -> Result<Vec<Project>, StoreError> {
        let sql =
            format!("SELECT {PROJECT_COLUMNS} FROM work_allocation.projects ORDER BY date, name");
        sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(project_from_row)
            .collect()
    }

    async fn project_graph(&self, id: Uuid) -> Result<Option<ProjectGraph>, StoreError> {
        let Some(project) = self.project(id).await? else {
            return Ok(None);
        };
        let groups = self.groups_where("WHERE project_id = $1", Some(id)).await?;
        let members = self
            .members_where(
                "WHERE group_assignment_id IN \
                 (SELECT id FROM work_allocation.group_assignments WHERE project_id = $1)",
                Some(id),
            )
            .await?;
        Ok(Some(ProjectGraph {
            project,
            groups,
            members,
        }))
    }

    async fn group_assignment(&self, id: Uuid) -> Result<Option<GroupAssignment>, StoreError> {
        Ok(self
            .groups_where("WHERE id = $1", Some(id))
            .await?
            .into_iter()
            .next())
    }

    async fn group_assignments(&self) -> Result<Vec<GroupAssignment>, StoreError> {
        self.groups_where("", None).await
    }

    async fn member_assignment(&self, id: Uuid) -> Result<Option<MemberAssignment>, StoreError> {
        Ok(self
            .members_where("WHERE id = $1", Some(id))
            .await?
            .into_iter()
            .next())
    }

    async fn member_assignments(&self) -> Result<Vec<MemberAssignment>, StoreError> {
        self.members_where("", None).await
    }

    async fn member_assignments_for_group(
        &self,
        group_id: Uuid,
    ) -> Result<Vec<MemberAssignment>, StoreError> {
        self.members_where("WHERE group_assignment_id = $1", Some(group_id))
            .await
    }

    async fn user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query(
            "SELECT id, name, username, roles, team_id, bonus_points, blackmarks \
             FROM work_allocation.users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(user_from_row)
        .transpose()
    }

    async fn users(&self) -> Result<Vec<User>, StoreError> {
        sqlx::query(
            "SELECT id, name, username, roles, team_id, bonus_points, blackmarks \
             FROM work_allocation.users ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(user_from_row)
        .collect()
    }

    async fn team(&self, id: Uuid) -> Result<Option<Team>, StoreError> {
        sqlx::query(
            "SELECT id, name, lead_ids, bonus_points, blackmarks \
             FROM work_allocation.teams WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(team_from_row)
        .transpose()
    }

    async fn teams(&self) -> Result<Vec<Team>, StoreError> {
        sqlx::query(
            "SELECT id, name, lead_ids, bonus_points, blackmarks \
             FROM work_allocation.teams ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(team_from_row)
        .collect()
    }

    async fn commit(&self, changes: &Changeset) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for write in &changes.writes {
            apply_write(&mut tx, write).await?;
        }
        tx.commit().await?;
        tracing::debug!(writes = changes.writes.len(), "changeset committed");
        Ok(())
    }
}
