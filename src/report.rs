use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{GroupAssignment, MemberAssignment, Project, ProjectStatus, Status, Team, User};
use crate::scope::Scope;

const TREND_DAYS: u32 = 7;
const TREND_MONTHS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStanding {
    pub team_id: Uuid,
    pub name: String,
    pub bonus_points: f64,
    pub blackmarks: f64,
    pub net_score: f64,
    pub completed: usize,
    pub total: usize,
    /// Completed over total group assignments, 0 when the team has none.
    pub productivity: f64,
    /// Mean hours from assignment to completion over completed work.
    pub avg_turnaround_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberStanding {
    pub user_id: Uuid,
    pub name: String,
    pub username: String,
    pub bonus_points: f64,
    pub blackmarks: f64,
    pub net_score: f64,
}

/// Workload across the whole ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub active_projects: usize,
    pub groups_completed_last_week: usize,
    pub teams: Vec<TeamLoad>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamLoad {
    pub team_id: Uuid,
    pub name: String,
    /// Group assignments neither COMPLETED nor REJECTED.
    pub open_groups: usize,
    /// Member assignments under the team neither COMPLETED nor REJECTED.
    pub pending_tasks: usize,
}

/// Bonus and blackmarks earned by completed member work in one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub label: String,
    pub start: NaiveDate,
    pub bonus: f64,
    pub blackmarks: f64,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberActivity {
    pub user_id: Uuid,
    pub name: String,
    pub bonus_points: f64,
    pub blackmarks: f64,
    pub completed: usize,
    pub completed_last_week: usize,
    pub pending_tasks: usize,
    pub avg_turnaround_hours: Option<f64>,
    /// Oldest day first, ending today.
    pub daily: Vec<TrendPoint>,
    /// Oldest month first, ending with the current month.
    pub monthly: Vec<TrendPoint>,
}

/// Member assignments whose `assigned_time` falls in `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportFilter {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub team_id: Option<Uuid>,
    pub member_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub member_assignment_id: Uuid,
    pub project_name: String,
    pub team_name: String,
    pub member_name: String,
    pub scope: Scope,
    pub status: Status,
    pub assigned_time: DateTime<Utc>,
    pub eta: DateTime<Utc>,
    pub completion_time: Option<DateTime<Utc>>,
    pub rating: Option<u8>,
    pub bonus_awarded: f64,
    pub blackmarks_awarded: f64,
}

fn is_open(status: Status) -> bool {
    !matches!(status, Status::Completed | Status::Rejected)
}

fn mean_hours(spans: impl Iterator<Item = Duration>) -> Option<f64> {
    let hours: Vec<f64> = spans.map(|s| s.num_minutes() as f64 / 60.0).collect();
    if hours.is_empty() {
        None
    } else {
        Some(hours.iter().sum::<f64>() / hours.len() as f64)
    }
}

pub fn overview(
    projects: &[Project],
    teams: &[Team],
    groups: &[GroupAssignment],
    members: &[MemberAssignment],
    now: DateTime<Utc>,
) -> Overview {
    let week_ago = now - Duration::days(7);
    let team_of: HashMap<Uuid, Uuid> = groups.iter().map(|g| (g.id, g.team_id)).collect();

    let mut loads: Vec<TeamLoad> = teams
        .iter()
        .map(|team| TeamLoad {
            team_id: team.id,
            name: team.name.clone(),
            open_groups: groups
                .iter()
                .filter(|g| g.team_id == team.id && is_open(g.status))
                .count(),
            pending_tasks: members
                .iter()
                .filter(|m| is_open(m.status))
                .filter(|m| team_of.get(&m.group_assignment_id) == Some(&team.id))
                .count(),
        })
        .collect();
    loads.sort_by(|a, b| {
        b.pending_tasks
            .cmp(&a.pending_tasks)
            .then_with(|| a.name.cmp(&b.name))
    });

    Overview {
        active_projects: projects
            .iter()
            .filter(|p| p.status == ProjectStatus::Active)
            .count(),
        groups_completed_last_week: groups
            .iter()
            .filter(|g| g.status == Status::Completed)
            .filter(|g| g.completion_time.is_some_and(|at| at > week_ago))
            .count(),
        teams: loads,
    }
}

fn bucket<'a>(
    label: String,
    start: NaiveDate,
    done: impl Iterator<Item = &'a MemberAssignment>,
) -> TrendPoint {
    let mut point = TrendPoint {
        label,
        start,
        bonus: 0.0,
        blackmarks: 0.0,
        completed: 0,
    };
    for member in done {
        point.bonus += member.bonus_awarded;
        point.blackmarks += member.blackmarks_awarded;
        point.completed += 1;
    }
    point
}

/// Completed work of one user, bucketed by day for the last week and by
/// calendar month for the last half year.
pub fn member_activity(
    user: &User,
    members: &[MemberAssignment],
    now: DateTime<Utc>,
) -> MemberActivity {
    let own: Vec<&MemberAssignment> = members.iter().filter(|m| m.member_id == user.id).collect();
    let done: Vec<(&MemberAssignment, DateTime<Utc>)> = own
        .iter()
        .copied()
        .filter(|m| m.status == Status::Completed)
        .filter_map(|m| m.completion_time.map(|at| (m, at)))
        .collect();
    let today = now.date_naive();
    let week_ago = now - Duration::days(7);

    let daily = (0..TREND_DAYS)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(u64::from(back))))
        .map(|day| {
            bucket(
                day.format("%a").to_string(),
                day,
                done.iter()
                    .filter(|(_, at)| at.date_naive() == day)
                    .map(|(m, _)| *m),
            )
        })
        .collect();

    let this_month = today.with_day(1).unwrap_or(today);
    let monthly = (0..TREND_MONTHS)
        .rev()
        .filter_map(|back| this_month.checked_sub_months(Months::new(back)))
        .map(|month| {
            bucket(
                month.format("%b").to_string(),
                month,
                done.iter()
                    .filter(|(_, at)| at.year() == month.year() && at.month() == month.month())
                    .map(|(m, _)| *m),
            )
        })
        .collect();

    MemberActivity {
        user_id: user.id,
        name: user.name.clone(),
        bonus_points: user.ledger.bonus_points,
        blackmarks: user.ledger.blackmarks,
        completed: done.len(),
        completed_last_week: done.iter().filter(|(_, at)| *at > week_ago).count(),
        pending_tasks: own.iter().filter(|m| is_open(m.status)).count(),
        avg_turnaround_hours: mean_hours(done.iter().map(|(m, at)| *at - m.assigned_time)),
        daily,
        monthly,
    }
}

/// Member assignments joined with their project, team and member names,
/// newest first. Rows whose parents are gone are skipped.
pub fn assignment_report(
    filter: &ReportFilter,
    projects: &[Project],
    teams: &[Team],
    users: &[User],
    groups: &[GroupAssignment],
    members: &[MemberAssignment],
) -> Vec<ReportRow> {
    let projects: HashMap<Uuid, &Project> = projects.iter().map(|p| (p.id, p)).collect();
    let teams: HashMap<Uuid, &Team> = teams.iter().map(|t| (t.id, t)).collect();
    let users: HashMap<Uuid, &User> = users.iter().map(|u| (u.id, u)).collect();
    let groups: HashMap<Uuid, &GroupAssignment> = groups.iter().map(|g| (g.id, g)).collect();

    let mut rows: Vec<ReportRow> = members
        .iter()
        .filter(|m| m.assigned_time >= filter.from && m.assigned_time <= filter.to)
        .filter(|m| filter.member_id.is_none_or(|id| m.member_id == id))
        .filter_map(|m| {
            let group = groups.get(&m.group_assignment_id)?;
            if filter.team_id.is_some_and(|id| group.team_id != id) {
                return None;
            }
            Some(ReportRow {
                member_assignment_id: m.id,
                project_name: projects.get(&group.project_id)?.name.clone(),
                team_name: teams.get(&group.team_id)?.name.clone(),
                member_name: users.get(&m.member_id)?.name.clone(),
                scope: m.scope.clone(),
                status: m.status,
                assigned_time: m.assigned_time,
                eta: m.eta,
                completion_time: m.completion_time,
                rating: m.rating,
                bonus_awarded: m.bonus_awarded,
                blackmarks_awarded: m.blackmarks_awarded,
            })
        })
        .collect();
    rows.sort_by(|a, b| b.assigned_time.cmp(&a.assigned_time));
    rows
}

pub fn team_standings(teams: &[Team], groups: &[GroupAssignment]) -> Vec<TeamStanding> {
    let mut standings: Vec<TeamStanding> = teams
        .iter()
        .map(|team| {
            let owned: Vec<&GroupAssignment> =
                groups.iter().filter(|g| g.team_id == team.id).collect();
            let done: Vec<&GroupAssignment> = owned
                .iter()
                .copied()
                .filter(|g| g.status == Status::Completed)
                .collect();


            TeamStanding {
                team_id: team.id,
                name: team.name.clone(),
                bonus_points: team.ledger.bonus_points,
                blackmarks: team.ledger.blackmarks,
                net_score: team.ledger.net_score(),
                completed: done.len(),
                total: owned.len(),
                productivity: if owned.is_empty() {
                    0.0
                } else {
                    done.len() as f64 / owned.len() as f64
                },
                avg_turnaround_hours: mean_hours(
                    done.iter()
                        .filter_map(|g| g.completion_time.map(|at| at - g.assigned_time)),
                ),
            }
        })
        .collect();

    standings.sort_by(|a, b| {
        b.net_score
            .total_cmp(&a.net_score)
            .then_with(|| a.name.cmp(&b.name))
    });
    standings
}

/// Members of `team_id`, or every user when no team is given.
pub fn member_standings(users: &[User], team_id: Option<Uuid>) -> Vec<MemberStanding> {
    let mut standings: Vec<MemberStanding> = users
        .iter()
        .filter(|u| team_id.is_none() || u.team_id == team_id)
        .map(|u| MemberStanding {
            user_id: u.id,
            name: u.name.clone(),
            username: u.username.clone(),
            bonus_points: u.ledger.bonus_points,
            blackmarks: u.ledger.blackmarks,
            net_score: u.ledger.net_score(),
        })
        .collect();

    standings.sort_by(|a, b| {
        b.net_score
            .total_cmp(&a.net_score)
            .then_with(|| a.name.cmp(&b.name))
    });
    standings
}

pub fn render_team_standings(standings: &[TeamStanding]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Team standings:");

    if standings.is_empty() {
        let _ = writeln!(output, "No teams recorded.");
        return output;
    }

    for (rank, team) in standings.iter().enumerate() {
        let turnaround = team
            .avg_turnaround_hours
            .map(|h| format!("{h:.1}h avg turnaround"))
            .unwrap_or_else(|| "no completed work".to_string());
        let _ = writeln!(
            output,
            "{}. {} net {:.1} (+{:.1} / -{:.1}), {}/{} done ({:.0}%), {}",
            rank + 1,
            team.name,
            team.net_score,
            team.bonus_points,
            team.blackmarks,
            team.completed,
            team.total,
            team.productivity * 100.0,
            turnaround
        );
    }

    output
}

pub fn render_member_standings(standings: &[MemberStanding]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Member standings:");

    if standings.is_empty() {
        let _ = writeln!(output, "No members recorded.");
        return output;
    }

    for (rank, member) in standings.iter().enumerate() {
        let _ = writeln!(
            output,
            "{}. {} ({}) net {:.1} (+{:.1} / -{:.1})",
            rank + 1,
            member.name,
            member.username,
            member.net_score,
            member.bonus_points,
            member.blackmarks
        );
    }

    output
}

pub fn render_overview(overview: &Overview) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Overview:");
    let _ = writeln!(output, "- Active projects: {}", overview.active_projects);
    let _ = writeln!(
        output,
        "- Group assignments completed in the last 7 days: {}",
        overview.groups_completed_last_week
    );
    let _ = writeln!(output, "\nTeam workload:");
    if overview.teams.is_empty() {
        let _ = writeln!(output, "No teams recorded.");
    }
    for team in &overview.teams {
        let _ = writeln!(
            output,
            "- {}: {} open assignments, {} pending tasks",
            team.name, team.open_groups, team.pending_tasks
        );
    }
    output
}

fn render_trend(output: &mut String, title: &str, points: &[TrendPoint]) {
    let _ = writeln!(output, "\n{title}:");
    for point in points {
        let _ = writeln!(
            output,
            "- {} {}: {} done, +{:.1} / -{:.1}",
            point.label, point.start, point.completed, point.bonus, point.blackmarks
        );
    }
}

pub fn render_member_activity(activity: &MemberActivity) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Activity for {}:", activity.name);
    let _ = writeln!(
        output,
        "- Score: +{:.1} / -{:.1}",
        activity.bonus_points, activity.blackmarks
    );
    let _ = writeln!(
        output,
        "- Completed: {} ({} in the last 7 days)",
        activity.completed, activity.completed_last_week
    );
    let _ = writeln!(output, "- Pending tasks: {}", activity.pending_tasks);
    if let Some(hours) = activity.avg_turnaround_hours {
        let _ = writeln!(output, "- Average turnaround: {hours:.1}h");
    }
    render_trend(&mut output, "Daily", &activity.daily);
    render_trend(&mut output, "Monthly", &activity.monthly);
    output
}

pub fn render_assignment_report(rows: &[ReportRow]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Assignment report:");

    if rows.is_empty() {
        let _ = writeln!(output, "No assignments in range.");
        return output;
    }

    for row in rows {
        let rating = row
            .rating
            .map(|r| format!("{r}/5"))
            .unwrap_or_else(|| "unrated".to_string());
        let _ = writeln!(
            output,
            "- {} | {} | {} | {} | {} | {} | +{:.1} / -{:.1}",
            row.assigned_time.format("%Y-%m-%d %H:%M"),
            row.project_name,
            row.team_name,
            row.member_name,
            row.status,
            rating,
            row.bonus_awarded,
            row.blackmarks_awarded
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, ScoreLedger};
    use crate::scope::Scope;
    use chrono::{Duration, TimeZone, Utc};

    fn team(name: &str, bonus: f64, blackmarks: f64) -> Team {
        Team {
            id: Uuid::new_v4(),
            name: name.to_string(),
            lead_ids: vec![],
            ledger: ScoreLedger {
                bonus_points: bonus,
                blackmarks,
            },
        }
    }

    fn group(team_id: Uuid, status: Status, hours: Option<i64>) -> GroupAssignment {
        let assigned = Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap();
        GroupAssignment {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            team_id,
            scope: Scope::default(),
            file_size: String::new(),
            assigned_time: assigned,
            eta: assigned + Duration::days(1),
            status,
            rating: None,
            remarks: None,
            completion_time: hours.map(|h| assigned + Duration::hours(h)),
            rejection_reason: None,
            version: 0,
        }
    }

    #[test]
    fn teams_rank_by_net_score_with_productivity() {
        let north = team("North", 10.0, 2.0);
        let south = team("South", 4.0, 0.0);
        let groups = vec![
            group(north.id, Status::Completed, Some(10)),
            group(north.id, Status::Completed, Some(20)),
            group(north.id, Status::InProgress, None),
            group(north.id, Status::PendingAck, Some(5)),
        ];

        let standings = team_standings(&[south.clone(), north.clone()], &groups);
        assert_eq!(standings[0].name, "North");
        assert_eq!(standings[0].net_score, 8.0);
        assert_eq!(standings[0].completed, 2);
        assert_eq!(standings[0].total, 4);
        assert_eq!(standings[0].productivity, 0.5);
        assert_eq!(standings[0].avg_turnaround_hours, Some(15.0));

        assert_eq!(standings[1].name, "South");
        assert_eq!(standings[1].productivity, 0.0);
        assert_eq!(standings[1].avg_turnaround_hours, None);

        let text = render_team_standings(&standings);
        assert!(text.contains("1. North net 8.0"));
        assert!(text.contains("2/4 done (50%)"));
    }

    #[test]
    fn members_filter_by_team() {
        let team_id = Uuid::new_v4();
        let user = |name: &str, team: Option<Uuid>, bonus: f64| User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            username: name.to_lowercase(),
            roles: vec![Role::Member],
            team_id: team,
            ledger: ScoreLedger {
                bonus_points: bonus,
                blackmarks: 1.0,
            },
        };
        let users = vec![
            user("Ana", Some(team_id), 3.0),
            user("Ben", Some(team_id), 7.0),
            user("Cy", None, 20.0),
        ];

        let standings = member_standings(&users, Some(team_id));
        let names: Vec<&str> = standings.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Ben", "Ana"]);
        assert_eq!(standings[0].net_score, 6.0);

        assert_eq!(member_standings(&users, None).len(), 3);
        assert!(render_member_standings(&[]).contains("No members recorded."));
    }

    fn member(
        group: &GroupAssignment,
        user_id: Uuid,
        status: Status,
        done_at: Option<DateTime<Utc>>,
        bonus: f64,
    ) -> MemberAssignment {
        let assigned = Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap();
        MemberAssignment {
            id: Uuid::new_v4(),
            group_assignment_id: group.id,
            member_id: user_id,
            scope: Scope::default(),
            assigned_time: assigned,
            eta: assigned + Duration::days(2),
            completion_time: done_at,
            status,
            rating: done_at.map(|_| 4),
            remarks: None,
            rework_from_id: None,
            bonus_awarded: bonus,
            blackmarks_awarded: 0.0,
            rejection_reason: None,
            proof: None,
            version: 0,
        }
    }

    fn project(name: &str, status: ProjectStatus) -> Project {
        Project {
            id: Uuid::new_v4(),
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            catalog: crate::scope::Catalog::default(),
            status,
            remarks: None,
            hold_start_time: None,
            total_hold_duration: 0,
            rework_of: None,
            version: 0,
        }
    }

    fn person(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            username: name.to_lowercase(),
            roles: vec![Role::Member],
            team_id: None,
            ledger: ScoreLedger {
                bonus_points: 9.0,
                blackmarks: 2.0,
            },
        }
    }

    #[test]
    fn overview_counts_recent_completions_and_open_work() {
        let now = Utc.with_ymd_and_hms(2026, 4, 10, 12, 0, 0).unwrap();
        let north = team("North", 0.0, 0.0);
        let south = team("South", 0.0, 0.0);
        let projects = vec![
            project("Harbour", ProjectStatus::Active),
            project("Quay", ProjectStatus::OnHold),
        ];

        let mut recent = group(north.id, Status::Completed, None);
        recent.completion_time = Some(now - Duration::days(2));
        let mut stale = group(north.id, Status::Completed, None);
        stale.completion_time = Some(now - Duration::days(9));
        let open = group(south.id, Status::InProgress, None);
        let dropped = group(south.id, Status::Rejected, None);

        let someone = Uuid::new_v4();
        let members = vec![
            member(&open, someone, Status::InProgress, None, 0.0),
            member(&open, someone, Status::PendingAck, None, 0.0),
            member(&open, someone, Status::Rejected, None, 0.0),
            member(&recent, someone, Status::Completed, Some(now), 6.0),
        ];
        let groups = vec![recent, stale, open, dropped];

        let summary = overview(&projects, &[north, south], &groups, &members, now);
        assert_eq!(summary.active_projects, 1);
        assert_eq!(summary.groups_completed_last_week, 1);
        assert_eq!(summary.teams[0].name, "South");
        assert_eq!(summary.teams[0].open_groups, 1);
        assert_eq!(summary.teams[0].pending_tasks, 2);
        assert_eq!(summary.teams[1].pending_tasks, 0);

        let text = render_overview(&summary);
        assert!(text.contains("- Active projects: 1"));
        assert!(text.contains("- South: 1 open assignments, 2 pending tasks"));
    }

    #[test]
    fn activity_buckets_completed_work_by_day_and_month() {
        let now = Utc.with_ymd_and_hms(2026, 4, 10, 18, 0, 0).unwrap();
        let ana = person("Ana");
        let g = group(Uuid::new_v4(), Status::InProgress, None);
        let members = vec![
            member(&g, ana.id, Status::Completed, Some(now - Duration::hours(2)), 6.0),
            member(&g, ana.id, Status::Completed, Some(now - Duration::days(3)), 3.0),
            member(&g, ana.id, Status::Completed, Some(now - Duration::days(40)), 1.0),
            member(&g, ana.id, Status::InProgress, None, 0.0),
            member(&g, Uuid::new_v4(), Status::Completed, Some(now), 5.0),
        ];

        let activity = member_activity(&ana, &members, now);
        assert_eq!(activity.completed, 3);
        assert_eq!(activity.completed_last_week, 2);
        assert_eq!(activity.pending_tasks, 1);

        assert_eq!(activity.daily.len(), 7);
        let today = activity.daily.last().unwrap();
        assert_eq!(today.start, NaiveDate::from_ymd_opt(2026, 4, 10).unwrap());
        assert_eq!(today.label, "Fri");
        assert_eq!((today.completed, today.bonus), (1, 6.0));
        assert_eq!(activity.daily[3].bonus, 3.0);
        assert_eq!(activity.daily.iter().map(|p| p.completed).sum::<usize>(), 2);

        let months: Vec<&str> = activity.monthly.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(months, vec!["Nov", "Dec", "Jan", "Feb", "Mar", "Apr"]);
        assert_eq!(activity.monthly[5].bonus, 9.0);
        assert_eq!(activity.monthly[4].bonus, 1.0);

        let text = render_member_activity(&activity);
        assert!(text.contains("- Completed: 3 (2 in the last 7 days)"));
    }

    #[test]
    fn assignment_report_filters_by_range_team_and_member() {
        let north = team("North", 0.0, 0.0);
        let south = team("South", 0.0, 0.0);
        let site = project("Harbour", ProjectStatus::Active);
        let ana = person("Ana");
        let ben = person("Ben");

        let mut north_group = group(north.id, Status::InProgress, None);
        north_group.project_id = site.id;
        let mut south_group = group(south.id, Status::InProgress, None);
        south_group.project_id = site.id;

        let early = member(&north_group, ana.id, Status::InProgress, None, 0.0);
        let mut late = member(&north_group, ben.id, Status::InProgress, None, 0.0);
        late.assigned_time = early.assigned_time + Duration::days(1);
        let mut other_team = member(&south_group, ana.id, Status::InProgress, None, 0.0);
        other_team.assigned_time = early.assigned_time + Duration::hours(1);
        let mut outside = member(&north_group, ana.id, Status::InProgress, None, 0.0);
        outside.assigned_time = early.assigned_time + Duration::days(30);

        let members = vec![early.clone(), late.clone(), other_team, outside];
        let groups = vec![north_group, south_group];
        let teams = vec![north.clone(), south];
        let users = vec![ana.clone(), ben];
        let projects = vec![site];
        let mut filter = ReportFilter {
            from: early.assigned_time,
            to: early.assigned_time + Duration::days(7),
            team_id: Some(north.id),
            member_id: None,
        };

        let rows = assignment_report(&filter, &projects, &teams, &users, &groups, &members);
        let ids: Vec<Uuid> = rows.iter().map(|r| r.member_assignment_id).collect();
        assert_eq!(ids, vec![late.id, early.id]);
        assert_eq!(rows[0].member_name, "Ben");
        assert_eq!(rows[0].project_name, "Harbour");

        filter.team_id = None;
        filter.member_id = Some(ana.id);
        let rows = assignment_report(&filter, &projects, &teams, &users, &groups, &members);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.member_name == "Ana"));
        assert!(render_assignment_report(&rows).contains("| Harbour | South | Ana |"));
        assert!(render_assignment_report(&[]).contains("No assignments in range."));
    }
}
