//! Allocation and completion percentages over a project's assignment tree.
//!
//! Every work unit collects one boolean per non-rejected assignment instance
//! covering it (`true` when that instance is done). A unit is allocated when
//! it has at least one instance and complete when all of them are `true`.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{GroupAssignment, MemberAssignment, ProjectGraph, Status};
use crate::scope::{Symbols, UnitSet, WorkUnit};

/// `round(100 * count / total)`, zero when there is nothing to count.
pub fn percent(count: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (100.0 * count as f64 / total as f64).round() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub total: usize,
    pub allocated: usize,
    pub completed: usize,
    pub allocation_percent: u8,
    pub completion_percent: u8,
}

impl Progress {
    fn new(total: usize, allocated: usize, completed: usize) -> Self {
        Self {
            total,
            allocated,
            completed,
            allocation_percent: percent(allocated, total),
            completion_percent: percent(completed, total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisProgress {
    pub name: String,
    pub allocated: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    pub project_id: Uuid,
    #[serde(flatten)]
    pub summary: Progress,
    pub divisions: Vec<AxisProgress>,
    pub part_nos: Vec<AxisProgress>,
    pub work_types: Vec<AxisProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub group_assignment_id: Uuid,
    #[serde(flatten)]
    pub summary: Progress,
    /// Units that are not complete yet, as `division - part - workType`.
    pub missing: Vec<String>,
}

#[derive(Debug, Default)]
struct Coverage(BTreeMap<WorkUnit, Vec<bool>>);

impl Coverage {
    fn record(&mut self, unit: &WorkUnit, done: bool) {
        self.0.entry(unit.clone()).or_default().push(done);
    }

    fn is_allocated(&self, unit: &WorkUnit) -> bool {
        self.0.get(unit).is_some_and(|flags| !flags.is_empty())
    }

    fn is_complete(&self, unit: &WorkUnit) -> bool {
        self.0
            .get(unit)
            .is_some_and(|flags| !flags.is_empty() && flags.iter().all(|done| *done))
    }

    fn summarize(&self, universe: &UnitSet) -> Progress {
        let allocated = universe.iter().filter(|u| self.is_allocated(u)).count();
        let completed = universe.iter().filter(|u| self.is_complete(u)).count();
        Progress::new(universe.len(), allocated, completed)
    }

    fn axis<F>(&self, universe: &UnitSet, names: &[String], key: F) -> Vec<AxisProgress>
    where
        F: Fn(&WorkUnit) -> &str,
    {
        names
            .iter()
            .map(|name| {
                let mut allocated = false;
                let mut completed = true;
                for unit in universe.iter().filter(|u| key(u) == name.as_str()) {
                    if self.is_allocated(unit) {
                        allocated = true;
                        completed &= self.is_complete(unit);
                    }
                }
                AxisProgress {
                    name: name.clone(),
                    allocated,
                    completed: allocated && completed,
                }
            })
            .collect()
    }
}

fn live_members<'a>(
    members: impl Iterator<Item = &'a MemberAssignment>,
) -> impl Iterator<Item = &'a MemberAssignment> {
    members.filter(|m| m.status != Status::Rejected)
}

/// Record member-level instances for the units of `universe`.
fn cover_members<'a>(
    coverage: &mut Coverage,
    symbols: &mut Symbols,
    universe: &UnitSet,
    members: impl Iterator<Item = &'a MemberAssignment>,
) {
    for member in live_members(members) {
        let done = member.status == Status::Completed;
        for unit in member.scope.units(symbols).intersection(universe).iter() {
            coverage.record(unit, done);
        }
    }
}

pub fn project_stats(graph: &ProjectGraph) -> ProjectStats {
    let mut symbols = Symbols::new();
    let catalog = &graph.project.catalog;
    let universe = catalog.units(&mut symbols);
    let mut coverage = Coverage::default();

    for group in graph.groups.iter().filter(|g| g.status != Status::Rejected) {
        let group_units = group.scope.units(&mut symbols).intersection(&universe);
        if group.status == Status::Completed {
            for unit in group_units.iter() {
                coverage.record(unit, true);
            }
            continue;
        }

        let mut inner = Coverage::default();
        cover_members(
            &mut inner,
            &mut symbols,
            &group_units,
            graph.members_of(group.id),
        );
        for unit in group_units.iter() {
            coverage.record(unit, inner.is_complete(unit));
        }
    }

    ProjectStats {
        project_id: graph.project.id,
        summary: coverage.summarize(&universe),
        divisions: coverage.axis(&universe, &catalog.divisions, |u| &*u.division),
        part_nos: coverage.axis(&universe, &catalog.part_nos, |u| &*u.part),
        work_types: coverage.axis(&universe, &catalog.work_types, |u| &*u.work_type),
    }
}

pub fn group_stats(group: &GroupAssignment, members: &[MemberAssignment]) -> GroupStats {
    let mut symbols = Symbols::new();
    let universe = group.scope.units(&mut symbols);
    let mut coverage = Coverage::default();
    cover_members(&mut coverage, &mut symbols, &universe, members.iter());

    let missing = universe
        .iter()
        .filter(|u| !coverage.is_complete(u))
        .map(ToString::to_string)
        .collect();

    GroupStats {
        group_assignment_id: group.id,
        summary: coverage.summarize(&universe),
        missing,
    }
}

/// Number of member assignments under a group that still hold scope.
pub fn active_members(members: &[MemberAssignment]) -> usize {
    live_members(members.iter()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Project, ProjectStatus};
    use crate::scope::{Catalog, Scope, ScopeItem, ScopePart};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn scope(division: &str, part: &str, work_types: &[&str]) -> Scope {
        Scope(vec![ScopeItem {
            division: division.to_string(),
            parts: vec![ScopePart {
                name: part.to_string(),
                work_types: work_types.iter().map(|s| s.to_string()).collect(),
            }],
        }])
    }

    fn project(divisions: &[&str], parts: &[&str], work_types: &[&str]) -> Project {
        let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        Project {
            id: Uuid::new_v4(),
            name: "Harbour Tunnel".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            catalog: Catalog {
                divisions: strings(divisions),
                part_nos: strings(parts),
                work_types: strings(work_types),
            },
            status: ProjectStatus::Active,
            remarks: None,
            hold_start_time: None,
            total_hold_duration: 0,
            rework_of: None,
            version: 0,
        }
    }

    fn group(project_id: Uuid, scope: Scope, status: Status) -> GroupAssignment {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        GroupAssignment {
            id: Uuid::new_v4(),
            project_id,
            team_id: Uuid::new_v4(),
            scope,
            file_size: String::new(),
            assigned_time: at,
            eta: at,
            status,
            rating: None,
            remarks: None,
            completion_time: None,
            rejection_reason: None,
            version: 0,
        }
    }

    fn member(group_id: Uuid, scope: Scope, status: Status) -> MemberAssignment {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        MemberAssignment {
            id: Uuid::new_v4(),
            group_assignment_id: group_id,
            member_id: Uuid::new_v4(),
            scope,
            assigned_time: at,
            eta: at,
            completion_time: None,
            status,
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

    #[test]
    fn percent_rounds_and_guards_zero_total() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(5, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(3, 3), 100);
    }

    #[test]
    fn two_division_scenario() {
        let project = project(&["D1", "D2"], &["P1"], &["WT1"]);
        let a = group(project.id, scope("D1", "P1", &["WT1"]), Status::Completed);
        let a_member = member(a.id, scope("D1", "P1", &["WT1"]), Status::Completed);
        let mut graph = ProjectGraph {
            project,
            groups: vec![a],
            members: vec![a_member],
        };

        let stats = project_stats(&graph);
        assert_eq!(stats.summary.total, 2);
        assert_eq!(stats.summary.allocation_percent, 50);
        assert_eq!(stats.summary.completion_percent, 50);

        let b = group(graph.project.id, scope("D2", "P1", &["WT1"]), Status::InProgress);
        graph.groups.push(b);

        let stats = project_stats(&graph);
        assert_eq!(stats.summary.allocation_percent, 100);
        assert_eq!(stats.summary.completion_percent, 50);
        assert_eq!(
            stats.divisions,
            vec![
                AxisProgress {
                    name: "D1".to_string(),
                    allocated: true,
                    completed: true,
                },
                AxisProgress {
                    name: "D2".to_string(),
                    allocated: true,
                    completed: false,
                },
            ]
        );
        assert!(stats.part_nos[0].allocated);
        assert!(!stats.part_nos[0].completed);
    }

    #[test]
    fn rejected_groups_do_not_allocate() {
        let project = project(&["D1"], &["P1"], &["WT1", "WT2"]);
        let rejected = group(project.id, scope("D1", "P1", &["WT1", "WT2"]), Status::Rejected);
        let graph = ProjectGraph {
            project,
            groups: vec![rejected],
            members: vec![],
        };

        let stats = project_stats(&graph);
        assert_eq!(stats.summary.allocated, 0);
        assert_eq!(stats.summary.completion_percent, 0);
        assert!(stats.work_types.iter().all(|a| !a.allocated));
    }

    #[test]
    fn in_progress_group_completes_units_through_members() {
        let project = project(&["D1"], &["P1"], &["WT1", "WT2"]);
        let g = group(project.id, scope("D1", "P1", &["WT1", "WT2"]), Status::InProgress);
        let done = member(g.id, scope("D1", "P1", &["WT1"]), Status::Completed);
        let dropped = member(g.id, scope("D1", "P1", &["WT2"]), Status::Rejected);
        let graph = ProjectGraph {
            project,
            groups: vec![g],
            members: vec![done, dropped],
        };

        let stats = project_stats(&graph);
        assert_eq!(stats.summary.allocation_percent, 100);
        assert_eq!(stats.summary.completion_percent, 50);
    }

    #[test]
    fn allocation_never_trails_completion() {
        let project = project(&["D1", "D2"], &["P1", "P2"], &["WT1", "WT2"]);
        let statuses = [
            Status::Pending,
            Status::InProgress,
            Status::PendingAck,
            Status::Completed,
            Status::Rejected,
            Status::RejectionReq,
        ];
        for group_status in statuses {
            for member_status in statuses {
                let g = group(project.id, scope("D1", "P1", &["WT1", "WT2"]), group_status);
                let m = member(g.id, scope("D1", "P1", &["WT1"]), member_status);
                let graph = ProjectGraph {
                    project: project.clone(),
                    groups: vec![g],
                    members: vec![m],
                };
                let stats = project_stats(&graph);
                assert!(
                    stats.summary.allocation_percent >= stats.summary.completion_percent,
                    "{group_status}/{member_status}"
                );
            }
        }
    }

    #[test]
    fn group_stats_list_missing_units() {
        let project = project(&["D1"], &["P1"], &["WT1", "WT2"]);
        let g = group(project.id, scope("D1", "P1", &["WT1", "WT2"]), Status::InProgress);
        let members = vec![
            member(g.id, scope("D1", "P1", &["WT1"]), Status::Completed),
            member(g.id, scope("D1", "P1", &["WT2"]), Status::PendingAck),
        ];

        let stats = group_stats(&g, &members);
        assert_eq!(stats.summary.total, 2);
        assert_eq!(stats.summary.allocation_percent, 100);
        assert_eq!(stats.summary.completion_percent, 50);
        assert_eq!(stats.missing, vec!["D1 - P1 - WT2".to_string()]);
        assert_eq!(active_members(&members), 2);
    }

    #[test]
    fn empty_group_is_zero_percent() {
        let g = group(Uuid::new_v4(), Scope::default(), Status::Pending);
        let stats = group_stats(&g, &[]);
        assert_eq!(stats.summary, Progress::new(0, 0, 0));
        assert!(stats.missing.is_empty());
    }
}
