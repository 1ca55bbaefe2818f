//! Work scope: the Division x Part x WorkType cube and the subsets of it
//! that get allocated to teams and members.
//!
//! The wire form is the nested [`Scope`] tree. All set reasoning happens on
//! [`UnitSet`], a flat ordered set of [`WorkUnit`] triples whose axis names
//! are interned through [`Symbols`] so that the same name is shared by every
//! unit built in one computation.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ScopeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopePart {
    pub name: String,
    #[serde(default)]
    pub work_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeItem {
    pub division: String,
    #[serde(default)]
    pub parts: Vec<ScopePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(pub Vec<ScopeItem>);

/// Interner for axis names.
#[derive(Debug, Default)]
pub struct Symbols {
    names: HashSet<Arc<str>>,
}

impl Symbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Arc<str> {
        if let Some(existing) = self.names.get(name) {
            return Arc::clone(existing);
        }
        let symbol: Arc<str> = Arc::from(name);
        self.names.insert(Arc::clone(&symbol));
        symbol
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkUnit {
    pub division: Arc<str>,
    pub part: Arc<str>,
    pub work_type: Arc<str>,
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} - {}", self.division, self.part, self.work_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitSet(BTreeSet<WorkUnit>);

impl UnitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: WorkUnit) -> bool {
        self.0.insert(unit)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, unit: &WorkUnit) -> bool {
        self.0.contains(unit)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkUnit> {
        self.0.iter()
    }

    pub fn union(&self, other: &UnitSet) -> UnitSet {
        UnitSet(self.0.union(&other.0).cloned().collect())
    }

    pub fn intersection(&self, other: &UnitSet) -> UnitSet {
        UnitSet(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn difference(&self, other: &UnitSet) -> UnitSet {
        UnitSet(self.0.difference(&other.0).cloned().collect())
    }

    pub fn is_subset(&self, other: &UnitSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Fold the flat set back into the nested wire tree, ordered by name.
    pub fn to_scope(&self) -> Scope {
        let mut tree: BTreeMap<&str, BTreeMap<&str, Vec<String>>> = BTreeMap::new();
        for unit in &self.0 {
            tree.entry(&*unit.division)
                .or_default()
                .entry(&*unit.part)
                .or_default()
                .push(unit.work_type.to_string());
        }
        Scope(
            tree.into_iter()
                .map(|(division, parts)| ScopeItem {
                    division: division.to_string(),
                    parts: parts
                        .into_iter()
                        .map(|(name, work_types)| ScopePart {
                            name: name.to_string(),
                            work_types,
                        })
                        .collect(),
                })
                .collect(),
        )
    }
}

impl FromIterator<WorkUnit> for UnitSet {
    fn from_iter<T: IntoIterator<Item = WorkUnit>>(iter: T) -> Self {
        UnitSet(iter.into_iter().collect())
    }
}

impl Scope {
    pub fn is_empty(&self) -> bool {
        self.units(&mut Symbols::new()).is_empty()
    }

    pub fn units(&self, symbols: &mut Symbols) -> UnitSet {
        let mut units = UnitSet::new();
        for item in &self.0 {
            let division = symbols.intern(&item.division);
            for part in &item.parts {
                let part_name = symbols.intern(&part.name);
                for work_type in &part.work_types {
                    units.insert(WorkUnit {
                        division: Arc::clone(&division),
                        part: Arc::clone(&part_name),
                        work_type: symbols.intern(work_type),
                    });
                }
            }
        }
        units
    }

    /// Distinct (division, part) pairs named by the tree, work types ignored.
    pub fn division_parts(&self) -> BTreeSet<(&str, &str)> {
        self.0
            .iter()
            .flat_map(|item| {
                item.parts
                    .iter()
                    .map(move |part| (item.division.as_str(), part.name.as_str()))
            })
            .collect()
    }

    pub fn union(&self, other: &Scope) -> Scope {
        let mut symbols = Symbols::new();
        self.units(&mut symbols)
            .union(&other.units(&mut symbols))
            .to_scope()
    }

    pub fn intersection(&self, other: &Scope) -> Scope {
        let mut symbols = Symbols::new();
        self.units(&mut symbols)
            .intersection(&other.units(&mut symbols))
            .to_scope()
    }

    /// The three axis catalogs a project built from this scope would carry.
    pub fn catalog(&self) -> Catalog {
        let mut divisions = BTreeSet::new();
        let mut part_nos = BTreeSet::new();
        let mut work_types = BTreeSet::new();
        for item in &self.0 {
            divisions.insert(item.division.clone());
            for part in &item.parts {
                part_nos.insert(part.name.clone());
                work_types.extend(part.work_types.iter().cloned());
            }
        }
        Catalog {
            divisions: divisions.into_iter().collect(),
            part_nos: part_nos.into_iter().collect(),
            work_types: work_types.into_iter().collect(),
        }
    }

    /// Every unit of `self` must also be a unit of `parent`.
    pub fn check_within(&self, parent: &Scope) -> Result<(), ScopeError> {
        let mut symbols = Symbols::new();
        let outside = self
            .units(&mut symbols)
            .difference(&parent.units(&mut symbols));
        let result = match outside.iter().next() {
            Some(unit) => Err(ScopeError::OutsideParent(unit.to_string())),
            None => Ok(()),
        };
        result
    }
}

/// The full axis sets of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub divisions: Vec<String>,
    pub part_nos: Vec<String>,
    pub work_types: Vec<String>,
}

impl Catalog {
    pub fn cartesian_size(&self) -> usize {
        distinct(&self.divisions) * distinct(&self.part_nos) * distinct(&self.work_types)
    }

    pub fn units(&self, symbols: &mut Symbols) -> UnitSet {
        let mut units = UnitSet::new();
        for division in &self.divisions {
            let division = symbols.intern(division);
            for part in &self.part_nos {
                let part = symbols.intern(part);
                for work_type in &self.work_types {
                    units.insert(WorkUnit {
                        division: Arc::clone(&division),
                        part: Arc::clone(&part),
                        work_type: symbols.intern(work_type),
                    });
                }
            }
        }
        units
    }

    pub fn validate(&self, scope: &Scope) -> Result<(), ScopeError> {
        if scope.is_empty() {
            return Err(ScopeError::Empty);
        }
        for item in &scope.0 {
            if !self.divisions.contains(&item.division) {
                return Err(ScopeError::UnknownDivision(item.division.clone()));
            }
            for part in &item.parts {
                if !self.part_nos.contains(&part.name) {
                    return Err(ScopeError::UnknownPart(part.name.clone()));
                }
                if let Some(unknown) = part
                    .work_types
                    .iter()
                    .find(|wt| !self.work_types.contains(wt))
                {
                    return Err(ScopeError::UnknownWorkType(unknown.clone()));
                }
            }
        }
        Ok(())
    }
}

fn distinct(values: &[String]) -> usize {
    values.iter().collect::<HashSet<_>>().len()
}

/// True when any (division, part) pair of `rework` is also present in
/// `candidate`. Work types are not compared.
pub fn check_scope_overlap(candidate: &Scope, rework: &Scope) -> bool {
    let candidate_pairs = candidate.division_parts();
    rework
        .division_parts()
        .iter()
        .any(|pair| candidate_pairs.contains(pair))
}
