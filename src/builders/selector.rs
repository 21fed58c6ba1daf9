use crate::builders::patterns::{Filter, FilterMatcher};
use crate::core::discovery::DiscoveryUnit;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// A unit that survived filtering, with the methods still selected on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedUnit {
    pub unit: DiscoveryUnit,
    pub methods: BTreeSet<String>,
}

/// The subset of the discovery set that will execute, keyed by class name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkingSet {
    selected: BTreeMap<String, SelectedUnit>,
}

impl WorkingSet {
    /// Every unit with all of its methods.
    pub fn full(discovery: &[DiscoveryUnit]) -> Self {
        let mut working_set = Self::default();
        for unit in discovery {
            working_set.include(unit, None);
        }
        working_set
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.selected.contains_key(class_name)
    }

    pub fn get(&self, class_name: &str) -> Option<&SelectedUnit> {
        self.selected.get(class_name)
    }

    /// Selected units in class-name order.
    pub fn units(&self) -> impl Iterator<Item = &SelectedUnit> {
        self.selected.values()
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.selected.keys().map(String::as_str).collect()
    }

    pub fn into_units(self) -> Vec<SelectedUnit> {
        self.selected.into_values().collect()
    }

    fn include(&mut self, unit: &DiscoveryUnit, methods: Option<BTreeSet<String>>) {
        match methods {
            None => {
                self.selected.insert(
                    unit.name().to_string(),
                    SelectedUnit {
                        unit: unit.clone(),
                        methods: unit.methods().clone(),
                    },
                );
            }
            // A method pattern that matched nothing leaves the working set alone.
            Some(methods) if methods.is_empty() => {}
            Some(methods) => {
                self.selected
                    .entry(unit.name().to_string())
                    .or_insert_with(|| SelectedUnit {
                        unit: unit.clone(),
                        methods: BTreeSet::new(),
                    })
                    .methods
                    .extend(methods);
            }
        }
    }

    fn exclude(&mut self, unit: &DiscoveryUnit, methods: Option<BTreeSet<String>>) {
        match methods {
            None => {
                self.selected.remove(unit.name());
            }
            Some(methods) => {
                let Some(selected) = self.selected.get_mut(unit.name()) else {
                    return;
                };
                let before = selected.methods.len();
                selected.methods.retain(|method| !methods.contains(method));
                if selected.methods.is_empty() && before > 0 {
                    self.selected.remove(unit.name());
                }
            }
        }
    }
}

/// Applies `filters` to `discovery` in order.
///
/// The working set starts as the whole discovery set. Include filters add
/// matching units back (all methods, or just the matching ones when a method
/// pattern is given); exclude filters take them out again. The result depends
/// on the order of the filters, and never contains a unit that is not in
/// `discovery`.
pub fn select(discovery: &[DiscoveryUnit], filters: &[Filter]) -> WorkingSet {
    let mut working_set = WorkingSet::full(discovery);

    for filter in filters {
        let include = filter.filter_type().is_include();
        for unit in discovery.iter().filter(|unit| filter.matches_unit(unit)) {
            let methods = filter.matching_methods(unit);
            if include {
                working_set.include(unit, methods);
            } else {
                working_set.exclude(unit, methods);
            }
        }
        trace!(
            "after {} the working set holds {} class(es)",
            filter.filter_type(),
            working_set.len()
        );
    }

    working_set
}
