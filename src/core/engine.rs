use crate::builders::importer;
use crate::builders::patterns::Filter;
use crate::builders::reporter::SelectionSummary;
use crate::builders::selector::{self, WorkingSet};
use crate::core::classpath::{ClassFinder, ClasspathScanner, ScanReport};
use crate::core::config::{ConfigurationStore, keys};
use crate::core::discovery::{ClassInspector, DiscoveryUnit};
use crate::core::error::{Result, ScanError};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a selection run produced.
#[derive(Debug)]
pub struct Selection {
    /// Every class found on the classpath that passed the discovery predicate.
    pub discovery: Vec<DiscoveryUnit>,
    /// The enabled filters, in the order they were applied.
    pub filters: Vec<Filter>,
    pub working_set: WorkingSet,
    /// Roots that could not be scanned; the selection covers the others.
    pub failures: Vec<ScanError>,
}

impl Selection {
    pub fn summary(&self) -> SelectionSummary<'_> {
        SelectionSummary {
            discovered: self.discovery.len(),
            filters: &self.filters,
            working_set: &self.working_set,
            failures: &self.failures,
        }
    }
}

/// Ties the registry, the classpath scanner and the filter engine together.
pub struct DiscoveryEngine {
    store: Arc<ConfigurationStore>,
    scanner: Box<dyn ClassFinder>,
}

impl DiscoveryEngine {
    pub fn new(store: Arc<ConfigurationStore>, scanner: Box<dyn ClassFinder>) -> Self {
        Self { store, scanner }
    }

    /// An engine whose classpath comes from the registry, falling back to the
    /// process-wide `CLASSPATH` scanner when the registry names none.
    pub fn from_store(store: Arc<ConfigurationStore>) -> Result<Self> {
        let scanner: Box<dyn ClassFinder> = match Self::configured_listing(&store)? {
            Some(listing) => Box::new(ClasspathScanner::new(listing)),
            None => Box::new(ClasspathScanner::global()),
        };
        Ok(Self::new(store, scanner))
    }

    /// Like [`from_store`](Self::from_store), with a custom class inspector.
    ///
    /// The inspector needs a scanner of its own, so the `CLASSPATH` fallback
    /// parses its roots separately from the process-wide scanner.
    pub fn from_store_with_inspector(
        store: Arc<ConfigurationStore>,
        inspector: impl ClassInspector + 'static,
    ) -> Result<Self> {
        let scanner = match Self::configured_listing(&store)? {
            Some(listing) => ClasspathScanner::new(listing),
            None => ClasspathScanner::from_env(),
        };
        Ok(Self::new(store, Box::new(scanner.with_inspector(inspector))))
    }

    /// An engine over the process-wide registry.
    pub fn from_global() -> Result<Self> {
        Self::from_store(ConfigurationStore::global()?)
    }

    fn configured_listing(store: &ConfigurationStore) -> Result<Option<String>> {
        match store.get_optional(keys::CLASSPATH)? {
            Some(listing) if !listing.trim().is_empty() => {
                debug!("using classpath from [{}]", keys::CLASSPATH);
                Ok(Some(listing.trim().to_string()))
            }
            _ => Ok(None),
        }
    }

    pub fn store(&self) -> &ConfigurationStore {
        &self.store
    }

    pub fn scanner(&self) -> &dyn ClassFinder {
        self.scanner.as_ref()
    }

    /// The discovery set: every class on the classpath accepted by `predicate`.
    pub fn discover<P>(&self, predicate: P) -> ScanReport<DiscoveryUnit>
    where
        P: Fn(&DiscoveryUnit) -> bool,
    {
        self.scanner.find_classes(&predicate)
    }

    /// The enabled filters from the definitions file named in the registry.
    pub fn load_filters(&self) -> Result<Vec<Filter>> {
        importer::load_filters(&self.store)
    }

    /// Discovers, loads the filters and applies them.
    ///
    /// Filters are loaded before the classpath is scanned, so a bad
    /// definitions file fails fast.
    pub fn resolve_working_set<P>(&self, predicate: P) -> Result<Selection>
    where
        P: Fn(&DiscoveryUnit) -> bool,
    {
        let filters = self.load_filters()?;
        let report = self.discover(predicate);
        let working_set = selector::select(&report.items, &filters);

        info!(
            "selected {} of {} discovered class(es) with {} filter(s)",
            working_set.len(),
            report.items.len(),
            filters.len()
        );

        Ok(Selection {
            discovery: report.items,
            filters,
            working_set,
            failures: report.failures,
        })
    }
}
