//! Configuration, classpath scanning and test selection for a test-discovery
//! pipeline.
//!
//! A run bootstraps the [`ConfigurationStore`] from `testscope.properties`,
//! scans the classpath for candidate classes with the [`ClasspathScanner`],
//! and narrows that discovery set to a [`WorkingSet`] with the ordered
//! include/exclude filters named in the registry.

pub mod builders;
pub mod core;
pub mod utils;


pub use crate::builders::importer::{YamlFilterImporter, load_filters};
pub use crate::builders::patterns::{Filter, FilterDefinition, FilterRule, FilterType};
pub use crate::builders::selector::{WorkingSet, select};
pub use crate::core::classpath::{ClassFinder, ClasspathRoot, ClasspathScanner, ResourceLocator, ScanReport};
pub use crate::core::config::{ConfigurationLoader, ConfigurationParameters, ConfigurationStore};
pub use crate::core::discovery::{ClassInspector, DiscoveryUnit};
pub use crate::core::engine::{DiscoveryEngine, Selection};
pub use crate::core::error::{ConfigurationError, ScanError};
