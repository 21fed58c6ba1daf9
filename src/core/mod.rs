// This file is the module declaration file for the `core` module.
// It declares the sub-modules that hold the long-lived state of a discovery
// run and exposes them to the rest of the crate.

// `classpath` module:
// Resolves the classpath listing into de-duplicated roots and scans directory
// and archive roots for classes and resources. Defines the `ClassFinder`
// capability trait, the `ClasspathScanner`, `ResourceLocator` and the
// per-root `ScanReport`.
pub mod classpath;

// `config` module:
// The process-wide, thread-safe `ConfigurationStore` registry, its bootstrap
// from `testscope.properties` (`ConfigurationLoader`, upward search, override
// variable) and the read-only `ConfigurationParameters` view.
pub mod config;

// `discovery` module:
// `DiscoveryUnit`, the candidate test class, and the `ClassInspector` seam
// that turns class entries into units.
pub mod discovery;

// `engine` module:
// `DiscoveryEngine` wires the registry, the scanner and the filters into a
// single discover-filter-select pipeline.
pub mod engine;

// `error` module:
// Typed errors for configuration, filter loading and classpath scanning.
pub mod error;

// `trace` module:
// Opt-in diagnostic output switched on by `TESTSCOPE_CONFIGURATION_TRACE`.
pub mod trace;
