// This file is the module declaration file for the `builders` module.
// It declares the sub-modules that turn configuration text into filters and
// filters into a working set.

// `importer` module:
// Reads the YAML filter-definitions file named in the configuration registry.
// It defines the `FilterImporter` trait and the `YamlFilterImporter`, resolves
// relative definition paths, and hands back only the enabled filters.
pub mod importer;

// `patterns` module:
// The core filter data structures. `FilterType` is the closed set of record
// kinds, `FilterRule` is a record as written, and `Filter` is its compiled,
// evaluable form. The `FilterMatcher` trait holds the matching logic for class
// names, tags and method names.
pub mod patterns;

// `properties` module:
// Parser for the `testscope.properties` format used to bootstrap the
// configuration registry (comments, continuation lines, escapes).
pub mod properties;

// `reporter` module:
// Human-readable output for a selection run. Defines the `SelectionReporter`
// trait and the `ConsoleReporter` used by `testscope select`.
pub mod reporter;

// `selector` module:
// Applies an ordered list of filters to the discovery set and produces the
// `WorkingSet`, down to individual methods.
pub mod selector;

// `validator` module:
// Reviews filter definitions for rules that are well-formed but suspicious,
// such as duplicates or includes that can never have an effect.
pub mod validator;
