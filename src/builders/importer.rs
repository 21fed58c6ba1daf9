use crate::builders::patterns::{Filter, FilterDefinition, FilterRule, FilterType};
use crate::core::config::{ConfigurationStore, keys};
use crate::core::error::{ConfigurationError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Source of filter definitions.
pub trait FilterImporter {
    /// Reads and validates every definition in the file, in declaration order.
    ///
    /// # Arguments
    /// * `path`: The definitions file to read.
    ///
    /// # Returns
    /// All definitions, enabled or not. Any invalid record fails the whole import.
    fn import_from_file(&self, path: &Path) -> Result<Vec<FilterDefinition>>;
}

/// Reads filter definitions written as a YAML sequence of records:
///
/// ```yaml
/// - type: ExcludeClass
///   enabled: true
///   classRegex: ".*"
/// - type: IncludeClass
///   enabled: true
///   classRegex: "^com\\.acme\\..*Test$"
///   methodRegex: "^test"
/// - type: ExcludeTaggedClass
///   enabled: false
///   classTagRegex: "slow"
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlFilterImporter;

impl YamlFilterImporter {
    pub fn new() -> Self {
        Self
    }
}

impl FilterImporter for YamlFilterImporter {
    fn import_from_file(&self, path: &Path) -> Result<Vec<FilterDefinition>> {
        trace!("loading filter definitions [{}]", path.display());
        let content = fs::read_to_string(path).map_err(|source| ConfigurationError::FilterRead {
            path: path.to_path_buf(),
            source,
        })?;
        parse_filter_definitions(&content, path)
    }
}

/// Loose shape of one record; [`parse_filter_definitions`] narrows it to a
/// [`FilterRule`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterRecord {
    #[serde(rename = "type")]
    kind: Option<String>,
    /// YAML 1.2 boolean: only `true` and `false`. `yes`, `on` and quoted
    /// strings are syntax errors.
    #[serde(default)]
    enabled: bool,
    class_regex: Option<String>,
    method_regex: Option<String>,
    class_tag_regex: Option<String>,
}

/// Parses YAML filter definitions. `origin` is only used in error messages.
///
/// Every record is validated, including disabled ones: an unknown `type`, a
/// missing required field or a malformed pattern fails the whole parse.
pub fn parse_filter_definitions(content: &str, origin: &Path) -> Result<Vec<FilterDefinition>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let records: Option<Vec<FilterRecord>> =
        serde_yaml::from_str(content).map_err(|source| ConfigurationError::FilterSyntax {
            path: origin.to_path_buf(),
            source,
        })?;

    let mut definitions = Vec::new();
    for (index, record) in records.unwrap_or_default().into_iter().enumerate() {
        let enabled = record.enabled;
        let rule = record_to_rule(index, record)?;
        // Compiled here only to reject malformed patterns up front.
        rule.compile()?;
        definitions.push(FilterDefinition { rule, enabled });
    }

    Ok(definitions)
}

fn record_to_rule(index: usize, record: FilterRecord) -> Result<FilterRule> {
    let kind_text = record.kind.ok_or(ConfigurationError::MissingField {
        index,
        kind: "<none>".to_string(),
        field: "type",
    })?;
    let kind: FilterType = kind_text.trim().parse()?;

    let require = |value: Option<String>, field: &'static str| {
        value.ok_or_else(|| ConfigurationError::MissingField {
            index,
            kind: kind.to_string(),
            field,
        })
    };

    Ok(match kind {
        FilterType::IncludeClass => FilterRule::IncludeClass {
            class_pattern: require(record.class_regex, "classRegex")?,
            method_pattern: record.method_regex,
        },
        FilterType::ExcludeClass => FilterRule::ExcludeClass {
            class_pattern: require(record.class_regex, "classRegex")?,
            method_pattern: record.method_regex,
        },
        FilterType::IncludeTaggedClass => FilterRule::IncludeTaggedClass {
            tag_pattern: require(record.class_tag_regex, "classTagRegex")?,
        },
        FilterType::ExcludeTaggedClass => FilterRule::ExcludeTaggedClass {
            tag_pattern: require(record.class_tag_regex, "classTagRegex")?,
        },
    })
}

/// The definitions file named in the registry, if filtering is configured.
///
/// A relative path is resolved against the directory of the properties file
/// the registry was bootstrapped from, when there is one.
pub fn resolve_definitions_path(store: &ConfigurationStore) -> Result<Option<PathBuf>> {
    let Some(value) = store.get_optional(keys::FILTER_DEFINITIONS_FILENAME)? else {
        return Ok(None);
    };
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let path = PathBuf::from(value);
    if path.is_relative()
        && let Some(properties) = store.get_optional(keys::PROPERTIES_PATH)?
        && let Some(base) = Path::new(&properties).parent()
    {
        return Ok(Some(base.join(path)));
    }
    Ok(Some(path))
}

/// Every definition from the configured file, or none when filtering is off.
pub fn load_filter_definitions(
    store: &ConfigurationStore,
    importer: &dyn FilterImporter,
) -> Result<Vec<FilterDefinition>> {
    match resolve_definitions_path(store)? {
        Some(path) => importer.import_from_file(&path),
        None => {
            trace!("no filter definitions configured");
            Ok(Vec::new())
        }
    }
}

/// The enabled filters from the configured file, in declaration order.
///
/// An empty result means filtering is disabled and the working set equals the
/// discovery set.
pub fn load_filters(store: &ConfigurationStore) -> Result<Vec<Filter>> {
    load_filter_definitions(store, &YamlFilterImporter::new())?
        .iter()
        .filter(|definition| definition.enabled)
        .map(|definition| definition.rule.compile())
        .collect()
}
