use crate::core::discovery::DiscoveryUnit;
use crate::core::error::{ConfigurationError, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The closed set of filter kinds a definitions file may name.
///
/// The textual form (`IncludeClass`, ...) is what appears in the `type` field of
/// a definition record. Anything else fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FilterType {
    /// Adds classes whose name matches, optionally narrowed to matching methods.
    IncludeClass,
    /// Removes classes whose name matches, or only their matching methods.
    ExcludeClass,
    /// Adds classes carrying a matching tag.
    IncludeTaggedClass,
    /// Removes classes carrying a matching tag.
    ExcludeTaggedClass,
}

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterType::IncludeClass => "IncludeClass",
            FilterType::ExcludeClass => "ExcludeClass",
            FilterType::IncludeTaggedClass => "IncludeTaggedClass",
            FilterType::ExcludeTaggedClass => "ExcludeTaggedClass",
        }
    }

    pub fn is_include(&self) -> bool {
        matches!(self, FilterType::IncludeClass | FilterType::IncludeTaggedClass)
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterType {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "IncludeClass" => Ok(FilterType::IncludeClass),
            "ExcludeClass" => Ok(FilterType::ExcludeClass),
            "IncludeTaggedClass" => Ok(FilterType::IncludeTaggedClass),
            "ExcludeTaggedClass" => Ok(FilterType::ExcludeTaggedClass),
            other => Err(ConfigurationError::UnknownFilterType(other.to_string())),
        }
    }
}

/// One include/exclude directive as written in the definitions file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum FilterRule {
    IncludeClass {
        class_pattern: String,
        method_pattern: Option<String>,
    },
    ExcludeClass {
        class_pattern: String,
        method_pattern: Option<String>,
    },
    IncludeTaggedClass {
        tag_pattern: String,
    },
    ExcludeTaggedClass {
        tag_pattern: String,
    },
}

impl FilterRule {
    pub fn filter_type(&self) -> FilterType {
        match self {
            FilterRule::IncludeClass { .. } => FilterType::IncludeClass,
            FilterRule::ExcludeClass { .. } => FilterType::ExcludeClass,
            FilterRule::IncludeTaggedClass { .. } => FilterType::IncludeTaggedClass,
            FilterRule::ExcludeTaggedClass { .. } => FilterType::ExcludeTaggedClass,
        }
    }

    /// The class or tag pattern, whichever the rule matches on.
    pub fn primary_pattern(&self) -> &str {
        match self {
            FilterRule::IncludeClass { class_pattern, .. }
            | FilterRule::ExcludeClass { class_pattern, .. } => class_pattern,
            FilterRule::IncludeTaggedClass { tag_pattern }
            | FilterRule::ExcludeTaggedClass { tag_pattern } => tag_pattern,
        }
    }

    pub fn method_pattern(&self) -> Option<&str> {
        match self {
            FilterRule::IncludeClass { method_pattern, .. }
            | FilterRule::ExcludeClass { method_pattern, .. } => method_pattern.as_deref(),
            _ => None,
        }
    }

    /// Compiles the rule's patterns into an evaluable [`Filter`].
    pub fn compile(&self) -> Result<Filter> {
        Ok(match self {
            FilterRule::IncludeClass {
                class_pattern,
                method_pattern,
            } => Filter::IncludeClass(ClassFilter::new(class_pattern, method_pattern.as_deref())?),
            FilterRule::ExcludeClass {
                class_pattern,
                method_pattern,
            } => Filter::ExcludeClass(ClassFilter::new(class_pattern, method_pattern.as_deref())?),
            FilterRule::IncludeTaggedClass { tag_pattern } => {
                Filter::IncludeTaggedClass(TagFilter::new(tag_pattern)?)
            }
            FilterRule::ExcludeTaggedClass { tag_pattern } => {
                Filter::ExcludeTaggedClass(TagFilter::new(tag_pattern)?)
            }
        })
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.method_pattern() {
            Some(method) => write!(
                f,
                "{} [{}] methods [{}]",
                self.filter_type(),
                self.primary_pattern(),
                method
            ),
            None => write!(f, "{} [{}]", self.filter_type(), self.primary_pattern()),
        }
    }
}

/// A rule together with the `enabled` flag from its source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterDefinition {
    pub rule: FilterRule,
    pub enabled: bool,
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| ConfigurationError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Compiled class-name pattern with an optional method-name pattern.
#[derive(Debug, Clone)]
pub struct ClassFilter {
    class_regex: Regex,
    method_regex: Option<Regex>,
}

impl ClassFilter {
    pub fn new(class_pattern: &str, method_pattern: Option<&str>) -> Result<Self> {
        Ok(Self {
            class_regex: compile_pattern(class_pattern)?,
            method_regex: method_pattern.map(compile_pattern).transpose()?,
        })
    }

    pub fn has_method_pattern(&self) -> bool {
        self.method_regex.is_some()
    }
}

/// Compiled tag pattern.
#[derive(Debug, Clone)]
pub struct TagFilter {
    tag_regex: Regex,
}

impl TagFilter {
    pub fn new(tag_pattern: &str) -> Result<Self> {
        Ok(Self {
            tag_regex: compile_pattern(tag_pattern)?,
        })
    }
}

/// An evaluable filter. The variant decides whether matches are added to or
/// removed from the working set.
#[derive(Debug, Clone)]
pub enum Filter {
    IncludeClass(ClassFilter),
    ExcludeClass(ClassFilter),
    IncludeTaggedClass(TagFilter),
    ExcludeTaggedClass(TagFilter),
}

impl Filter {
    pub fn filter_type(&self) -> FilterType {
        match self {
            Filter::IncludeClass(_) => FilterType::IncludeClass,
            Filter::ExcludeClass(_) => FilterType::ExcludeClass,
            Filter::IncludeTaggedClass(_) => FilterType::IncludeTaggedClass,
            Filter::ExcludeTaggedClass(_) => FilterType::ExcludeTaggedClass,
        }
    }

    /// Shorthand for an `IncludeClass` filter.
    pub fn include_class(class_pattern: &str, method_pattern: Option<&str>) -> Result<Self> {
        Ok(Filter::IncludeClass(ClassFilter::new(class_pattern, method_pattern)?))
    }

    /// Shorthand for an `ExcludeClass` filter.
    pub fn exclude_class(class_pattern: &str, method_pattern: Option<&str>) -> Result<Self> {
        Ok(Filter::ExcludeClass(ClassFilter::new(class_pattern, method_pattern)?))
    }

    pub fn include_tagged_class(tag_pattern: &str) -> Result<Self> {
        Ok(Filter::IncludeTaggedClass(TagFilter::new(tag_pattern)?))
    }

    pub fn exclude_tagged_class(tag_pattern: &str) -> Result<Self> {
        Ok(Filter::ExcludeTaggedClass(TagFilter::new(tag_pattern)?))
    }
}

/// Matching behaviour shared by every filter variant.
///
/// Patterns are searched for anywhere in the candidate string; anchor them with
/// `^`/`$` to require a whole-string match.
pub trait FilterMatcher {
    /// Whether the unit is addressed by this filter at all.
    fn matches_unit(&self, unit: &DiscoveryUnit) -> bool;

    /// The unit's methods addressed by this filter, or `None` when the filter
    /// applies to the class as a whole.
    fn matching_methods(&self, unit: &DiscoveryUnit) -> Option<BTreeSet<String>>;
}

impl FilterMatcher for ClassFilter {
    fn matches_unit(&self, unit: &DiscoveryUnit) -> bool {
        self.class_regex.is_match(unit.name())
    }

    fn matching_methods(&self, unit: &DiscoveryUnit) -> Option<BTreeSet<String>> {
        let method_regex = self.method_regex.as_ref()?;
        Some(
            unit.methods()
                .iter()
                .filter(|method| method_regex.is_match(method))
                .cloned()
                .collect(),
        )
    }
}

impl FilterMatcher for TagFilter {
    fn matches_unit(&self, unit: &DiscoveryUnit) -> bool {
        unit.tags().iter().any(|tag| self.tag_regex.is_match(tag))
    }

    fn matching_methods(&self, _unit: &DiscoveryUnit) -> Option<BTreeSet<String>> {
        None
    }
}

impl FilterMatcher for Filter {
    fn matches_unit(&self, unit: &DiscoveryUnit) -> bool {
        match self {
            Filter::IncludeClass(filter) | Filter::ExcludeClass(filter) => filter.matches_unit(unit),
            Filter::IncludeTaggedClass(filter) | Filter::ExcludeTaggedClass(filter) => {
                filter.matches_unit(unit)
            }
        }
    }

    fn matching_methods(&self, unit: &DiscoveryUnit) -> Option<BTreeSet<String>> {
        match self {
            Filter::IncludeClass(filter) | Filter::ExcludeClass(filter) => {
                filter.matching_methods(unit)
            }
            Filter::IncludeTaggedClass(filter) | Filter::ExcludeTaggedClass(filter) => {
                filter.matching_methods(unit)
            }
        }
    }
}
