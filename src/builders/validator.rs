use std::collections::HashSet;

use crate::builders::patterns::{FilterDefinition, FilterRule};
use crate::core::error::Result;

/// Interface for reviewing filter definitions before they are applied.
///
/// Loading already rejects definitions that cannot be evaluated. A validator
/// looks for definitions that are well-formed but probably not what the author
/// meant.
pub trait FilterValidator {
    /// Reviews the whole ordered list and returns one message per issue.
    ///
    /// # Arguments
    /// * `definitions`: Every definition from the file, enabled or not, in order.
    fn validate_definitions(&self, definitions: &[FilterDefinition]) -> Result<Vec<String>>;

    /// Reviews a single definition in isolation.
    fn validate_definition(&self, definition: &FilterDefinition) -> Result<Vec<String>>;
}

/// Checks used by `testscope filters --validate`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardValidator;

impl StandardValidator {
    pub fn new() -> Self {
        Self
    }

    /// Includes that come before the first enabled exclude can never change
    /// the working set, since it starts out holding every discovered class.
    fn check_leading_includes(&self, definitions: &[FilterDefinition]) -> Vec<String> {
        definitions
            .iter()
            .enumerate()
            .filter(|(_, definition)| definition.enabled)
            .take_while(|(_, definition)| definition.rule.filter_type().is_include())
            .map(|(index, definition)| {
                format!(
                    "Definition #{index} ({}) has no effect: nothing has been excluded yet",
                    definition.rule
                )
            })
            .collect()
    }

    fn check_duplicates(&self, definitions: &[FilterDefinition]) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();

        for (index, definition) in definitions.iter().enumerate() {
            if definition.enabled && !seen.insert(&definition.rule) {
                warnings.push(format!("Definition #{index} duplicates an earlier rule: {}", definition.rule));
            }
        }
        warnings
    }

    /// An exclude-everything rule discards whatever the rules before it added.
    fn check_late_exclude_all(&self, definitions: &[FilterDefinition]) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut seen_enabled = false;

        for (index, definition) in definitions.iter().enumerate() {
            if !definition.enabled {
                continue;
            }
            if seen_enabled
                && let FilterRule::ExcludeClass {
                    class_pattern,
                    method_pattern: None,
                } = &definition.rule
                && matches_everything(class_pattern)
            {
                warnings.push(format!(
                    "Definition #{index} excludes every class and discards all earlier rules"
                ));
            }
            seen_enabled = true;
        }
        warnings
    }
}

fn matches_everything(pattern: &str) -> bool {
    matches!(pattern.trim(), "" | ".*" | "^.*$" | "^.*" | ".*$")
}

impl FilterValidator for StandardValidator {
    fn validate_definitions(&self, definitions: &[FilterDefinition]) -> Result<Vec<String>> {
        let mut issues = Vec::new();

        if !definitions.iter().any(|definition| definition.enabled) {
            issues.push("No enabled definitions: every discovered class will run".to_string());
        }

        for (index, definition) in definitions.iter().enumerate() {
            if !definition.enabled {
                issues.push(format!("Definition #{index} is disabled: {}", definition.rule));
            }
        }

        issues.extend(self.check_leading_includes(definitions));
        issues.extend(self.check_duplicates(definitions));
        issues.extend(self.check_late_exclude_all(definitions));

        for definition in definitions {
            issues.extend(self.validate_definition(definition)?);
        }

        Ok(issues)
    }

    fn validate_definition(&self, definition: &FilterDefinition) -> Result<Vec<String>> {
        let mut issues = Vec::new();

        if let Err(e) = definition.rule.compile() {
            issues.push(format!("Invalid definition {}: {e}", definition.rule));
        }

        if definition.rule.primary_pattern().is_empty() {
            issues.push(format!("Empty pattern in {} matches everything", definition.rule));
        }
        if definition.rule.method_pattern().is_some_and(str::is_empty) {
            issues.push(format!("Empty method pattern in {} matches every method", definition.rule));
        }

        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(rule: FilterRule, enabled: bool) -> FilterDefinition {
        FilterDefinition { rule, enabled }
    }

    fn include(pattern: &str) -> FilterRule {
        FilterRule::IncludeClass {
            class_pattern: pattern.to_string(),
            method_pattern: None,
        }
    }

    fn exclude(pattern: &str) -> FilterRule {
        FilterRule::ExcludeClass {
            class_pattern: pattern.to_string(),
            method_pattern: None,
        }
    }

    #[test]
    fn test_clean_definitions_have_no_issues() {
        let definitions = vec![definition(exclude(".*"), true), definition(include("Foo"), true)];
        let issues = StandardValidator::new().validate_definitions(&definitions).unwrap();
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn test_leading_include_is_reported() {
        let definitions = vec![
            definition(exclude("Disabled"), false),
            definition(include("Foo"), true),
            definition(exclude("Bar"), true),
            definition(include("Baz"), true),
        ];
        let issues = StandardValidator::new().validate_definitions(&definitions).unwrap();
        assert_eq!(
            issues,
            vec![
                "Definition #0 is disabled: ExcludeClass [Disabled]".to_string(),
                "Definition #1 (IncludeClass [Foo]) has no effect: nothing has been excluded yet".to_string(),
            ]
        );
    }

    #[test]
    fn test_duplicates_and_late_exclude_all() {
        let definitions = vec![
            definition(exclude("Bar"), true),
            definition(exclude("Bar"), true),
            definition(exclude(".*"), true),
        ];
        let issues = StandardValidator::new().validate_definitions(&definitions).unwrap();
        assert!(issues.iter().any(|issue| issue.contains("duplicates")));
        assert!(issues.iter().any(|issue| issue.contains("excludes every class")));
    }

    #[test]
    fn test_nothing_enabled() {
        let definitions = vec![definition(exclude(".*"), false)];
        let issues = StandardValidator::new().validate_definitions(&definitions).unwrap();
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("No enabled definitions"));
        assert!(issues[1].contains("is disabled"));
    }

    #[test]
    fn test_single_definition_checks() {
        let validator = StandardValidator::new();
        let bad = definition(include("("), true);
        assert!(validator.validate_definition(&bad).unwrap()[0].starts_with("Invalid definition"));

        let empty = definition(
            FilterRule::ExcludeTaggedClass {
                tag_pattern: String::new(),
            },
            true,
        );
        assert!(validator.validate_definition(&empty).unwrap()[0].contains("matches everything"));
    }
}
