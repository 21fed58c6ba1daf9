use crate::builders::importer::{self, YamlFilterImporter};
use crate::builders::reporter::{ConsoleReporter, SelectionReporter};
use crate::builders::validator::{FilterValidator, StandardValidator};
use crate::core::classpath::RootKind;
use crate::core::config::ConfigurationStore;
use crate::core::engine::DiscoveryEngine;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;

/// Output formats for `testscope config export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Json,
    Yaml,
    Toml,
}

pub fn show_config() -> Result<()> {
    let store = ConfigurationStore::global()?;

    if store.is_empty() {
        println!("No configuration properties loaded.");
        return Ok(());
    }

    println!("⚙️  Configuration ({} properties)", store.size());
    print!("{store}");
    Ok(())
}

/// Serializes the registry contents, sorted by key.
pub fn render_config(store: &ConfigurationStore, format: ExportFormat) -> Result<String> {
    let snapshot = store.snapshot();
    let content = match format {
        ExportFormat::Json => {
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize to JSON")?
        }
        ExportFormat::Yaml => serde_yaml::to_string(&snapshot).context("Failed to serialize to YAML")?,
        ExportFormat::Toml => toml::to_string_pretty(&snapshot).context("Failed to serialize to TOML")?,
    };
    Ok(content)
}

pub fn export_config(format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let store = ConfigurationStore::global()?;
    let content = render_config(&store, format)?;

    match output {
        Some(path) => {
            std::fs::write(path, content).context("Failed to write export file")?;
            println!("✓ Exported {} properties to {}", store.size(), path.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}

pub fn list_roots() -> Result<()> {
    let engine = DiscoveryEngine::from_global()?;
    let roots = engine.scanner().classpath_roots();

    if roots.is_empty() {
        println!("No classpath roots configured.");
        return Ok(());
    }

    for root in roots {
        let icon = match root.kind() {
            RootKind::Directory => "📁",
            RootKind::Archive => "📦",
            RootKind::Other => "❔",
        };
        println!("{icon} {root}");
    }
    Ok(())
}

pub fn find_resources(pattern: &str) -> Result<()> {
    let engine = DiscoveryEngine::from_global()?;
    let report = engine.scanner().find_resources(pattern)?;

    for locator in &report.items {
        println!("🔍 {locator}");
    }
    for failure in &report.failures {
        println!("⚠️  {failure}");
    }
    println!("\n{} resource(s) found", report.items.len());
    Ok(())
}

pub fn list_filters(validate: bool) -> Result<()> {
    let store = ConfigurationStore::global()?;
    let Some(path) = importer::resolve_definitions_path(&store)? else {
        println!("No filter definitions configured, every discovered class is selected.");
        return Ok(());
    };

    let definitions = importer::load_filter_definitions(&store, &YamlFilterImporter::new())?;
    println!("\n📄 Filters: {}", path.display());
    for (index, definition) in definitions.iter().enumerate() {
        let state = if definition.enabled { "✓" } else { "✗" };
        println!("  {state} #{index} {}", definition.rule);
    }

    if !validate {
        return Ok(());
    }

    let issues = StandardValidator::new().validate_definitions(&definitions)?;
    if issues.is_empty() {
        println!("✓ Filter definitions are valid.");
        Ok(())
    } else {
        println!("⚠️  Found issues in filter definitions:");
        for issue in issues {
            println!("  - {issue}");
        }
        anyhow::bail!("Filter validation failed.");
    }
}

pub fn select_classes(class_regex: Option<&str>, verbose: bool) -> Result<()> {
    let predicate = class_regex
        .map(Regex::new)
        .transpose()
        .context("Invalid --class-regex")?;

    let engine = DiscoveryEngine::from_global()?;
    let selection = engine.resolve_working_set(|unit| {
        predicate
            .as_ref()
            .is_none_or(|regex| regex.is_match(unit.name()))
    })?;

    ConsoleReporter::new(verbose).report_selection(&selection.summary())
}
