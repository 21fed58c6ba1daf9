use anyhow::Result;

use crate::builders::patterns::Filter;
use crate::builders::selector::{SelectedUnit, WorkingSet};
use crate::core::error::ScanError;

/// What a selection run produced, handed from the `DiscoveryEngine` to a
/// `SelectionReporter`.
#[derive(Debug)]
pub struct SelectionSummary<'a> {
    /// Number of classes found on the classpath.
    pub discovered: usize,
    /// The filters that were applied, in order.
    pub filters: &'a [Filter],
    pub working_set: &'a WorkingSet,
    /// Roots that could not be scanned.
    pub failures: &'a [ScanError],
}

pub trait SelectionReporter {
    fn report_selection(&self, summary: &SelectionSummary<'_>) -> Result<()>;
}

/// Prints the selection report to the console. Used by `testscope select`.
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// One line per selected class.
    ///
    /// # Arguments
    /// * `selected`: The class and the methods still selected on it.
    ///
    /// # Returns
    /// The class name prefixed with an icon: 🟢 when every discovered method
    /// is selected, 🟡 when only some are.
    fn format_unit(&self, selected: &SelectedUnit) -> String {
        let total = selected.unit.methods().len();
        let chosen = selected.methods.len();
        let status_icon = if chosen < total { "🟡" } else { "🟢" };

        if total == 0 {
            format!("{} {}", status_icon, selected.unit.name())
        } else {
            format!(
                "{} {} ({}/{} methods)",
                status_icon,
                selected.unit.name(),
                chosen,
                total
            )
        }
    }
}

impl SelectionReporter for ConsoleReporter {
    fn report_selection(&self, summary: &SelectionSummary<'_>) -> Result<()> {
        println!("📊 Test Selection Report");
        println!("========================");

        if summary.filters.is_empty() {
            println!("No filters configured, every discovered class is selected.");
        } else if self.verbose {
            for (index, filter) in summary.filters.iter().enumerate() {
                println!("  #{index} {}", filter.filter_type());
            }
        }

        if summary.working_set.is_empty() {
            println!("No classes selected.");
        }

        for selected in summary.working_set.units() {
            println!("{}", self.format_unit(selected));
            if self.verbose {
                for method in &selected.methods {
                    println!("  └─ {method}");
                }
            }
        }

        for failure in summary.failures {
            println!("⚠️  {failure}");
        }

        println!("\n📈 Summary:");
        println!("  Discovered classes: {}", summary.discovered);
        println!("  Filters applied: {}", summary.filters.len());
        println!("  Selected classes: {}", summary.working_set.len());
        println!("  Unreadable roots: {}", summary.failures.len());

        if !self.verbose && summary.working_set.units().any(|s| s.methods.len() < s.unit.methods().len()) {
            println!("\n⚠️  Run with --verbose to see which methods are selected");
        }

        Ok(())
    }
}
