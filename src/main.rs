//! testscope: find the test classes on a classpath and decide which of them
//! run. Configuration comes from `testscope.properties`, found by walking up
//! from the current directory or named by `TESTSCOPE_PROPERTIES`. The filter
//! definitions file it names holds ordered include/exclude rules.
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use testscope::core::trace;
use testscope::utils::{self, ExportFormat};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "testscope")]
#[command(about = "Discover test classes on a classpath and select the ones to run")]
struct Cli {
    /// Print debug diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the loaded configuration properties
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List the classpath roots in search order
    Roots,
    /// Find resources whose name fully matches a regex
    Resources {
        /// Matched against file names in directories, entry names in archives
        regex: String,
    },
    /// Show the configured filter definitions
    Filters {
        /// Report definitions that are valid but suspicious
        #[arg(long)]
        validate: bool,
    },
    /// Discover classes and apply the filters
    Select {
        /// Only consider classes whose name matches this regex
        #[arg(long)]
        class_regex: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print every property, sorted by key
    Show,
    /// Write the properties in another format
    Export {
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// Defaults to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    if verbose {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        trace::init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => utils::show_config(),
            ConfigAction::Export { format, output } => utils::export_config(format, output.as_deref()),
        },
        Commands::Roots => utils::list_roots(),
        Commands::Resources { regex } => utils::find_resources(&regex),
        Commands::Filters { validate } => utils::list_filters(validate),
        Commands::Select { class_regex } => utils::select_classes(class_regex.as_deref(), cli.verbose),
    }
}
