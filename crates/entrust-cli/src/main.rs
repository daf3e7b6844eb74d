//! entrust CLI: inspect evaluation datasets and competency progress.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "entrust", version, about = "EPA entrustment evaluation toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a resident's competency profile
    Summary {
        /// Dataset JSON file
        #[arg(long)]
        dataset: PathBuf,

        /// Resident id or name
        #[arg(long)]
        resident: String,

        /// Time range: 1m, 3m, 6m, 1y, all (config default when omitted)
        #[arg(long)]
        range: Option<String>,

        /// Save the profile as a JSON report
        #[arg(long)]
        save: Option<PathBuf>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show a viewer's feed, inbox and pending lists
    Buckets {
        /// Dataset JSON file
        #[arg(long)]
        dataset: PathBuf,

        /// Viewer id or name
        #[arg(long)]
        viewer: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show institution-wide analytics
    Overview {
        /// Dataset JSON file
        #[arg(long)]
        dataset: PathBuf,

        /// Institution id (required when the dataset spans several)
        #[arg(long)]
        institution: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show one faculty member's supervision analytics
    Faculty {
        /// Dataset JSON file
        #[arg(long)]
        dataset: PathBuf,

        /// Faculty id or name
        #[arg(long)]
        faculty: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two saved competency reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Minimum change in scale points to report
        #[arg(long, default_value = "0.25")]
        threshold: f64,

        /// Exit code 1 if any EPA regressed
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate a dataset and the EPA catalogue
    Validate {
        /// Dataset JSON file
        #[arg(long)]
        dataset: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Map a free-text case description to an EPA
    ClassifyCase {
        /// Case description
        text: String,

        /// Use the offline keyword classifier regardless of config
        #[arg(long)]
        offline: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example dataset
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("entrust=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Summary {
            dataset,
            resident,
            range,
            save,
            format,
            config,
        } => commands::summary::execute(dataset, resident, range, save, format, config).await,
        Commands::Buckets {
            dataset,
            viewer,
            config,
        } => commands::buckets::execute(dataset, viewer, config).await,
        Commands::Overview {
            dataset,
            institution,
            format,
            config,
        } => commands::overview::execute(dataset, institution, format, config),
        Commands::Faculty {
            dataset,
            faculty,
            format,
            config,
        } => commands::faculty::execute(dataset, faculty, format, config),
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_regression, format),
        Commands::Validate { dataset, config } => commands::validate::execute(dataset, config),
        Commands::ClassifyCase {
            text,
            offline,
            config,
        } => commands::classify::execute(text, offline, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
