use anyhow::Result;
use clap::{Parser, Subcommand};
use repo_gauge::commands::*;
use repo_gauge::init_tracing;

/// Heuristic repository quality analyzer.
///
/// This CLI is a thin wrapper around `gauge-core` (exposed in code as `gauge_core`).
/// Scheduling, rule evaluation, and storage all live in the library.
#[derive(Parser, Debug)]
#[command(
    name = "repo-gauge",
    version,
    about = "Heuristic repository quality analyzer",
    long_about = None
)]
struct Cli {
    /// Log debug output to stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a workspace at the given root.
    ///
    /// This creates `.gauge/config.json` and the report database.
    Init {
        /// Workspace root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Optional workspace name. If omitted, the name is derived from the root directory.
        #[arg(long)]
        name: Option<String>,
    },

    /// Show configuration and storage details of a workspace.
    Info {
        #[arg(long, default_value = ".")]
        root: String,

        #[arg(long)]
        json: bool,
    },

    /// Queue a repository for analysis and wait for its report.
    ///
    /// A repeat request for the same repository and user within the dedup
    /// window returns the existing report instead of running again.
    Analyze {
        #[arg(long, default_value = ".")]
        root: String,

        /// Git URL or local directory.
        #[arg(long)]
        repo: String,

        /// Requester identity used for deduplication.
        #[arg(long)]
        user: String,

        /// Give up waiting after this many seconds.
        #[arg(long, default_value_t = 600)]
        timeout_secs: u64,

        #[arg(long)]
        json: bool,
    },

    /// Analyze a local directory directly, without a workspace.
    Scan {
        /// Directory to analyze.
        path: String,

        /// Force a variant instead of detecting one.
        #[arg(long)]
        variant: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show a persisted job.
    Status {
        job_id: String,

        #[arg(long, default_value = ".")]
        root: String,

        #[arg(long)]
        json: bool,
    },

    /// Inspect stored reports.
    Reports {
        #[command(subcommand)]
        command: ReportsCommand,
    },

    /// List rule tables, or the rules for one variant.
    #[command(alias = "variants")]
    Rules {
        #[arg(long)]
        variant: Option<String>,

        #[arg(long, default_value = ".")]
        root: String,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ReportsCommand {
    /// List reports, newest first.
    List {
        #[arg(long, default_value = ".")]
        root: String,

        /// Only reports requested by this user.
        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Print one report.
    Show {
        result_ref: String,

        #[arg(long, default_value = ".")]
        root: String,

        #[arg(long)]
        json: bool,
    },

    /// Delete a report.
    Delete {
        result_ref: String,

        #[arg(long, default_value = ".")]
        root: String,

        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Init { root, name } => init_workspace_command(&root, name)?,
        Command::Info { root, json } => workspace_info_command(&root, json)?,
        Command::Analyze { root, repo, user, timeout_secs, json } => {
            analyze_command(&root, &repo, &user, timeout_secs, json).await?
        }
        Command::Scan { path, variant, json } => scan_command(&path, variant.as_deref(), json)?,
        Command::Status { job_id, root, json } => job_status_command(&root, &job_id, json)?,
        Command::Reports { command } => match command {
            ReportsCommand::List { root, user, json } => {
                list_reports_command(&root, user.as_deref(), json)?
            }
            ReportsCommand::Show { result_ref, root, json } => {
                show_report_command(&root, &result_ref, json)?
            }
            ReportsCommand::Delete { result_ref, root, json } => {
                delete_report_command(&root, &result_ref, json)?
            }
        },
        Command::Rules { variant, root, json } => rules_command(&root, variant.as_deref(), json)?,
    }

    Ok(())
}
