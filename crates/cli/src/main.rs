// billrate CLI - bill code rate processing from the command line

mod exit_codes;
mod report;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use billrate_recon::config::{CaseSensitivity, CommRatePolicy, OutputShape};
use exit_codes::{EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "billrate")]
#[command(about = "Classify, deduplicate and reconcile bill code rates")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). RUST_LOG wins when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a raw rate export into the categorized workbook
    #[command(after_help = "\
Examples:
  billrate run --raw BillCodeRates.xlsx --racf-ref racf.xlsx --comm-ref comm.xlsx
  billrate run --raw rates.csv --comm-ref comm.csv --comm-rate-policy multiply -o out.xlsx
  billrate run --raw rates.xlsx --output-shape combined --json
  billrate run --raw rates.xlsx --config pipeline.toml --report run.json")]
    Run(RunArgs),

    /// Validate a pipeline config without running
    #[command(after_help = "\
Examples:
  billrate validate pipeline.toml")]
    Validate {
        /// Path to the pipeline TOML config
        config: PathBuf,
    },
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Raw rate table (xlsx, xls, ods, csv)
    #[arg(long)]
    pub raw: PathBuf,

    /// RACF reference table (Salesforce code, funder code, optional CPI multiplier)
    #[arg(long)]
    pub racf_ref: Option<PathBuf>,

    /// COMM reference table (bill code, rate)
    #[arg(long)]
    pub comm_ref: Option<PathBuf>,

    /// Output workbook
    #[arg(long, short = 'o', default_value = "Processed_Billcodes.xlsx")]
    pub output: PathBuf,

    /// Pipeline config (TOML). Defaults to <config dir>/billrate/config.toml when present
    #[arg(long, env = "BILLRATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override output_shape from the config
    #[arg(long)]
    pub output_shape: Option<ShapeArg>,

    /// Override comm_rate_policy from the config
    #[arg(long)]
    pub comm_rate_policy: Option<PolicyArg>,

    /// Override racf_match_case_sensitivity from the config
    #[arg(long)]
    pub racf_match: Option<MatchArg>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Write the run report as JSON to a file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ShapeArg {
    MultiSheet,
    Combined,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    Annotate,
    Replace,
    Multiply,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum MatchArg {
    Sensitive,
    Insensitive,
}

impl From<ShapeArg> for OutputShape {
    fn from(arg: ShapeArg) -> Self {
        match arg {
            ShapeArg::MultiSheet => OutputShape::MultiSheet,
            ShapeArg::Combined => OutputShape::Combined,
        }
    }
}

impl From<PolicyArg> for CommRatePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Annotate => CommRatePolicy::Annotate,
            PolicyArg::Replace => CommRatePolicy::Replace,
            PolicyArg::Multiply => CommRatePolicy::Multiply,
        }
    }
}

impl From<MatchArg> for CaseSensitivity {
    fn from(arg: MatchArg) -> Self {
        match arg {
            MatchArg::Sensitive => CaseSensitivity::Sensitive,
            MatchArg::Insensitive => CaseSensitivity::Insensitive,
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  billrate-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

/// Logs go to stderr so `--json` stdout stays a single JSON value.
fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => run::cmd_run(args),
        Commands::Validate { config } => run::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<billrate_recon::ReconError> for CliError {
    fn from(err: billrate_recon::ReconError) -> Self {
        let code = exit_codes::recon_exit_code(&err);
        let hint = match &err {
            billrate_recon::ReconError::MissingRequiredField { .. } => {
                Some("raw table needs BillCode, FunderCode and EffectiveDate columns".to_string())
            }
            billrate_recon::ReconError::ReferenceTableMalformed { .. } => {
                Some("set headerless = true in the config if the reference has no header row".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}
