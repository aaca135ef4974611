// Tally CLI - attribute payments to lead sources by phone number

mod exit_codes;
mod inspect;
mod recon;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};
use recon::ReconCommands;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Attribute payments to lead sources by phone number")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More logging on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Recon(ReconCommands),

    /// Show which sheet, header row and columns would be used for one file
    #[command(after_help = "\
Examples:
  tally inspect payments.xlsx
  tally inspect payments.xlsx --require phone,amount
  tally inspect leads.csv --require phone --json")]
    Inspect {
        /// Input file (csv, tsv, xlsx, xls, ods)
        file: PathBuf,

        /// Fields every candidate table must name (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "phone")]
        require: Vec<tally_recon::FieldKind>,

        /// Output JSON to stdout instead of text
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("TALLY_COMMIT"), ")",
        "\nengine:  tally-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TALLY_TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Recon(cmd) => recon::cmd_recon(cmd),
        Commands::Inspect { file, require, json } => inspect::cmd_inspect(file, require, json),
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
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    /// Engine error with its registry exit code and, where one helps, a hint.
    pub fn recon(err: tally_recon::ReconError) -> Self {
        use tally_recon::ReconError;

        let code = exit_codes::recon_exit_code(&err);
        let hint = match &err {
            ReconError::SchemaNotFound { .. } => {
                Some("name the header with [<table>.columns.<field>] headers, or set index".to_string())
            }
            ReconError::NoTableFound { .. } => {
                Some("run `tally inspect <file>` to see which header rows were considered".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    pub fn ingest(err: tally_io::IngestError) -> Self {
        let code = exit_codes::ingest_exit_code(&err);
        let hint = match &err {
            tally_io::IngestError::UnsupportedExtension(_) => {
                Some("supported: .csv .tsv .txt .xlsx .xlsm .xls .xlsb .ods".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
