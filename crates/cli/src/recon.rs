//! `tally run` / `tally validate`: config-driven reconciliation.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use tally_recon::{ReconInput, RunConfig, RunOutcome};

use crate::exit_codes::EXIT_RECON_RUNTIME;
use crate::render;
use crate::CliError;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Reconcile the target table against the source tables of a config
    #[command(after_help = "\
Paths inside the config (sources, target, [output]) are relative to the config file.

Examples:
  tally run march.tally.toml
  tally run march.tally.toml --json
  tally run march.tally.toml --output result.json
  tally run march.tally.toml -v")]
    Run {
        /// Path to the .tally.toml config file
        config: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file (in addition to [output] json)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a config without reading any input file
    #[command(after_help = "\
Examples:
  tally validate march.tally.toml")]
    Validate {
        /// Path to the .tally.toml config file
        config: PathBuf,
    },
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run { config, json, output } => cmd_run(config, json, output),
        ReconCommands::Validate { config } => cmd_validate(config),
    }
}

fn load_config(config_path: &Path) -> Result<RunConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::usage(format!("cannot read config {}: {e}", config_path.display()))
    })?;
    RunConfig::from_toml(&config_str).map_err(CliError::recon)
}

/// Directory that relative paths in the config resolve against.
fn base_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn load_input(config: &RunConfig, base: &Path) -> Result<ReconInput, CliError> {
    let mut sources = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
        sources.push(tally_io::ingest_path(&base.join(&source.file)).map_err(CliError::ingest)?);
    }
    let target = tally_io::ingest_path(&base.join(&config.target.file)).map_err(CliError::ingest)?;
    Ok(ReconInput { sources, target })
}

fn runtime_err(e: impl std::fmt::Display) -> CliError {
    CliError::new(EXIT_RECON_RUNTIME, e.to_string())
}

/// Write the `[output]` files named in the config.
fn write_outputs(config: &RunConfig, base: &Path, outcome: &RunOutcome, json: &str) -> Result<(), CliError> {
    let rows = &outcome.result.rows;
    if let Some(csv) = &config.output.csv {
        let path = base.join(csv);
        tally_io::export::write_csv(&path, rows).map_err(runtime_err)?;
        eprintln!("wrote {}", path.display());
    }
    if let Some(xls) = &config.output.xls {
        let path = base.join(xls);
        tally_io::export::write_xls(&path, &config.name, rows).map_err(runtime_err)?;
        eprintln!("wrote {}", path.display());
    }
    if let Some(json_path) = &config.output.json {
        let path = base.join(json_path);
        std::fs::write(&path, json)
            .map_err(|e| runtime_err(format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

fn cmd_run(config_path: PathBuf, json_output: bool, output_file: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let base = base_dir(&config_path);

    let input = load_input(&config, base)?;
    let outcome = tally_recon::run(&config, &input).map_err(CliError::recon)?;

    for table in &outcome.tables {
        log::info!("using {table}");
    }

    let json_str = serde_json::to_string_pretty(&outcome)
        .map_err(|e| runtime_err(format!("JSON serialization error: {e}")))?;

    write_outputs(&config, base, &outcome, &json_str)?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| runtime_err(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    // Human report to stderr
    eprint!("{}", render::report_text(&outcome.report));
    eprintln!("{}", render::summary_line(&config.name, &outcome.result));

    if !outcome.report.is_conserved() {
        return Err(runtime_err(format!(
            "channel amounts do not add up to revenue {}",
            outcome.report.total_revenue
        )));
    }

    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path).map_err(|e| {
        if e.hint.is_none() {
            e.with_hint("see `tally run --help` for the config layout")
        } else {
            e
        }
    })?;

    let batches = config.sources.iter().filter(|s| s.batch.is_some()).count();
    eprintln!(
        "valid: '{}' with {} source table(s), {} batch(es), target {}",
        config.name,
        config.sources.len(),
        batches,
        config.target.file,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_dir_of_bare_file_is_cwd() {
        assert_eq!(base_dir(Path::new("march.tally.toml")), Path::new("."));
        assert_eq!(base_dir(Path::new("cfg/march.tally.toml")), Path::new("cfg"));
    }
}
