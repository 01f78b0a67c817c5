//! `billrate run` and `billrate validate`.

use std::path::{Path, PathBuf};

use billrate_io::{load_table, TableSource};
use billrate_recon::config::ReferenceTableConfig;
use billrate_recon::{PipelineConfig, PipelineInput, RunSummary, Table};
use tracing::info;

use crate::exit_codes::EXIT_ERROR;
use crate::report::{self, InputFingerprint, RunReport};
use crate::{CliError, RunArgs};

/// `<config dir>/billrate/config.toml`
fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("billrate")
        .join("config.toml")
}

fn read_config(path: &Path) -> Result<PipelineConfig, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
    let config = PipelineConfig::from_toml(&text)
        .map_err(|e| CliError::from(e).with_hint(format!("in {}", path.display())))?;
    Ok(config)
}

/// Explicit `--config`, else the per-user default if it exists, else built-in defaults.
fn resolve_config(explicit: Option<&Path>) -> Result<PipelineConfig, CliError> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    let default_path = default_config_path();
    if default_path.is_file() {
        info!(path = %default_path.display(), "using default config");
        return read_config(&default_path);
    }

    Ok(PipelineConfig::default())
}

fn apply_overrides(config: &mut PipelineConfig, args: &RunArgs) {
    if let Some(shape) = args.output_shape {
        config.output_shape = shape.into();
    }
    if let Some(policy) = args.comm_rate_policy {
        config.comm_rate_policy = policy.into();
    }
    if let Some(case) = args.racf_match {
        config.racf_match_case_sensitivity = case.into();
    }
}

fn load(path: &Path, source: TableSource) -> Result<Table, CliError> {
    let table = load_table(path, &source).map_err(CliError::io)?;
    info!(path = %path.display(), rows = table.rows.len(), columns = table.headers.len(), "loaded table");
    Ok(table)
}

fn reference_source(table: &ReferenceTableConfig) -> TableSource {
    TableSource {
        sheet: table.sheet.clone(),
        headerless: table.headerless,
    }
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let mut config = resolve_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let is_xlsx = args
        .output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if !is_xlsx {
        return Err(CliError::args(format!(
            "output must be an .xlsx file: {}",
            args.output.display()
        )));
    }

    // Everything is loaded before the engine runs; nothing is written on failure.
    let raw = load(
        &args.raw,
        TableSource {
            sheet: Some(config.raw.sheet.clone()),
            headerless: false,
        },
    )?;
    let racf_reference = args
        .racf_ref
        .as_deref()
        .map(|p| load(p, reference_source(&config.racf_reference)))
        .transpose()?;
    let comm_reference = args
        .comm_ref
        .as_deref()
        .map(|p| load(p, reference_source(&config.comm_reference)))
        .transpose()?;

    if racf_reference.is_none() {
        eprintln!("note: no RACF reference given, RACF records pass through unreconciled");
    }
    if comm_reference.is_none() {
        eprintln!("note: no COMM reference given, COMM records pass through unreconciled");
    }

    let input = PipelineInput {
        raw,
        racf_reference,
        comm_reference,
    };
    let output = billrate_recon::run(&input, &config)?;

    let export = billrate_io::xlsx::write_bundle(&output.bundle, &args.output).map_err(CliError::io)?;

    print_summary(&output.summary);
    eprintln!("wrote {} ({})", args.output.display(), export.summary());

    if args.json || args.report.is_some() {
        let mut inputs: Vec<InputFingerprint> = vec![report::fingerprint("raw", &args.raw).map_err(CliError::io)?];
        for (role, path) in [("racf_reference", &args.racf_ref), ("comm_reference", &args.comm_ref)] {
            if let Some(path) = path {
                inputs.push(report::fingerprint(role, path).map_err(CliError::io)?);
            }
        }

        let run_report = RunReport {
            meta: report::meta(&config, inputs),
            output_records: output.summary.output_records(),
            summary: output.summary,
            output: args.output.clone(),
            sheets: output.bundle.sheet_names().into_iter().map(str::to_string).collect(),
        };
        let json_str = serde_json::to_string_pretty(&run_report).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;

        if let Some(ref path) = args.report {
            std::fs::write(path, &json_str)
                .map_err(|e| CliError::io(format!("cannot write report: {e}")))?;
            eprintln!("wrote {}", path.display());
        }

        if args.json {
            println!("{json_str}");
        }
    }

    Ok(())
}

/// Human summary to stderr
fn print_summary(s: &RunSummary) {
    eprintln!(
        "RACF entries: {}, COMM entries: {}, OTHERS entries: {}",
        s.racf_entries, s.comm_entries, s.others_entries
    );
    if s.skipped_invalid_date > 0 {
        eprintln!("skipped {} rows with invalid effective date", s.skipped_invalid_date);
    }
    eprintln!(
        "RACF: {} matched, {} not found. COMM: {} matched, {} no match. OTHERS total: {}",
        s.racf_matched, s.racf_rerouted, s.comm_matched, s.comm_rerouted, s.others_total
    );
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    eprintln!(
        "config ok: output_shape={}, comm_rate_policy={}, racf_match_case_sensitivity={}, raw.sheet={}",
        config.output_shape, config.comm_rate_policy, config.racf_match_case_sensitivity, config.raw.sheet
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use billrate_recon::config::{CommRatePolicy, OutputShape};

    #[test]
    fn explicit_config_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "comm_rate_policy = \"replace\"\n").unwrap();

        let config = resolve_config(Some(&path)).unwrap();
        assert_eq!(config.comm_rate_policy, CommRatePolicy::Replace);
        assert_eq!(config.output_shape, OutputShape::MultiSheet);
    }

    #[test]
    fn missing_config_is_io_error() {
        let err = resolve_config(Some(Path::new("/no/such/pipeline.toml"))).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_IO);
    }

    #[test]
    fn bad_config_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "comm_rate_policy = \"average\"\n").unwrap();

        let err = resolve_config(Some(&path)).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_INVALID_CONFIG);
        assert!(err.hint.unwrap().contains("pipeline.toml"));
    }
}
