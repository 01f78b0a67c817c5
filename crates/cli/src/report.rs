//! JSON run report: what ran, on which inputs, with what outcome.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use billrate_recon::{PipelineConfig, RunSummary};

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub meta: ReportMeta,
    pub summary: RunSummary,
    /// Rows in the final output, reference sheets excluded.
    pub output_records: usize,
    pub output: PathBuf,
    pub sheets: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportMeta {
    pub engine_version: String,
    /// RFC 3339
    pub run_at: String,
    pub config: PipelineConfig,
    pub inputs: Vec<InputFingerprint>,
}

#[derive(Debug, Serialize)]
pub struct InputFingerprint {
    pub role: String,
    pub path: PathBuf,
    pub sha256: String,
}

/// SHA-256 of a file's bytes, lowercase hex.
pub fn fingerprint(role: &str, path: &Path) -> Result<InputFingerprint, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    Ok(InputFingerprint {
        role: role.to_string(),
        path: path.to_path_buf(),
        sha256: format!("{:x}", Sha256::digest(&bytes)),
    })
}

pub fn meta(config: &PipelineConfig, inputs: Vec<InputFingerprint>) -> ReportMeta {
    ReportMeta {
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        run_at: chrono::Utc::now().to_rfc3339(),
        config: config.clone(),
        inputs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_sha256_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();

        let fp = fingerprint("raw", &path).unwrap();
        assert_eq!(fp.role, "raw");
        assert_eq!(
            fp.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn meta_serializes_config_in_toml_spelling() {
        let m = meta(&PipelineConfig::default(), Vec::new());
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["config"]["output_shape"], "multi-sheet");
        assert_eq!(v["config"]["comm_rate_policy"], "annotate");
        assert_eq!(v["config"]["raw"]["sheet"], "BillCodeRates");
        assert!(chrono::DateTime::parse_from_rfc3339(v["run_at"].as_str().unwrap()).is_ok());
    }
}
