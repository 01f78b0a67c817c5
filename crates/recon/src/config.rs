use serde::{Deserialize, Serialize};

use crate::error::ReconError;

/// Default sheet holding the raw bill code export.
pub const DEFAULT_RAW_SHEET: &str = "BillCodeRates";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub output_shape: OutputShape,
    #[serde(default)]
    pub comm_rate_policy: CommRatePolicy,
    #[serde(default)]
    pub racf_match_case_sensitivity: CaseSensitivity,
    #[serde(default)]
    pub raw: RawTableConfig,
    #[serde(default)]
    pub racf_reference: ReferenceTableConfig,
    #[serde(default)]
    pub comm_reference: ReferenceTableConfig,
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Shape of the output workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputShape {
    /// One sheet per category plus reference pass-throughs.
    #[default]
    MultiSheet,
    /// All categories concatenated into a single sheet with a Category column.
    Combined,
}

/// What a matched COMM record does with the reference rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommRatePolicy {
    /// Add a `Matched Rate` column, leave `Rate` alone.
    #[default]
    Annotate,
    /// Overwrite `Rate` with the reference value.
    Replace,
    /// Multiply `Rate` by the reference value, rounded to cents.
    Multiply,
}

/// How RACF funder codes are compared against the reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseSensitivity {
    #[default]
    Sensitive,
    Insensitive,
}

impl std::fmt::Display for OutputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MultiSheet => write!(f, "multi-sheet"),
            Self::Combined => write!(f, "combined"),
        }
    }
}

impl std::fmt::Display for CommRatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Annotate => write!(f, "annotate"),
            Self::Replace => write!(f, "replace"),
            Self::Multiply => write!(f, "multiply"),
        }
    }
}

impl std::fmt::Display for CaseSensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sensitive => write!(f, "sensitive"),
            Self::Insensitive => write!(f, "insensitive"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawTableConfig {
    #[serde(default = "default_raw_sheet")]
    pub sheet: String,
}

impl Default for RawTableConfig {
    fn default() -> Self {
        Self {
            sheet: default_raw_sheet(),
        }
    }
}

fn default_raw_sheet() -> String {
    DEFAULT_RAW_SHEET.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceTableConfig {
    /// Sheet to read. `None` = first sheet in the workbook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    /// Table has no header row; columns are addressed by position.
    #[serde(default)]
    pub headerless: bool,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.raw.sheet.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "raw.sheet must not be empty".into(),
            ));
        }

        for (name, table) in [
            ("racf_reference", &self.racf_reference),
            ("comm_reference", &self.comm_reference),
        ] {
            if let Some(ref sheet) = table.sheet {
                if sheet.trim().is_empty() {
                    return Err(ReconError::ConfigValidation(format!(
                        "{name}.sheet must not be empty (omit it to use the first sheet)"
                    )));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
