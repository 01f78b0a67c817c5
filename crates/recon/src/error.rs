use std::fmt;

/// Fatal pipeline errors. Per-record conditions (bad dates, unmatched
/// references, non-numeric rates) are recovered in place and never show up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty sheet name, etc.).
    ConfigValidation(String),
    /// A required column could not be resolved in the raw table.
    MissingRequiredField { table: String, field: String },
    /// A reference table lacks a column the reconciler needs.
    ReferenceTableMalformed { table: String, reason: String },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingRequiredField { table, field } => {
                write!(f, "table '{table}': missing required column '{field}'")
            }
            Self::ReferenceTableMalformed { table, reason } => {
                write!(f, "reference table '{table}' is malformed: {reason}")
            }
        }
    }
}

impl std::error::Error for ReconError {}
