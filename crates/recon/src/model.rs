use chrono::NaiveDate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A loaded sheet: trimmed header row plus string rows padded to header width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Widest row or header, whichever is larger.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Everything one run consumes. Reference tables are optional; a missing one
/// leaves its category unreconciled.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub raw: Table,
    pub racf_reference: Option<Table>,
    pub comm_reference: Option<Table>,
}

/// One row of the raw export. Field access goes through `RawSchema`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 0-based position in the raw table; fixes tie-break order.
    pub line: usize,
    pub values: Vec<String>,
}

impl RawRecord {
    pub fn get(&self, col: usize) -> &str {
        self.values.get(col).map(String::as_str).unwrap_or("")
    }
}

/// A raw record whose effective date parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct DatedRecord {
    pub record: RawRecord,
    pub effective_date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Racf,
    Comm,
    Others,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Racf => write!(f, "RACF"),
            Self::Comm => write!(f, "COMM"),
            Self::Others => write!(f, "OTHERS"),
        }
    }
}

/// Dated records split by category, input order preserved within each.
#[derive(Debug, Clone, Default)]
pub struct Categorized {
    pub racf: Vec<DatedRecord>,
    pub comm: Vec<DatedRecord>,
    pub others: Vec<DatedRecord>,
    /// Rows dropped because their effective date did not parse.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Reference tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RacfReferenceEntry {
    pub salesforce_code: String,
    pub funder_code: String,
    pub cpi_multiplier: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommReferenceEntry {
    pub bill_code: String,
    pub rate: String,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Output cell. Raw fields are always text; computed rates are numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Number(f64),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n:.2}"),
        }
    }
}

/// A canonical record after reference lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    pub source: DatedRecord,
    /// Replaces the `Rate` column when set.
    pub rate_override: Option<Value>,
    /// Columns appended after the raw fields, in order.
    pub extra: Vec<(String, Value)>,
}

impl ReconciledRecord {
    /// A record that went through no reference lookup.
    pub fn passthrough(source: DatedRecord) -> Self {
        Self {
            source,
            rate_override: None,
            extra: Vec::new(),
        }
    }

    pub fn extra(&self, column: &str) -> Option<&Value> {
        self.extra.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }
}

/// Matched records stay in their category; rerouted ones move to OTHERS.
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    pub matched: Vec<ReconciledRecord>,
    pub rerouted: Vec<ReconciledRecord>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Sheet {
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Cell by header name; `None` if the column or row is absent.
    pub fn value(&self, row: usize, header: &str) -> Option<&Value> {
        let col = self.column(header)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }
}

/// Named sheets in write order. Built once, then handed to the writer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputBundle {
    pub sheets: Vec<Sheet>,
}

impl OutputBundle {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub input_rows: usize,
    pub skipped_invalid_date: usize,
    pub racf_classified: usize,
    pub comm_classified: usize,
    pub others_classified: usize,
    pub racf_entries: usize,
    pub comm_entries: usize,
    pub others_entries: usize,
    pub racf_matched: usize,
    pub racf_rerouted: usize,
    pub comm_matched: usize,
    pub comm_rerouted: usize,
    pub others_total: usize,
}

impl RunSummary {
    /// Records across all categories after rerouting.
    pub fn output_records(&self) -> usize {
        self.racf_matched + self.comm_matched + self.others_total
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub bundle: OutputBundle,
    pub summary: RunSummary,
}
