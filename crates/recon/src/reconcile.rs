use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::{CaseSensitivity, CommRatePolicy};
use crate::error::ReconError;
use crate::model::{
    CommReferenceEntry, DatedRecord, RacfReferenceEntry, Reconciled, ReconciledRecord, Table, Value,
};
use crate::schema::{CommSchema, RacfSchema, RawSchema};

pub const SALESFORCE_COLUMN: &str = "Matched Salesforce Code";
pub const CPI_RATE_COLUMN: &str = "New CPI Adjusted Rate";
pub const MATCHED_RATE_COLUMN: &str = "Matched Rate";

/// Marker left on RACF records with no reference row.
pub const NOT_FOUND: &str = "Not Found";
/// Marker left on COMM records with no reference row.
pub const NO_MATCH: &str = "No Match";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Trim and drop embedded line breaks; spreadsheet cells often carry them.
pub fn normalize_key(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect()
}

/// A finite number, or `None`. Never fails loudly.
pub fn parse_number(value: &str) -> Option<f64> {
    let n: f64 = value.trim().parse().ok()?;
    n.is_finite().then_some(n)
}

/// Round half away from zero to two decimals.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `round(rate * multiplier, 2)` when both sides are numeric. An overflowing
/// product counts as non-numeric.
pub fn adjusted_rate(rate: &str, multiplier: &str) -> Option<f64> {
    Some(round_cents(parse_number(rate)? * parse_number(multiplier)?)).filter(|v| v.is_finite())
}

/// Result of reconciling one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Matched(ReconciledRecord),
    Rerouted(ReconciledRecord),
}

fn collect(outcomes: impl Iterator<Item = Outcome>) -> Reconciled {
    let mut out = Reconciled::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Matched(r) => out.matched.push(r),
            Outcome::Rerouted(r) => out.rerouted.push(r),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// RACF
// ---------------------------------------------------------------------------

/// Funder code → reference row. First row wins on duplicate keys.
#[derive(Debug, Clone)]
pub struct RacfIndex {
    entries: HashMap<String, RacfReferenceEntry>,
    case: CaseSensitivity,
    has_cpi: bool,
}

impl RacfIndex {
    pub fn new(rows: Vec<RacfReferenceEntry>, case: CaseSensitivity, has_cpi: bool) -> Self {
        let mut entries = HashMap::new();
        for row in rows {
            let key = fold_case(normalize_key(&row.funder_code), case);
            if key.is_empty() {
                continue;
            }
            entries.entry(key).or_insert(row);
        }
        Self {
            entries,
            case,
            has_cpi,
        }
    }

    pub fn from_table(
        table: &Table,
        headerless: bool,
        case: CaseSensitivity,
    ) -> Result<Self, ReconError> {
        let schema = RacfSchema::resolve(table, headerless)?;
        Ok(Self::new(
            schema.entries(table),
            case,
            schema.cpi_multiplier.is_some(),
        ))
    }

    pub fn lookup(&self, funder_code: &str) -> Option<&RacfReferenceEntry> {
        self.entries
            .get(&fold_case(normalize_key(funder_code), self.case))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn fold_case(key: String, case: CaseSensitivity) -> String {
    match case {
        CaseSensitivity::Sensitive => key,
        CaseSensitivity::Insensitive => key.to_lowercase(),
    }
}

pub fn reconcile_racf_record(
    record: DatedRecord,
    schema: &RawSchema,
    index: &RacfIndex,
) -> Outcome {
    let Some(entry) = index.lookup(schema.funder_code(&record.record)) else {
        return Outcome::Rerouted(ReconciledRecord {
            source: record,
            rate_override: None,
            extra: vec![(SALESFORCE_COLUMN.into(), Value::text(NOT_FOUND))],
        });
    };

    let mut extra = vec![(SALESFORCE_COLUMN.into(), Value::text(&entry.salesforce_code))];

    if index.has_cpi {
        let adjusted = match (schema.rate(&record.record), entry.cpi_multiplier.as_deref()) {
            (Some(rate), Some(cpi)) => adjusted_rate(rate, cpi),
            _ => None,
        };
        let cell = adjusted.map(Value::Number).unwrap_or_default();
        extra.push((CPI_RATE_COLUMN.into(), cell));
    }

    Outcome::Matched(ReconciledRecord {
        source: record,
        rate_override: None,
        extra,
    })
}

pub fn reconcile_racf(records: Vec<DatedRecord>, schema: &RawSchema, index: &RacfIndex) -> Reconciled {
    let out = collect(records.into_iter().map(|r| {
        let outcome = reconcile_racf_record(r, schema, index);
        if let Outcome::Rerouted(ref r) = outcome {
            debug!(
                line = r.source.record.line,
                funder = schema.funder_code(&r.source.record),
                "RACF funder not in reference table, rerouting to OTHERS"
            );
        }
        outcome
    }));
    info!(matched = out.matched.len(), rerouted = out.rerouted.len(), "RACF reconciled");
    out
}

// ---------------------------------------------------------------------------
// COMM
// ---------------------------------------------------------------------------

/// Bill code (case-insensitive) → reference row. First row wins.
#[derive(Debug, Clone)]
pub struct CommIndex {
    entries: HashMap<String, CommReferenceEntry>,
}

impl CommIndex {
    pub fn new(rows: Vec<CommReferenceEntry>) -> Self {
        let mut entries = HashMap::new();
        for row in rows {
            let key = normalize_key(&row.bill_code).to_lowercase();
            if key.is_empty() {
                continue;
            }
            entries.entry(key).or_insert(row);
        }
        Self { entries }
    }

    pub fn from_table(table: &Table, headerless: bool) -> Result<Self, ReconError> {
        let schema = CommSchema::resolve(table, headerless)?;
        Ok(Self::new(schema.entries(table)))
    }

    pub fn lookup(&self, bill_code: &str) -> Option<&CommReferenceEntry> {
        self.entries.get(&normalize_key(bill_code).to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn reconcile_comm_record(
    record: DatedRecord,
    schema: &RawSchema,
    index: &CommIndex,
    policy: CommRatePolicy,
) -> Outcome {
    let Some(entry) = index.lookup(schema.bill_code(&record.record)) else {
        return Outcome::Rerouted(ReconciledRecord {
            source: record,
            rate_override: None,
            extra: vec![(MATCHED_RATE_COLUMN.into(), Value::text(NO_MATCH))],
        });
    };

    let rate_override = match (policy, schema.rate(&record.record)) {
        (CommRatePolicy::Annotate, _) | (_, None) => None,
        (CommRatePolicy::Replace, Some(_)) => Some(
            parse_number(&entry.rate)
                .map(Value::Number)
                .unwrap_or_else(|| Value::text(&entry.rate)),
        ),
        (CommRatePolicy::Multiply, Some(rate)) => adjusted_rate(rate, &entry.rate).map(Value::Number),
    };

    Outcome::Matched(ReconciledRecord {
        source: record,
        rate_override,
        extra: vec![(MATCHED_RATE_COLUMN.into(), Value::text(&entry.rate))],
    })
}

pub fn reconcile_comm(
    records: Vec<DatedRecord>,
    schema: &RawSchema,
    index: &CommIndex,
    policy: CommRatePolicy,
) -> Reconciled {
    let out = collect(records.into_iter().map(|r| {
        let outcome = reconcile_comm_record(r, schema, index, policy);
        if let Outcome::Rerouted(ref r) = outcome {
            debug!(
                line = r.source.record.line,
                bill_code = schema.bill_code(&r.source.record),
                "COMM bill code not in reference table, rerouting to OTHERS"
            );
        }
        outcome
    }));
    info!(
        matched = out.matched.len(),
        rerouted = out.rerouted.len(),
        %policy,
        "COMM reconciled"
    );
    out
}
