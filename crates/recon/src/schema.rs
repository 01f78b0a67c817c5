//! Column resolution, run once per table before any row is touched.
//!
//! Headers are normalized (lower-case, alphanumerics only) so `BillCode*`,
//! `Bill Code` and `billcode` all resolve the same field. Each field has an
//! ordered list of search terms: exact normalized matches win over substring
//! matches, and a column claimed by one field is never handed to another.

use tracing::warn;

use crate::error::ReconError;
use crate::model::{CommReferenceEntry, RacfReferenceEntry, RawRecord, Table};

const BILL_CODE_TERMS: &[&str] = &["billcode"];
const FUNDER_CODE_TERMS: &[&str] = &["fundercode", "funder"];
const EFFECTIVE_DATE_TERMS: &[&str] = &["effectivedate", "effective"];
const RATE_TERMS: &[&str] = &["rate"];

const SALESFORCE_TERMS: &[&str] = &["salesforcecode", "salesforce", "sfcode", "sf"];
const CPI_TERMS: &[&str] = &["cpimultiplier", "cpi", "multiplier"];
const REF_BILL_CODE_TERMS: &[&str] = &["billcode", "bill"];

pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn find_column(normalized: &[String], terms: &[&str], claimed: &[usize]) -> Option<usize> {
    let free = |i: &usize| !claimed.contains(i);

    for term in terms {
        if let Some(i) = (0..normalized.len()).filter(free).find(|&i| normalized[i] == *term) {
            return Some(i);
        }
    }
    for term in terms {
        if let Some(i) = (0..normalized.len())
            .filter(free)
            .find(|&i| normalized[i].contains(term))
        {
            return Some(i);
        }
    }
    None
}

/// `preferred` unless `taken` holds it, else the first other column.
fn free_column(table: &Table, preferred: usize, taken: usize) -> Result<usize, ReconError> {
    let width = table.width();
    if width < 2 {
        return Err(ReconError::ReferenceTableMalformed {
            table: table.name.clone(),
            reason: format!("expected at least 2 columns, found {width}"),
        });
    }
    if preferred != taken && preferred < width {
        return Ok(preferred);
    }
    Ok((0..width).find(|&c| c != taken).unwrap_or(0))
}

// ---------------------------------------------------------------------------
// Raw table
// ---------------------------------------------------------------------------

/// Field-name to column-index mapping for the raw export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSchema {
    pub headers: Vec<String>,
    pub bill_code: usize,
    pub funder_code: usize,
    pub effective_date: usize,
    pub rate: Option<usize>,
}

impl RawSchema {
    pub fn resolve(table: &Table) -> Result<Self, ReconError> {
        let normalized: Vec<String> = table.headers.iter().map(|h| normalize_header(h)).collect();
        let mut claimed = Vec::new();

        let mut require = |field: &str, terms: &[&str]| -> Result<usize, ReconError> {
            let idx = find_column(&normalized, terms, &claimed).ok_or_else(|| {
                ReconError::MissingRequiredField {
                    table: table.name.clone(),
                    field: field.into(),
                }
            })?;
            claimed.push(idx);
            Ok(idx)
        };

        let bill_code = require("BillCode", BILL_CODE_TERMS)?;
        let funder_code = require("FunderCode", FUNDER_CODE_TERMS)?;
        let effective_date = require("EffectiveDate", EFFECTIVE_DATE_TERMS)?;
        let rate = find_column(&normalized, RATE_TERMS, &claimed);

        Ok(Self {
            headers: table.headers.clone(),
            bill_code,
            funder_code,
            effective_date,
            rate,
        })
    }

    pub fn bill_code<'a>(&self, record: &'a RawRecord) -> &'a str {
        record.get(self.bill_code)
    }

    pub fn funder_code<'a>(&self, record: &'a RawRecord) -> &'a str {
        record.get(self.funder_code)
    }

    pub fn effective_date<'a>(&self, record: &'a RawRecord) -> &'a str {
        record.get(self.effective_date)
    }

    pub fn rate<'a>(&self, record: &'a RawRecord) -> Option<&'a str> {
        self.rate.map(|i| record.get(i))
    }

    /// Name of the rate column as it appears in the raw header row.
    pub fn rate_header(&self) -> Option<&str> {
        self.rate.map(|i| self.headers[i].as_str())
    }
}

// ---------------------------------------------------------------------------
// Reference tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RacfSchema {
    pub salesforce_code: usize,
    pub funder_code: usize,
    pub cpi_multiplier: Option<usize>,
}

impl RacfSchema {
    /// Positional layout: 0 = Salesforce code, 1 = funder code, 2 = CPI.
    fn positional(table: &Table) -> Result<Self, ReconError> {
        let width = table.width();
        if width < 2 {
            return Err(ReconError::ReferenceTableMalformed {
                table: table.name.clone(),
                reason: format!("expected at least 2 columns, found {width}"),
            });
        }
        Ok(Self {
            salesforce_code: 0,
            funder_code: 1,
            cpi_multiplier: (width >= 3).then_some(2),
        })
    }

    pub fn resolve(table: &Table, headerless: bool) -> Result<Self, ReconError> {
        if headerless {
            return Self::positional(table);
        }

        let normalized: Vec<String> = table.headers.iter().map(|h| normalize_header(h)).collect();
        let salesforce = find_column(&normalized, SALESFORCE_TERMS, &[]);
        let funder = find_column(&normalized, FUNDER_CODE_TERMS, salesforce.as_slice());

        let (salesforce_code, funder_code) = match (salesforce, funder) {
            (Some(sf), Some(funder)) => (sf, funder),
            (None, None) => {
                warn!(
                    table = %table.name,
                    "salesforce/funder headers not found, using positional columns"
                );
                return Self::positional(table);
            }
            // One named column pins the other to the remaining positional slot.
            (Some(sf), None) => (sf, free_column(table, 1, sf)?),
            (None, Some(funder)) => (free_column(table, 0, funder)?, funder),
        };

        let claimed = [salesforce_code, funder_code];
        let cpi_multiplier = find_column(&normalized, CPI_TERMS, &claimed).or_else(|| {
            // Unnamed third column carries the multiplier in older exports.
            (normalized.len() >= 3 && !claimed.contains(&2)).then_some(2)
        });
        Ok(Self {
            salesforce_code,
            funder_code,
            cpi_multiplier,
        })
    }

    pub fn entries(&self, table: &Table) -> Vec<RacfReferenceEntry> {
        (0..table.rows.len())
            .map(|r| RacfReferenceEntry {
                salesforce_code: table.cell(r, self.salesforce_code).to_string(),
                funder_code: table.cell(r, self.funder_code).to_string(),
                cpi_multiplier: self.cpi_multiplier.map(|c| table.cell(r, c).to_string()),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommSchema {
    pub bill_code: usize,
    pub rate: usize,
}

impl CommSchema {
    /// Positional layout: 0 = bill code, 1 = rate.
    fn positional(table: &Table) -> Result<Self, ReconError> {
        let width = table.width();
        if width < 2 {
            return Err(ReconError::ReferenceTableMalformed {
                table: table.name.clone(),
                reason: format!("expected at least 2 columns, found {width}"),
            });
        }
        Ok(Self { bill_code: 0, rate: 1 })
    }

    pub fn resolve(table: &Table, headerless: bool) -> Result<Self, ReconError> {
        if headerless {
            return Self::positional(table);
        }

        let normalized: Vec<String> = table.headers.iter().map(|h| normalize_header(h)).collect();
        let bill = find_column(&normalized, REF_BILL_CODE_TERMS, &[]);
        let rate = find_column(&normalized, RATE_TERMS, bill.as_slice());

        match (bill, rate) {
            (Some(bill_code), Some(rate)) => Ok(Self { bill_code, rate }),
            (None, None) => {
                warn!(
                    table = %table.name,
                    "bill code/rate headers not found, using positional columns"
                );
                Self::positional(table)
            }
            (Some(bill_code), None) => Ok(Self {
                bill_code,
                rate: free_column(table, 1, bill_code)?,
            }),
            (None, Some(rate)) => Ok(Self {
                bill_code: free_column(table, 0, rate)?,
                rate,
            }),
        }
    }

    pub fn entries(&self, table: &Table) -> Vec<CommReferenceEntry> {
        (0..table.rows.len())
            .map(|r| CommReferenceEntry {
                bill_code: table.cell(r, self.bill_code).to_string(),
                rate: table.cell(r, self.rate).to_string(),
            })
            .collect()
    }
}
