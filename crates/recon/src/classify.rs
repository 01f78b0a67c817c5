use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::model::{Categorized, Category, DatedRecord, RawRecord, Table};
use crate::schema::RawSchema;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%b-%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse an effective date the way the export tools write them.
///
/// Slash dates are tried month-first, then day-first, so `13/02/2024` still
/// parses. Returns `None` for empty or unrecognised text.
pub fn parse_effective_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Assign a category from funder and bill code text.
///
/// Priority order:
/// - funder contains "racf" but not "racfpff" → RACF
/// - funder contains "comm" and bill code is hourly → COMM
/// - everything else → OTHERS
pub fn classify(funder_code: &str, bill_code: &str) -> Category {
    let funder = funder_code.trim().to_lowercase();
    let bill = bill_code.trim().to_lowercase();

    if funder.contains("racf") && !funder.contains("racfpff") {
        Category::Racf
    } else if funder.contains("comm") {
        if bill.contains("(hrly)") || bill.contains("(hourly)") {
            Category::Comm
        } else {
            Category::Others
        }
    } else {
        Category::Others
    }
}

/// Drop rows with unparseable dates, then split the rest by category.
pub fn categorize(raw: &Table, schema: &RawSchema) -> Categorized {
    let mut out = Categorized::default();

    for (line, row) in raw.rows.iter().enumerate() {
        let record = RawRecord {
            line,
            values: row.clone(),
        };

        let Some(effective_date) = parse_effective_date(schema.effective_date(&record)) else {
            debug!(
                line,
                value = schema.effective_date(&record),
                "skipping row with invalid effective date"
            );
            out.skipped += 1;
            continue;
        };

        let category = classify(schema.funder_code(&record), schema.bill_code(&record));
        let dated = DatedRecord {
            record,
            effective_date,
        };

        match category {
            Category::Racf => out.racf.push(dated),
            Category::Comm => out.comm.push(dated),
            Category::Others => out.others.push(dated),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn racf_funder() {
        assert_eq!(classify("RACF-GOV", "Personal Care"), Category::Racf);
        assert_eq!(classify("  racf_home ", ""), Category::Racf);
    }

    #[test]
    fn racfpff_is_others() {
        assert_eq!(classify("RACFPFF-BONUS", "Personal Care"), Category::Others);
        assert_eq!(classify("RACFPFF-1", "Nursing (Hrly)"), Category::Others);
    }

    #[test]
    fn comm_requires_hourly_marker() {
        assert_eq!(classify("COMM-X", "Nursing (Hrly)"), Category::Comm);
        assert_eq!(classify("COMM-X", "Nursing (HOURLY)"), Category::Comm);
        assert_eq!(classify("COMM-X", "Nursing Daily"), Category::Others);
        assert_eq!(classify("COMM-X", "Nursing hrly"), Category::Others);
    }

    #[test]
    fn racf_checked_before_comm() {
        // Contains both "racf" and "comm"; RACF rule runs first.
        assert_eq!(classify("RACF-COMMUNITY", "Day"), Category::Racf);
    }

    #[test]
    fn unknown_funder_is_others() {
        assert_eq!(classify("NDIS", "Nursing (Hrly)"), Category::Others);
        assert_eq!(classify("", ""), Category::Others);
    }

    #[test]
    fn parses_common_date_shapes() {
        assert_eq!(parse_effective_date("2024-01-31"), Some(date("2024-01-31")));
        assert_eq!(parse_effective_date("2024-01-31 00:00:00"), Some(date("2024-01-31")));
        assert_eq!(parse_effective_date("2024-01-31T08:30:00.5"), Some(date("2024-01-31")));
        assert_eq!(parse_effective_date("2024/01/31"), Some(date("2024-01-31")));
        assert_eq!(parse_effective_date("01/31/2024"), Some(date("2024-01-31")));
        assert_eq!(parse_effective_date("31/01/2024"), Some(date("2024-01-31")));
        assert_eq!(parse_effective_date("01-Jan-2024"), Some(date("2024-01-01")));
        assert_eq!(parse_effective_date(" 2024-01-31 "), Some(date("2024-01-31")));
    }

    #[test]
    fn month_first_wins_when_ambiguous() {
        assert_eq!(parse_effective_date("02/03/2024"), Some(date("2024-02-03")));
    }

    #[test]
    fn rejects_invalid_dates() {
        assert_eq!(parse_effective_date(""), None);
        assert_eq!(parse_effective_date("   "), None);
        assert_eq!(parse_effective_date("2024-02-30"), None);
        assert_eq!(parse_effective_date("not a date"), None);
    }

    #[test]
    fn categorize_counts_skipped_rows() {
        let table = Table::new(
            "BillCodeRates",
            vec!["BillCode".into(), "FunderCode".into(), "EffectiveDate".into()],
            vec![
                vec!["A".into(), "RACF-GOV".into(), "2024-01-01".into()],
                vec!["B".into(), "COMM-X".into(), "".into()],
                vec!["C (Hrly)".into(), "COMM-X".into(), "2024-01-01".into()],
                vec!["D".into(), "NDIS".into(), "garbage".into()],
                vec!["E".into(), "NDIS".into(), "2024-03-01".into()],
            ],
        );
        let schema = RawSchema::resolve(&table).unwrap();
        let out = categorize(&table, &schema);

        assert_eq!(out.skipped, 2);
        assert_eq!(out.racf.len(), 1);
        assert_eq!(out.comm.len(), 1);
        assert_eq!(out.others.len(), 1);
        assert_eq!(out.others[0].record.line, 4);
        assert_eq!(out.comm[0].effective_date, date("2024-01-01"));
    }
}
