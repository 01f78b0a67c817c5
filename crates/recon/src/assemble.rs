use crate::config::OutputShape;
use crate::model::{Category, OutputBundle, ReconciledRecord, Sheet, Table, Value};
use crate::schema::RawSchema;

pub const RACF_SHEET: &str = "RACF";
pub const COMM_SHEET: &str = "COMM";
pub const OTHERS_SHEET: &str = "OTHERS";
pub const COMBINED_SHEET: &str = "Combined";
pub const RACF_REFERENCE_SHEET: &str = "Reference Table - RACF with SF";
pub const COMM_REFERENCE_SHEET: &str = "Reference Table - COMM";
pub const CATEGORY_COLUMN: &str = "Category";

/// Final category membership after rerouting.
#[derive(Debug, Clone, Default)]
pub struct Routed {
    pub racf: Vec<ReconciledRecord>,
    pub comm: Vec<ReconciledRecord>,
    /// Original OTHERS, then rerouted RACF, then rerouted COMM.
    pub others: Vec<ReconciledRecord>,
}

impl Routed {
    pub fn len(&self) -> usize {
        self.racf.len() + self.comm.len() + self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Extra column names across `records`, in first-seen order.
fn extra_columns<'a>(records: impl IntoIterator<Item = &'a ReconciledRecord>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for (name, _) in &record.extra {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
    }
    columns
}

/// `name`, or `name (2)`, `name (3)`... when `taken` already has it.
fn unique_header(name: &str, taken: &[String]) -> String {
    if !taken.iter().any(|h| h == name) {
        return name.to_string();
    }
    (2..)
        .map(|n| format!("{name} ({n})"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Appends extra-column headers, renaming any that collide with a raw column.
fn push_extra_headers(headers: &mut Vec<String>, extras: &[String]) {
    for name in extras {
        let header = unique_header(name, headers);
        headers.push(header);
    }
}

/// Raw fields (rate override applied) followed by the requested extras.
fn record_row(record: &ReconciledRecord, schema: &RawSchema, extras: &[String]) -> Vec<Value> {
    let mut row: Vec<Value> = (0..schema.headers.len())
        .map(|col| match (&record.rate_override, schema.rate) {
            (Some(rate), Some(rate_col)) if rate_col == col => rate.clone(),
            _ => Value::text(record.source.record.get(col)),
        })
        .collect();

    row.extend(
        extras
            .iter()
            .map(|name| record.extra(name).cloned().unwrap_or_default()),
    );
    row
}

fn category_sheet(name: &str, schema: &RawSchema, records: &[ReconciledRecord]) -> Sheet {
    let extras = extra_columns(records);
    let mut headers = schema.headers.clone();
    push_extra_headers(&mut headers, &extras);

    Sheet {
        name: name.to_string(),
        headers,
        rows: records.iter().map(|r| record_row(r, schema, &extras)).collect(),
    }
}

fn combined_sheet(schema: &RawSchema, routed: &Routed) -> Sheet {
    let groups = [
        (Category::Racf, &routed.racf),
        (Category::Comm, &routed.comm),
        (Category::Others, &routed.others),
    ];

    let extras = extra_columns(groups.iter().flat_map(|(_, records)| records.iter()));
    let mut headers = vec![unique_header(CATEGORY_COLUMN, &schema.headers)];
    headers.extend(schema.headers.iter().cloned());
    push_extra_headers(&mut headers, &extras);

    let mut rows = Vec::with_capacity(routed.len());
    for (category, records) in groups {
        for record in records {
            let mut row = vec![Value::text(category.to_string())];
            row.extend(record_row(record, schema, &extras));
            rows.push(row);
        }
    }

    Sheet {
        name: COMBINED_SHEET.to_string(),
        headers,
        rows,
    }
}

/// Unmodified copy of a reference table, kept for audit.
fn reference_sheet(name: &str, table: &Table) -> Sheet {
    let width = table.width();
    let mut headers = table.headers.clone();
    headers.resize(width, String::new());

    Sheet {
        name: name.to_string(),
        headers,
        rows: table
            .rows
            .iter()
            .map(|r| (0..width).map(|c| Value::text(r.get(c).cloned().unwrap_or_default())).collect())
            .collect(),
    }
}

/// Build the workbook contents for the chosen output shape.
pub fn assemble(
    shape: OutputShape,
    schema: &RawSchema,
    routed: &Routed,
    racf_reference: Option<&Table>,
    comm_reference: Option<&Table>,
) -> OutputBundle {
    let mut sheets = match shape {
        OutputShape::MultiSheet => vec![
            category_sheet(RACF_SHEET, schema, &routed.racf),
            category_sheet(COMM_SHEET, schema, &routed.comm),
            category_sheet(OTHERS_SHEET, schema, &routed.others),
        ],
        OutputShape::Combined => vec![combined_sheet(schema, routed)],
    };

    if let Some(table) = racf_reference {
        sheets.push(reference_sheet(RACF_REFERENCE_SHEET, table));
    }
    if let Some(table) = comm_reference {
        sheets.push(reference_sheet(COMM_REFERENCE_SHEET, table));
    }

    OutputBundle { sheets }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DatedRecord, RawRecord};
    use chrono::NaiveDate;

    fn schema() -> RawSchema {
        let table = Table::new(
            "raw",
            vec![
                "BillCode".into(),
                "FunderCode".into(),
                "EffectiveDate".into(),
                "Rate".into(),
            ],
            Vec::new(),
        );
        RawSchema::resolve(&table).unwrap()
    }

    fn record(bill: &str, funder: &str, extra: Vec<(&str, Value)>) -> ReconciledRecord {
        ReconciledRecord {
            source: DatedRecord {
                record: RawRecord {
                    line: 0,
                    values: vec![bill.into(), funder.into(), "2024-01-01".into(), "10".into()],
                },
                effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            },
            rate_override: None,
            extra: extra.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    fn routed() -> Routed {
        Routed {
            racf: vec![record(
                "R1",
                "RACF-GOV",
                vec![
                    ("Matched Salesforce Code", Value::text("SF-1")),
                    ("New CPI Adjusted Rate", Value::Number(10.5)),
                ],
            )],
            comm: vec![record("C1 (Hrly)", "COMM-X", vec![("Matched Rate", Value::text("55"))])],
            others: vec![
                record("O1", "NDIS", vec![]),
                record("R2", "RACF-UNK", vec![("Matched Salesforce Code", Value::text("Not Found"))]),
                record("C2 (Hrly)", "COMM-X", vec![("Matched Rate", Value::text("No Match"))]),
            ],
        }
    }

    #[test]
    fn multi_sheet_layout() {
        let racf_ref = Table::new(
            "ref",
            vec!["Salesforce Code".into(), "FunderCode".into()],
            vec![vec!["SF-1".into(), "RACF-GOV".into()]],
        );
        let bundle = assemble(OutputShape::MultiSheet, &schema(), &routed(), Some(&racf_ref), None);

        assert_eq!(
            bundle.sheet_names(),
            vec![RACF_SHEET, COMM_SHEET, OTHERS_SHEET, RACF_REFERENCE_SHEET]
        );

        let racf = bundle.sheet(RACF_SHEET).unwrap();
        assert_eq!(racf.headers.len(), 6);
        assert_eq!(racf.value(0, "New CPI Adjusted Rate"), Some(&Value::Number(10.5)));
        assert_eq!(racf.value(0, "Rate"), Some(&Value::text("10")));

        let reference = bundle.sheet(RACF_REFERENCE_SHEET).unwrap();
        assert_eq!(reference.rows, vec![vec![Value::text("SF-1"), Value::text("RACF-GOV")]]);
    }

    #[test]
    fn others_columns_are_union_in_first_seen_order() {
        let bundle = assemble(OutputShape::MultiSheet, &schema(), &routed(), None, None);
        let others = bundle.sheet(OTHERS_SHEET).unwrap();

        assert_eq!(
            &others.headers[4..],
            &["Matched Salesforce Code".to_string(), "Matched Rate".to_string()]
        );
        assert_eq!(others.value(0, "Matched Rate"), Some(&Value::text("")));
        assert_eq!(others.value(1, "Matched Salesforce Code"), Some(&Value::text("Not Found")));
        assert_eq!(others.value(2, "Matched Rate"), Some(&Value::text("No Match")));
    }

    #[test]
    fn rate_override_replaces_rate_column() {
        let mut r = routed();
        r.comm[0].rate_override = Some(Value::Number(60.5));
        let bundle = assemble(OutputShape::MultiSheet, &schema(), &r, None, None);
        let comm = bundle.sheet(COMM_SHEET).unwrap();
        assert_eq!(comm.value(0, "Rate"), Some(&Value::Number(60.5)));
        assert_eq!(comm.value(0, "Matched Rate"), Some(&Value::text("55")));
    }

    #[test]
    fn combined_layout() {
        let bundle = assemble(OutputShape::Combined, &schema(), &routed(), None, None);
        assert_eq!(bundle.sheet_names(), vec![COMBINED_SHEET]);

        let sheet = &bundle.sheets[0];
        assert_eq!(sheet.headers[0], CATEGORY_COLUMN);
        assert_eq!(sheet.rows.len(), 5);

        let categories: Vec<String> = sheet.rows.iter().map(|r| r[0].to_string()).collect();
        assert_eq!(categories, vec!["RACF", "COMM", "OTHERS", "OTHERS", "OTHERS"]);
        assert_eq!(sheet.value(3, "Matched Salesforce Code"), Some(&Value::text("Not Found")));
    }

    #[test]
    fn colliding_headers_get_suffixed() {
        let table = Table::new(
            "raw",
            vec![
                "Category".into(),
                "BillCode".into(),
                "FunderCode".into(),
                "EffectiveDate".into(),
                "Rate".into(),
                "Matched Rate".into(),
            ],
            Vec::new(),
        );
        let schema = RawSchema::resolve(&table).unwrap();
        let mut comm = record("C1 (Hrly)", "COMM-X", vec![("Matched Rate", Value::text("55"))]);
        comm.source.record.values = vec![
            "svc".into(),
            "C1 (Hrly)".into(),
            "COMM-X".into(),
            "2024-01-01".into(),
            "50".into(),
            "old".into(),
        ];
        let routed = Routed {
            comm: vec![comm],
            ..Default::default()
        };

        let multi = assemble(OutputShape::MultiSheet, &schema, &routed, None, None);
        let sheet = multi.sheet(COMM_SHEET).unwrap();
        assert_eq!(&sheet.headers[5..], &["Matched Rate".to_string(), "Matched Rate (2)".to_string()]);
        assert_eq!(sheet.value(0, "Matched Rate"), Some(&Value::text("old")));
        assert_eq!(sheet.value(0, "Matched Rate (2)"), Some(&Value::text("55")));

        let combined = assemble(OutputShape::Combined, &schema, &routed, None, None);
        let sheet = &combined.sheets[0];
        assert_eq!(sheet.headers[0], "Category (2)");
        assert_eq!(sheet.headers[1], "Category");
        assert_eq!(sheet.value(0, "Category (2)"), Some(&Value::text("COMM")));
        assert_eq!(sheet.value(0, "Matched Rate (2)"), Some(&Value::text("55")));
    }

    #[test]
    fn empty_categories_still_get_headers() {
        let bundle = assemble(OutputShape::MultiSheet, &schema(), &Routed::default(), None, None);
        let racf = bundle.sheet(RACF_SHEET).unwrap();
        assert!(racf.rows.is_empty());
        assert_eq!(racf.headers, schema().headers);
    }
}
