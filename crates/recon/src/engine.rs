use tracing::info;

use crate::assemble::{assemble, Routed};
use crate::classify::categorize;
use crate::config::PipelineConfig;
use crate::dedup::deduplicate;
use crate::error::ReconError;
use crate::model::{PipelineInput, Reconciled, ReconciledRecord, RunOutput, RunSummary};
use crate::reconcile::{reconcile_comm, reconcile_racf, CommIndex, RacfIndex};
use crate::schema::RawSchema;

/// Run the whole pipeline: classify, deduplicate, reconcile, assemble.
///
/// All structural checks (raw columns, reference columns, config) happen
/// before the first row is classified, so an `Err` never comes with a
/// partial bundle.
pub fn run(input: &PipelineInput, config: &PipelineConfig) -> Result<RunOutput, ReconError> {
    config.validate()?;

    let schema = RawSchema::resolve(&input.raw)?;
    let racf_index = input
        .racf_reference
        .as_ref()
        .map(|t| {
            RacfIndex::from_table(
                t,
                config.racf_reference.headerless,
                config.racf_match_case_sensitivity,
            )
        })
        .transpose()?;
    let comm_index = input
        .comm_reference
        .as_ref()
        .map(|t| CommIndex::from_table(t, config.comm_reference.headerless))
        .transpose()?;
    info!(
        racf_keys = racf_index.as_ref().map_or(0, RacfIndex::len),
        comm_keys = comm_index.as_ref().map_or(0, CommIndex::len),
        "indexed reference tables"
    );

    let categorized = categorize(&input.raw, &schema);
    let mut summary = RunSummary {
        input_rows: input.raw.rows.len(),
        skipped_invalid_date: categorized.skipped,
        racf_classified: categorized.racf.len(),
        comm_classified: categorized.comm.len(),
        others_classified: categorized.others.len(),
        ..Default::default()
    };
    info!(
        rows = summary.input_rows,
        skipped = summary.skipped_invalid_date,
        racf = summary.racf_classified,
        comm = summary.comm_classified,
        others = summary.others_classified,
        "classified raw rows"
    );

    let racf = deduplicate(categorized.racf, &schema);
    let comm = deduplicate(categorized.comm, &schema);
    let others = deduplicate(categorized.others, &schema);
    summary.racf_entries = racf.len();
    summary.comm_entries = comm.len();
    summary.others_entries = others.len();
    info!(
        racf = summary.racf_entries,
        comm = summary.comm_entries,
        others = summary.others_entries,
        "deduplicated by bill code"
    );

    // No reference table: the category is kept as-is.
    let racf = match racf_index {
        Some(ref index) => reconcile_racf(racf, &schema, index),
        None => passthrough(racf),
    };
    let comm = match comm_index {
        Some(ref index) => reconcile_comm(comm, &schema, index, config.comm_rate_policy),
        None => passthrough(comm),
    };

    summary.racf_matched = racf.matched.len();
    summary.racf_rerouted = racf.rerouted.len();
    summary.comm_matched = comm.matched.len();
    summary.comm_rerouted = comm.rerouted.len();

    let mut routed_others: Vec<ReconciledRecord> =
        others.into_iter().map(ReconciledRecord::passthrough).collect();
    routed_others.extend(racf.rerouted);
    routed_others.extend(comm.rerouted);
    summary.others_total = routed_others.len();

    let routed = Routed {
        racf: racf.matched,
        comm: comm.matched,
        others: routed_others,
    };

    let bundle = assemble(
        config.output_shape,
        &schema,
        &routed,
        input.racf_reference.as_ref(),
        input.comm_reference.as_ref(),
    );

    Ok(RunOutput { bundle, summary })
}

fn passthrough(records: Vec<crate::model::DatedRecord>) -> Reconciled {
    Reconciled {
        matched: records.into_iter().map(ReconciledRecord::passthrough).collect(),
        rerouted: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::{COMM_SHEET, OTHERS_SHEET, RACF_SHEET};
    use crate::config::{CommRatePolicy, OutputShape};
    use crate::model::{Table, Value};

    fn raw(rows: &[[&str; 4]]) -> Table {
        Table::new(
            "BillCodeRates",
            vec![
                "BillCode*".into(),
                "FunderCode*".into(),
                "Effective Date*".into(),
                "Rate*".into(),
            ],
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn racf_ref() -> Table {
        Table::new(
            "racf",
            vec!["Salesforce Code".into(), "FunderCode".into(), "CPI".into()],
            vec![vec!["SF-GOV".into(), "RACF-GOV".into(), "1.05".into()]],
        )
    }

    fn comm_ref() -> Table {
        Table::new(
            "comm",
            vec!["BillCode*".into(), "Rate*".into()],
            vec![vec!["Nursing (Hrly)".into(), "1.1".into()]],
        )
    }

    #[test]
    fn end_to_end_multi_sheet() {
        let input = PipelineInput {
            raw: raw(&[
                ["X1", "RACF-GOV", "2023-01-01", "10"],
                ["X1", "RACF-GOV", "2024-01-01", "12"],
                ["X2", "RACF-NOPE", "2024-01-01", "9"],
                ["Nursing (Hrly)", "COMM-X", "2024-01-01", "50"],
                ["Gardening (Hrly)", "COMM-X", "2024-01-01", "40"],
                ["Nursing Daily", "COMM-X", "2024-01-01", "300"],
                ["P1", "RACFPFF-BONUS", "2024-01-01", "1"],
                ["Z9", "NDIS", "", "1"],
            ]),
            racf_reference: Some(racf_ref()),
            comm_reference: Some(comm_ref()),
        };

        let out = run(&input, &PipelineConfig::default()).unwrap();
        let s = &out.summary;
        assert_eq!(s.input_rows, 8);
        assert_eq!(s.skipped_invalid_date, 1);
        assert_eq!((s.racf_classified, s.comm_classified, s.others_classified), (3, 2, 2));
        assert_eq!(s.racf_entries, 2);
        assert_eq!((s.racf_matched, s.racf_rerouted), (1, 1));
        assert_eq!((s.comm_matched, s.comm_rerouted), (1, 1));
        assert_eq!(s.others_total, 4);

        let racf = out.bundle.sheet(RACF_SHEET).unwrap();
        assert_eq!(racf.rows.len(), 1);
        assert_eq!(racf.value(0, "Rate*"), Some(&Value::text("12")));
        assert_eq!(racf.value(0, "New CPI Adjusted Rate"), Some(&Value::Number(12.6)));

        let others = out.bundle.sheet(OTHERS_SHEET).unwrap();
        let bills: Vec<String> = others.rows.iter().map(|r| r[0].to_string()).collect();
        assert_eq!(bills, vec!["Nursing Daily", "P1", "X2", "Gardening (Hrly)"]);
    }

    #[test]
    fn missing_reference_tables_pass_through() {
        let input = PipelineInput {
            raw: raw(&[
                ["X1", "RACF-GOV", "2024-01-01", "10"],
                ["C1 (Hrly)", "COMM-X", "2024-01-01", "50"],
            ]),
            racf_reference: None,
            comm_reference: None,
        };
        let out = run(&input, &PipelineConfig::default()).unwrap();
        assert_eq!(out.bundle.sheets.len(), 3);
        assert_eq!(out.summary.racf_matched, 1);
        assert_eq!(out.summary.comm_matched, 1);
        assert_eq!(out.bundle.sheet(COMM_SHEET).unwrap().headers.len(), 4);
    }

    #[test]
    fn missing_column_aborts_before_output() {
        let input = PipelineInput {
            raw: Table::new("BillCodeRates", vec!["BillCode".into(), "Rate".into()], vec![]),
            racf_reference: None,
            comm_reference: None,
        };
        let err = run(&input, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, ReconError::MissingRequiredField { .. }));
    }

    #[test]
    fn malformed_reference_aborts() {
        let input = PipelineInput {
            raw: raw(&[["X1", "RACF-GOV", "2024-01-01", "10"]]),
            racf_reference: Some(Table::new("racf", vec!["Only".into()], vec![vec!["x".into()]])),
            comm_reference: None,
        };
        let err = run(&input, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, ReconError::ReferenceTableMalformed { .. }));
    }

    #[test]
    fn multiply_policy_and_combined_shape() {
        let input = PipelineInput {
            raw: raw(&[["Nursing (Hrly)", "COMM-X", "2024-01-01", "50"]]),
            racf_reference: None,
            comm_reference: Some(comm_ref()),
        };
        let config = PipelineConfig {
            output_shape: OutputShape::Combined,
            comm_rate_policy: CommRatePolicy::Multiply,
            ..Default::default()
        };
        let out = run(&input, &config).unwrap();
        assert_eq!(out.bundle.sheet_names(), vec!["Combined", "Reference Table - COMM"]);
        let sheet = &out.bundle.sheets[0];
        assert_eq!(sheet.value(0, "Category"), Some(&Value::text("COMM")));
        assert_eq!(sheet.value(0, "Rate*"), Some(&Value::Number(55.0)));
    }
}
