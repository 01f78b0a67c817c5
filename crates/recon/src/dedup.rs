use std::collections::BTreeMap;

use crate::model::DatedRecord;
use crate::schema::RawSchema;

/// `candidate` replaces `incumbent` when it is dated the same day or later.
///
/// Candidates are visited in input order, so on equal dates the later row
/// wins, same as a stable ascending sort followed by taking the last element.
pub fn supersedes(candidate: &DatedRecord, incumbent: &DatedRecord) -> bool {
    candidate.effective_date >= incumbent.effective_date
}

/// Keep one record per bill code: the latest effective date.
///
/// Bill codes compare exactly (no trimming or case folding). Output is sorted
/// by bill code.
pub fn deduplicate(records: Vec<DatedRecord>, schema: &RawSchema) -> Vec<DatedRecord> {
    let mut best: BTreeMap<String, DatedRecord> = BTreeMap::new();

    for record in records {
        let key = schema.bill_code(&record.record).to_string();
        match best.get(&key) {
            Some(incumbent) if !supersedes(&record, incumbent) => {}
            _ => {
                best.insert(key, record);
            }
        }
    }

    best.into_values().collect()
}
