use indexmap::IndexMap;

use sentinel_core::FilingRecord;

/// Union two result sets, deduplicated by accession number.
///
/// On conflict the `primary` record is kept. Output order is first-seen:
/// all primary records, then the secondary records not already present.
pub fn merge(primary: Vec<FilingRecord>, secondary: Vec<FilingRecord>) -> Vec<FilingRecord> {
    let mut merged: IndexMap<String, FilingRecord> =
        IndexMap::with_capacity(primary.len() + secondary.len());
    for record in primary {
        merged
            .entry(record.accession_number.clone())
            .or_insert(record);
    }
    for record in secondary {
        merged
            .entry(record.accession_number.clone())
            .or_insert(record);
    }
    merged.into_values().collect()
}
