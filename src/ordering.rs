use std::cmp::{Ordering, Reverse};

use serde::{Deserialize, Serialize};

use crate::record::StudentRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Roll,
    Name,
    Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

pub fn compare(key: SortKey, a: &StudentRecord, b: &StudentRecord) -> Ordering {
    match key {
        SortKey::Roll => a.roll.cmp(&b.roll),
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Percentage => a.percentage.total_cmp(&b.percentage),
    }
}

/// Stable sort. Descending flips the comparator, so equal keys keep their
/// storage order in either direction. Name keys are lowercased once per
/// record.
pub fn sort_records(records: &mut [StudentRecord], key: SortKey, direction: SortDirection) {
    match (key, direction) {
        (SortKey::Name, SortDirection::Asc) => {
            records.sort_by_cached_key(|r| r.name.to_lowercase())
        }
        (SortKey::Name, SortDirection::Desc) => {
            records.sort_by_cached_key(|r| Reverse(r.name.to_lowercase()))
        }
        (_, SortDirection::Asc) => records.sort_by(|a, b| compare(key, a, b)),
        (_, SortDirection::Desc) => records.sort_by(|a, b| compare(key, b, a)),
    }
}
