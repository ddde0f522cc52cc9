//! Pure reconciliation rules: which rows are new, which rows are stale,
//! which cells to touch, and what order a rebuilt sheet lands in.
//!
//! Everything here is synchronous and side-effect free; the sync flows
//! wire these rules to the scraper and the sheet.

use crate::schema::{Field, Header, IpoRecord};
use crate::traits::RowId;
use chrono::NaiveDate;
use std::cmp::Reverse;
use std::collections::HashSet;

/// Codes present on the listing view but absent from the sheet, in view
/// order. Duplicates within `fetched` are collapsed to their first
/// appearance, so the result never introduces a duplicate row.
pub fn diff_new_codes(existing: &HashSet<String>, fetched: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    fetched
        .iter()
        .filter(|code| !existing.contains(*code) && seen.insert(code.as_str()))
        .cloned()
        .collect()
}

/// One placeholder record per new code, in the same order. Placeholders
/// carry only the stock code; every other column renders as the unknown
/// sentinel when the row is written.
pub fn placeholder_records(codes: &[String]) -> Vec<IpoRecord> {
    codes.iter().map(|code| IpoRecord::new(code)).collect()
}

/// Rows that still need a fresh scrape, top to bottom, paired with their
/// stock code. Two rows holding the same code are both surfaced; rows
/// with no code at all cannot be refreshed and are skipped.
pub fn find_incomplete(rows: &[(RowId, IpoRecord)]) -> Vec<(RowId, String)> {
    rows.iter()
        .filter(|(_, record)| !record.is_complete())
        .filter_map(|(row, record)| {
            record.get(Field::Code).map(|code| (*row, code.to_string()))
        })
        .collect()
}

/// The cell updates that folding `fetched` into `existing` would cause.
///
/// Additive only: a fetched field produces a patch when it is known,
/// inside the header, and different from what the row already holds.
/// Fields the fetch came back without are never patched, so a value
/// already on the sheet can only be overwritten, not erased.
pub fn merge_patch(
    existing: &IpoRecord,
    fetched: &IpoRecord,
    header: &Header,
) -> Vec<(Field, String)> {
    fetched
        .known()
        .filter(|(field, _)| header.contains(*field))
        .filter(|(field, value)| existing.get(*field) != Some(*value))
        .map(|(field, value)| (field, value.to_string()))
        .collect()
}

/// Order a full rebuild the way the sheet is read: listings still waiting
/// on a listing date first (latest subscription start on top), then
/// everything already dated (latest listing first).
///
/// Dates that fail to parse sink to the end of their group; within equal
/// keys the incoming order is kept.
pub fn sort_for_full_refresh(records: Vec<IpoRecord>) -> Vec<IpoRecord> {
    let (mut pending, mut listed): (Vec<IpoRecord>, Vec<IpoRecord>) = records
        .into_iter()
        .partition(|record| listing_date(record).is_none());

    pending.sort_by_key(|record| Reverse(subscription_start(record)));
    listed.sort_by_key(|record| Reverse(listing_date(record)));

    pending.append(&mut listed);
    pending
}

fn listing_date(record: &IpoRecord) -> Option<NaiveDate> {
    parse_flexible_date(record.get(Field::ListingDate)?)
}

fn subscription_start(record: &IpoRecord) -> Option<NaiveDate> {
    let range = record.get(Field::SubscriptionDate)?;
    parse_flexible_date(range.split('~').next().unwrap_or(range))
}

/// Tolerant date parse for scraped cells, e.g.,
///
/// ```text
/// "2024.01.10"  -> 2024-01-10
/// "2024-1-5"    -> 2024-01-05
/// "2024.02.01." -> 2024-02-01
/// "미정"         -> None
/// ```
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = raw.trim().trim_end_matches('.').trim();
    if cleaned.is_empty() {
        return None;
    }
    const FORMATS: [&str; 3] = ["%Y.%m.%d", "%Y-%m-%d", "%Y/%m/%d"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cleaned, fmt).ok())
}
