//! The two top-level flows: the incremental run that keeps an existing
//! sheet current, and the full refresh that rebuilds it from scratch.

use crate::config::Config;
use crate::progress;
use crate::reconcile::{
    diff_new_codes, find_incomplete, merge_patch, placeholder_records, sort_for_full_refresh,
};
use crate::schema::{Field, IpoRecord};
use crate::traits::{CellPatch, DetailFetcher, ListingEnumerator, ListingKind, RowId, SheetStore};
use anyhow::Result;
use futures::StreamExt;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

/// Default run: add rows for newly announced IPOs, then re-scrape every
/// row that is still missing a subscription date, a decided listing date
/// or a competition ratio.
pub async fn run_incremental(
    config: &Config,
    enumerator: &dyn ListingEnumerator,
    fetcher: &dyn DetailFetcher,
    store: &dyn SheetStore,
) -> Result<()> {
    add_new_listings(config, enumerator, store).await?;
    patch_incomplete_rows(config, fetcher, store).await?;
    Ok(())
}

/// Rebuild run: enumerate both listing views, scrape every detail page,
/// and rewrite the sheet in reading order.
pub async fn run_full_refresh(
    config: &Config,
    enumerator: &dyn ListingEnumerator,
    fetcher: &dyn DetailFetcher,
    store: &dyn SheetStore,
) -> Result<()> {
    info!("full refresh: collecting codes from the recent and upcoming views");
    let recent = enumerator.enumerate(ListingKind::Recent).await?;
    let upcoming = enumerator.enumerate(ListingKind::Upcoming).await?;

    // union of both views, deduplicated, ascending for a stable fetch order
    let codes: Vec<String> = recent
        .into_iter()
        .chain(upcoming)
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();
    if codes.is_empty() {
        info!("no codes collected; leaving the sheet untouched");
        return Ok(());
    }

    info!("fetching details for {} listings", codes.len());
    let details = fetch_details(config, fetcher, &codes).await;
    if details.is_empty() {
        info!("no usable details collected; leaving the sheet untouched");
        return Ok(());
    }

    let records = sort_for_full_refresh(details);
    info!("rewriting the sheet with {} rows", records.len());
    store.replace_all(&config.header, &records).await?;
    Ok(())
}

/// Phase 1 of the incremental run: rows for codes on the upcoming view
/// that the sheet has never seen, inserted directly below the header as
/// code-only placeholders. Phase 2 fills them in.
async fn add_new_listings(
    config: &Config,
    enumerator: &dyn ListingEnumerator,
    store: &dyn SheetStore,
) -> Result<()> {
    info!("phase 1: checking the upcoming view for unknown codes");
    let upcoming = enumerator.enumerate(ListingKind::Upcoming).await?;
    if upcoming.is_empty() {
        info!("the upcoming view is empty");
        return Ok(());
    }

    let rows = store.read_all().await?;
    let existing: HashSet<String> = rows
        .iter()
        .filter_map(|(_, record)| record.get(Field::Code).map(str::to_string))
        .collect();

    let new_codes = diff_new_codes(&existing, &upcoming);
    if new_codes.is_empty() {
        info!("every upcoming IPO is already on the sheet");
        return Ok(());
    }

    info!("{} new IPOs found; inserting placeholder rows", new_codes.len());
    let placeholders = placeholder_records(&new_codes);
    store.insert_top(&config.header, &placeholders).await
}

/// Phase 2 of the incremental run: scrape fresh details for every
/// incomplete row and patch only the cells the scrape improved.
async fn patch_incomplete_rows(
    config: &Config,
    fetcher: &dyn DetailFetcher,
    store: &dyn SheetStore,
) -> Result<()> {
    info!("phase 2: refreshing incomplete rows");
    let rows = store.read_all().await?;
    if rows.is_empty() {
        info!("the sheet has no data rows");
        return Ok(());
    }

    let targets = find_incomplete(&rows);
    if targets.is_empty() {
        info!("every row is complete");
        return Ok(());
    }
    info!("{} rows need fresh details", targets.len());

    let codes: Vec<String> = targets.iter().map(|(_, code)| code.clone()).collect();
    let details = fetch_details(config, fetcher, &codes).await;
    if details.is_empty() {
        info!("no usable details came back this run");
        return Ok(());
    }

    let by_code: HashMap<&str, &IpoRecord> = details
        .iter()
        .filter_map(|detail| detail.get(Field::Code).map(|code| (code, detail)))
        .collect();
    let by_row: HashMap<RowId, &IpoRecord> =
        rows.iter().map(|(row, record)| (*row, record)).collect();

    let mut patches: Vec<CellPatch> = Vec::new();
    for (row, code) in &targets {
        let (Some(fetched), Some(on_sheet)) = (by_code.get(code.as_str()), by_row.get(row))
        else {
            continue;
        };
        for (field, value) in merge_patch(on_sheet, fetched, &config.header) {
            patches.push(CellPatch {
                row: *row,
                field,
                value,
            });
        }
    }

    if patches.is_empty() {
        info!("the fetched details added nothing new");
        return Ok(());
    }
    info!("writing {} cell updates", patches.len());
    store.patch_cells(&patches).await
}

/// Fan the detail fetches out over `max_workers` concurrent requests.
/// Records that came back without a company name are failed scrapes and
/// are dropped here.
async fn fetch_details(
    config: &Config,
    fetcher: &dyn DetailFetcher,
    codes: &[String],
) -> Vec<IpoRecord> {
    let pb = progress::single_pb(codes.len() as u64);
    let fetched: Vec<IpoRecord> = futures::stream::iter(codes)
        .map(|code| {
            let pb = pb.clone();
            async move {
                let detail = fetcher.fetch_detail(code).await;
                pb.inc(1);
                detail
            }
        })
        .buffer_unordered(config.max_workers)
        .collect()
        .await;
    pb.finish_and_clear();

    fetched
        .into_iter()
        .filter(|detail| {
            let usable = detail.get(Field::Name).is_some();
            if !usable {
                debug!(
                    "dropping nameless detail record for {:?}",
                    detail.get(Field::Code)
                );
            }
            usable
        })
        .collect()
}
