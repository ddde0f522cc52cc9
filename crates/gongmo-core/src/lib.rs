//! Engine for keeping a spreadsheet of Korean IPO listings in sync with
//! the scraped source: the record model, the pure reconciliation rules,
//! and the two flows that drive a scraper and a sheet store through them.

pub mod config;
pub mod progress;
pub mod reconcile;
pub mod schema;
pub mod sync;
pub mod traits;

pub use config::Config;
pub use schema::{Field, Header, IpoRecord, DEFAULT_FINANCE_YEARS, TBD, UNKNOWN};
pub use traits::{CellPatch, DetailFetcher, ListingEnumerator, ListingKind, RowId, SheetStore};
