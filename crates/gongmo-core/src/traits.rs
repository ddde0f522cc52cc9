use crate::schema::{Field, Header, IpoRecord};
use anyhow::Result;
use async_trait::async_trait;

/// Opaque handle for one data row of the store.
///
/// Handles are minted by [`SheetStore::read_all`] and are only valid
/// until the next write that moves rows around; the sync flows respect
/// this by re-reading between phases. Nothing outside a store adapter
/// should interpret the inner value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(u32);

impl RowId {
    /// Mint a handle from a 1-based sheet row. Store adapters only.
    pub fn from_sheet_row(row: u32) -> Self {
        Self(row)
    }

    /// The 1-based sheet row this handle addresses. Store adapters only.
    pub fn sheet_row(self) -> u32 {
        self.0
    }
}

/// The two listing views of the source site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListingKind {
    /// IPOs that already went to market.
    Recent,
    /// IPOs in or ahead of their subscription window.
    Upcoming,
}

/// A single-cell update: write `value` into the `field` column of `row`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellPatch {
    pub row: RowId,
    pub field: Field,
    pub value: String,
}

/// Scrapes the detail page of one listing.
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    /// Fetch and parse everything the detail page knows about `code`.
    ///
    /// Never fails: network trouble or an unrecognisable page degrades to
    /// a record carrying only the stock code, which downstream treats as
    /// a failed scrape (no company name, no patch).
    async fn fetch_detail(&self, code: &str) -> IpoRecord;
}

/// Enumerates the stock codes visible on a listing view.
#[async_trait]
pub trait ListingEnumerator: Send + Sync {
    /// Codes in display order, deduplicated, most recent first.
    async fn enumerate(&self, kind: ListingKind) -> Result<Vec<String>>;
}

/// The spreadsheet behind the sync flows.
///
/// The store speaks strings only; typing, sorting and completeness all
/// live on the engine side. Row 1 is always the header row, data rows
/// sit below it.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Drop everything and rewrite the sheet: header row first, then one
    /// row per record in the given order.
    async fn replace_all(&self, header: &Header, records: &[IpoRecord]) -> Result<()>;

    /// Every data row currently on the sheet, top to bottom, paired with
    /// a handle for patching it later. Unknown-sentinel and empty cells
    /// come back as absent fields.
    async fn read_all(&self) -> Result<Vec<(RowId, IpoRecord)>>;

    /// Insert the records as new rows directly below the header,
    /// shifting existing data rows down.
    async fn insert_top(&self, header: &Header, records: &[IpoRecord]) -> Result<()>;

    /// Apply sparse single-cell updates. Cells not named are untouched.
    async fn patch_cells(&self, patches: &[CellPatch]) -> Result<()>;
}
