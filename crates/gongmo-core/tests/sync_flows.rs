//! End-to-end runs of the two sync flows against in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use gongmo_core::{
    sync, CellPatch, Config, DetailFetcher, Field, Header, IpoRecord, ListingEnumerator,
    ListingKind, RowId, SheetStore,
};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct FakeEnumerator {
    recent: Vec<String>,
    upcoming: Vec<String>,
}

#[async_trait]
impl ListingEnumerator for FakeEnumerator {
    async fn enumerate(&self, kind: ListingKind) -> Result<Vec<String>> {
        Ok(match kind {
            ListingKind::Recent => self.recent.clone(),
            ListingKind::Upcoming => self.upcoming.clone(),
        })
    }
}

/// Returns a canned record per code; unknown codes degrade to a
/// code-only record, the same shape a failed scrape produces.
#[derive(Default)]
struct FakeFetcher {
    details: HashMap<String, IpoRecord>,
}

impl FakeFetcher {
    fn knows(mut self, record: IpoRecord) -> Self {
        let code = record.get(Field::Code).unwrap().to_string();
        self.details.insert(code, record);
        self
    }
}

#[async_trait]
impl DetailFetcher for FakeFetcher {
    async fn fetch_detail(&self, code: &str) -> IpoRecord {
        self.details
            .get(code)
            .cloned()
            .unwrap_or_else(|| IpoRecord::new(code))
    }
}

/// In-memory sheet: data rows in order, plus a log of every write call.
#[derive(Default)]
struct FakeSheet {
    rows: Mutex<Vec<IpoRecord>>,
    ops: Mutex<Vec<String>>,
}

impl FakeSheet {
    fn with_rows(rows: Vec<IpoRecord>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ops: Mutex::default(),
        }
    }

    fn rows(&self) -> Vec<IpoRecord> {
        self.rows.lock().unwrap().clone()
    }

    fn codes(&self) -> Vec<String> {
        self.rows()
            .iter()
            .map(|r| r.get(Field::Code).unwrap_or_default().to_string())
            .collect()
    }

    fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn log(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl SheetStore for FakeSheet {
    async fn replace_all(&self, _header: &Header, records: &[IpoRecord]) -> Result<()> {
        self.log(format!("replace_all:{}", records.len()));
        *self.rows.lock().unwrap() = records.to_vec();
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<(RowId, IpoRecord)>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, record)| (RowId::from_sheet_row(i as u32 + 2), record.clone()))
            .collect())
    }

    async fn insert_top(&self, _header: &Header, records: &[IpoRecord]) -> Result<()> {
        self.log(format!("insert_top:{}", records.len()));
        let mut rows = self.rows.lock().unwrap();
        rows.splice(0..0, records.iter().cloned());
        Ok(())
    }

    async fn patch_cells(&self, patches: &[CellPatch]) -> Result<()> {
        self.log(format!("patch_cells:{}", patches.len()));
        let mut rows = self.rows.lock().unwrap();
        for patch in patches {
            let index = patch.row.sheet_row() as usize - 2;
            if let Some(record) = rows.get_mut(index) {
                record.set(patch.field, &patch.value);
            }
        }
        Ok(())
    }
}

fn upcoming(codes: &[&str]) -> FakeEnumerator {
    FakeEnumerator {
        recent: Vec::new(),
        upcoming: codes.iter().map(|c| c.to_string()).collect(),
    }
}

fn complete(code: &str) -> IpoRecord {
    let mut record = IpoRecord::new(code);
    record.set(Field::Name, "이미완료");
    record.set(Field::SubscriptionDate, "2024.01.10~2024.01.11");
    record.set(Field::ListingDate, "2024.02.01");
    record.set(Field::CompetitionRatio, "512.3:1");
    record
}

#[tokio::test]
async fn new_upcoming_codes_become_placeholder_rows_at_the_top() {
    let config = Config::default();
    let sheet = FakeSheet::with_rows(vec![complete("A123"), complete("B456")]);
    let enumerator = upcoming(&["B456", "C789", "A123"]);
    let fetcher = FakeFetcher::default(); // C789 scrape fails, row stays a placeholder

    sync::run_incremental(&config, &enumerator, &fetcher, &sheet)
        .await
        .unwrap();

    assert_eq!(sheet.codes(), vec!["C789", "A123", "B456"]);
    assert_eq!(sheet.ops(), vec!["insert_top:1"]);

    let rows = sheet.rows();
    let projected = rows[0].project(&config.header);
    assert_eq!(projected[0], "C789");
    assert!(projected[1..].iter().all(|cell| cell == "N/A"));
}

#[tokio::test]
async fn incomplete_rows_are_patched_with_improved_cells_only() {
    let config = Config::default();
    let mut on_sheet = IpoRecord::new("A123");
    on_sheet.set(Field::SubscriptionDate, "2024.01.10~2024.01.11");
    let sheet = FakeSheet::with_rows(vec![on_sheet]);

    let mut detail = IpoRecord::new("A123");
    detail.set(Field::Name, "가온칩스");
    detail.set(Field::SubscriptionDate, "2024.01.10~2024.01.11"); // unchanged
    detail.set(Field::ListingDate, "2024.02.01");
    detail.set(Field::CompetitionRatio, "1053.5:1");
    let fetcher = FakeFetcher::default().knows(detail);

    sync::run_incremental(&config, &upcoming(&[]), &fetcher, &sheet)
        .await
        .unwrap();

    // name, listing date and ratio were new; the subscription date was not
    assert_eq!(sheet.ops(), vec!["patch_cells:3"]);
    let row = &sheet.rows()[0];
    assert!(row.is_complete());
    assert_eq!(row.get(Field::Name), Some("가온칩스"));
    assert_eq!(row.get(Field::SubscriptionDate), Some("2024.01.10~2024.01.11"));
}

#[tokio::test]
async fn a_failed_fetch_leaves_its_row_alone_and_patches_the_rest() {
    let config = Config::default();
    let mut stuck = IpoRecord::new("A123");
    stuck.set(Field::SubscriptionDate, "2024.01.08~2024.01.09");
    let sheet = FakeSheet::with_rows(vec![stuck.clone(), IpoRecord::new("B456")]);

    let mut detail = complete("B456");
    detail.set(Field::Name, "정상스크랩");
    let fetcher = FakeFetcher::default().knows(detail);

    sync::run_incremental(&config, &upcoming(&[]), &fetcher, &sheet)
        .await
        .unwrap();

    let rows = sheet.rows();
    assert_eq!(rows[0], stuck, "failed fetch must not touch the row");
    assert!(rows[1].is_complete());
}

#[tokio::test]
async fn duplicate_rows_for_the_same_code_are_both_patched() {
    let config = Config::default();
    let sheet = FakeSheet::with_rows(vec![IpoRecord::new("A123"), IpoRecord::new("A123")]);
    let fetcher = FakeFetcher::default().knows(complete("A123"));

    sync::run_incremental(&config, &upcoming(&[]), &fetcher, &sheet)
        .await
        .unwrap();

    let rows = sheet.rows();
    assert!(rows[0].is_complete());
    assert!(rows[1].is_complete());
}

#[tokio::test]
async fn nothing_happens_when_the_view_and_sheet_are_both_empty() {
    let config = Config::default();
    let sheet = FakeSheet::default();

    sync::run_incremental(&config, &upcoming(&[]), &FakeFetcher::default(), &sheet)
        .await
        .unwrap();

    assert!(sheet.ops().is_empty());
    assert!(sheet.rows().is_empty());
}

#[tokio::test]
async fn full_refresh_rewrites_the_sheet_in_reading_order() {
    let config = Config::default();
    let sheet = FakeSheet::with_rows(vec![complete("OLD999")]);

    let enumerator = FakeEnumerator {
        recent: vec!["Y11111".to_string()],
        upcoming: vec!["Z22222".to_string(), "X33333".to_string()],
    };

    let mut x = IpoRecord::new("X33333");
    x.set(Field::Name, "엑스");
    x.set(Field::SubscriptionDate, "2024.03.01~2024.03.02");
    let mut y = IpoRecord::new("Y11111");
    y.set(Field::Name, "와이");
    y.set(Field::ListingDate, "2024.01.15");
    let mut z = IpoRecord::new("Z22222");
    z.set(Field::Name, "제트");
    z.set(Field::SubscriptionDate, "2024.04.01~2024.04.02");

    let fetcher = FakeFetcher::default().knows(x).knows(y).knows(z);

    sync::run_full_refresh(&config, &enumerator, &fetcher, &sheet)
        .await
        .unwrap();

    // pending listings first, newest subscription on top, then listed
    assert_eq!(sheet.codes(), vec!["Z22222", "X33333", "Y11111"]);
    assert_eq!(sheet.ops(), vec!["replace_all:3"]);
}

#[tokio::test]
async fn full_refresh_with_nothing_enumerated_leaves_the_sheet_untouched() {
    let config = Config::default();
    let sheet = FakeSheet::with_rows(vec![complete("A123")]);

    sync::run_full_refresh(
        &config,
        &FakeEnumerator::default(),
        &FakeFetcher::default(),
        &sheet,
    )
    .await
    .unwrap();

    assert!(sheet.ops().is_empty());
    assert_eq!(sheet.codes(), vec!["A123"]);
}

#[tokio::test]
async fn full_refresh_with_only_failed_scrapes_leaves_the_sheet_untouched() {
    let config = Config::default();
    let sheet = FakeSheet::with_rows(vec![complete("A123")]);
    let enumerator = upcoming(&["C789"]);

    sync::run_full_refresh(&config, &enumerator, &FakeFetcher::default(), &sheet)
        .await
        .unwrap();

    assert!(sheet.ops().is_empty());
    assert_eq!(sheet.codes(), vec!["A123"]);
}
