use crate::model::{BatchUpdateReply, BatchValuesUpdate, SpreadsheetMeta, ValueRange};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use gongmo_core::{CellPatch, Field, Header, IpoRecord, RowId, SheetStore};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

// grid size for a worksheet created from scratch
const NEW_SHEET_ROWS: u32 = 1000;
const NEW_SHEET_COLS: u32 = 30;

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    /// Path to the service-account key file.
    pub credentials_path: String,
    /// The spreadsheet id from the document url.
    pub spreadsheet_id: String,
    /// Worksheet (tab) title; created on first use if absent.
    pub worksheet: String,
}

impl SheetsConfig {
    /// Read the store settings from the environment:
    ///
    /// ```text
    /// GONGMO_CREDENTIALS     (required, key file path)
    /// GONGMO_SPREADSHEET_ID  (required)
    /// GONGMO_WORKSHEET       (default "IPO")
    /// ```
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            credentials_path: std::env::var("GONGMO_CREDENTIALS")
                .context("GONGMO_CREDENTIALS is not set (path to a service-account key file)")?,
            spreadsheet_id: std::env::var("GONGMO_SPREADSHEET_ID")
                .context("GONGMO_SPREADSHEET_ID is not set")?,
            worksheet: std::env::var("GONGMO_WORKSHEET").unwrap_or_else(|_| "IPO".to_string()),
        })
    }
}

/// Google Sheets store: speaks the v4 rest api directly, authenticated
/// with a service account. Implements [`SheetStore`].
pub struct SheetsClient {
    http: reqwest::Client,
    token_provider: Arc<dyn TokenProvider>,
    spreadsheet_id: String,
    worksheet: String,
    sheet_id: Mutex<Option<i64>>,
}

impl SheetsClient {
    /// Load the service-account key and build the client. A missing or
    /// unreadable key file fails here, before any flow starts.
    pub fn connect(config: SheetsConfig) -> Result<Self> {
        let account = CustomServiceAccount::from_file(&config.credentials_path)
            .with_context(|| {
                format!(
                    "could not load the service-account key at {}",
                    config.credentials_path
                )
            })?;
        let http = reqwest::ClientBuilder::new().build()?;
        Ok(Self {
            http,
            token_provider: Arc::new(account),
            spreadsheet_id: config.spreadsheet_id,
            worksheet: config.worksheet,
            sheet_id: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let token = self
            .token_provider
            .token(SCOPES)
            .await
            .context("could not obtain a google access token")?;
        Ok(token.as_str().to_string())
    }

    /// A1 range scoped to the worksheet, e.g. `'IPO'!A2:T5`.
    fn range(&self, a1: &str) -> String {
        format!("{}!{}", quote_title(&self.worksheet), a1)
    }

    /// The whole worksheet as a range: just the quoted title.
    fn whole_sheet(&self) -> String {
        quote_title(&self.worksheet)
    }

    // ------------------------------------------------------ rest calls

    async fn api_get(&self, url: &str) -> Result<Value> {
        let token = self.access_token().await?;
        let response = self.http.get(url).bearer_auth(&token).send().await?;
        read_response(response).await
    }

    async fn api_post(&self, url: &str, body: &Value) -> Result<Value> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;
        read_response(response).await
    }

    async fn api_put(&self, url: &str, body: &Value) -> Result<Value> {
        let token = self.access_token().await?;
        let response = self
            .http
            .put(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;
        read_response(response).await
    }

    // ----------------------------------------------------- sheet setup

    /// Numeric id of the worksheet, creating the worksheet when the
    /// spreadsheet does not have it yet. Cached after the first call.
    async fn sheet_id(&self) -> Result<i64> {
        let mut cached = self.sheet_id.lock().await;
        if let Some(id) = *cached {
            return Ok(id);
        }

        let url = format!(
            "{API_BASE}/{}?fields=sheets.properties",
            self.spreadsheet_id
        );
        let meta: SpreadsheetMeta = serde_json::from_value(self.api_get(&url).await?)?;
        if let Some(sheet) = meta
            .sheets
            .iter()
            .find(|sheet| sheet.properties.title == self.worksheet)
        {
            let id = sheet.properties.sheet_id;
            *cached = Some(id);
            return Ok(id);
        }

        debug!("worksheet {:?} not found; creating it", self.worksheet);
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": self.worksheet,
                        "gridProperties": {
                            "rowCount": NEW_SHEET_ROWS,
                            "columnCount": NEW_SHEET_COLS,
                        },
                    },
                },
            }],
        });
        let url = format!("{API_BASE}/{}:batchUpdate", self.spreadsheet_id);
        let reply: BatchUpdateReply = serde_json::from_value(self.api_post(&url, &body).await?)?;
        let id = reply
            .replies
            .first()
            .and_then(|reply| reply.add_sheet.as_ref())
            .map(|sheet| sheet.properties.sheet_id)
            .ok_or_else(|| anyhow!("addSheet reply carried no sheet id"))?;
        *cached = Some(id);
        Ok(id)
    }

    // ---------------------------------------------------- value traffic

    async fn values_read(&self, range: &str) -> Result<Vec<Vec<Value>>> {
        let url = format!("{API_BASE}/{}/values/{range}", self.spreadsheet_id);
        let body: ValueRange = serde_json::from_value(self.api_get(&url).await?)?;
        Ok(body.values)
    }

    /// Write rows anchored at `range`. `RAW` input keeps every cell the
    /// literal string it was given; codes like `005930` must round-trip.
    async fn values_write(&self, range: &str, rows: Vec<Vec<String>>) -> Result<()> {
        let url = format!(
            "{API_BASE}/{}/values/{range}?valueInputOption=RAW",
            self.spreadsheet_id
        );
        let body = serde_json::to_value(ValueRange::rows(rows))?;
        self.api_put(&url, &body).await?;
        Ok(())
    }

    async fn values_clear(&self) -> Result<()> {
        let url = format!(
            "{API_BASE}/{}/values/{}:clear",
            self.spreadsheet_id,
            self.whole_sheet()
        );
        self.api_post(&url, &json!({})).await?;
        Ok(())
    }

    /// Labels in row 1, trimmed, as the sheet currently has them.
    async fn header_labels(&self) -> Result<Vec<String>> {
        let rows = self.values_read(&self.range("1:1")).await?;
        Ok(rows
            .into_iter()
            .next()
            .unwrap_or_default()
            .iter()
            .map(cell_text)
            .collect())
    }
}

#[async_trait]
impl SheetStore for SheetsClient {
    async fn replace_all(&self, header: &Header, records: &[IpoRecord]) -> Result<()> {
        self.sheet_id().await?;
        self.values_clear().await?;

        let mut rows = Vec::with_capacity(records.len() + 1);
        rows.push(header.labels());
        rows.extend(records.iter().map(|record| record.project(header)));
        self.values_write(&self.range("A1"), rows).await?;
        debug!("rewrote the sheet with {} data rows", records.len());
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<(RowId, IpoRecord)>> {
        self.sheet_id().await?;
        let grid = self.values_read(&self.whole_sheet()).await?;
        Ok(grid_to_records(grid))
    }

    async fn insert_top(&self, header: &Header, records: &[IpoRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let sheet_id = self.sheet_id().await?;

        // a brand-new worksheet has no header row; write it first so the
        // inserted rows land under it
        if self.header_labels().await?.iter().all(String::is_empty) {
            self.values_write(&self.range("A1"), vec![header.labels()])
                .await?;
        }

        let body = json!({
            "requests": [{
                "insertDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": 1,
                        "endIndex": 1 + records.len(),
                    },
                    "inheritFromBefore": false,
                },
            }],
        });
        let url = format!("{API_BASE}/{}:batchUpdate", self.spreadsheet_id);
        self.api_post(&url, &body).await?;

        let rows: Vec<Vec<String>> = records.iter().map(|record| record.project(header)).collect();
        let span = format!(
            "A2:{}{}",
            column_letter(header.len().saturating_sub(1)),
            1 + records.len()
        );
        self.values_write(&self.range(&span), rows).await?;
        debug!("inserted {} rows below the header", records.len());
        Ok(())
    }

    async fn patch_cells(&self, patches: &[CellPatch]) -> Result<()> {
        if patches.is_empty() {
            return Ok(());
        }
        self.sheet_id().await?;

        // columns are resolved against the sheet's own header row, so a
        // reordered sheet still gets its cells in the right place
        let labels = self.header_labels().await?;
        let mut data = Vec::with_capacity(patches.len());
        for patch in patches {
            let label = patch.field.to_string();
            let Some(column) = labels.iter().position(|l| *l == label) else {
                debug!("sheet has no {label:?} column; dropping that patch");
                continue;
            };
            data.push(ValueRange {
                range: Some(self.range(&format!(
                    "{}{}",
                    column_letter(column),
                    patch.row.sheet_row()
                ))),
                major_dimension: None,
                values: vec![vec![Value::String(patch.value.clone())]],
            });
        }
        if data.is_empty() {
            return Ok(());
        }

        let count = data.len();
        let body = serde_json::to_value(BatchValuesUpdate {
            value_input_option: "RAW",
            data,
        })?;
        let url = format!("{API_BASE}/{}/values:batchUpdate", self.spreadsheet_id);
        self.api_post(&url, &body).await?;
        debug!("patched {count} cells");
        Ok(())
    }
}

/// Check the status and decode the body, folding the api's error text
/// into the report when the call failed.
async fn read_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if status.is_success() {
        Ok(response.json().await?)
    } else {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(anyhow!("sheets api returned {status}: {error_body}"))
    }
}

/// Decode a raw value grid into records: row 1 is the header, every row
/// below becomes a record addressed by its sheet row.
///
/// Two columns decoding to the same field would make the rows ambiguous;
/// that sheet is reported empty so the caller rebuilds it instead of
/// patching blind.
pub(crate) fn grid_to_records(grid: Vec<Vec<Value>>) -> Vec<(RowId, IpoRecord)> {
    let mut rows = grid.into_iter();
    let Some(label_row) = rows.next() else {
        return Vec::new();
    };
    let columns: Vec<Option<Field>> = label_row
        .iter()
        .map(|cell| Field::from_label(&cell_text(cell)))
        .collect();

    let mut seen = HashSet::new();
    if columns.iter().flatten().any(|field| !seen.insert(*field)) {
        warn!("duplicate header labels; treating the sheet as uninitialised");
        return Vec::new();
    }

    rows.enumerate()
        .map(|(i, cells)| {
            let mut record = IpoRecord::default();
            for (field, cell) in columns.iter().zip(cells.iter()) {
                if let Some(field) = field {
                    record.set(*field, &cell_text(cell));
                }
            }
            (RowId::from_sheet_row(i as u32 + 2), record)
        })
        .collect()
}

/// Cells can come back as strings, numbers or bools depending on what a
/// hand edit left behind; everything is flattened to trimmed text.
fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Worksheet titles are always single-quoted in ranges so spaces,
/// Korean titles and embedded quotes survive the trip.
fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// 0-based column index to A1 letters: 0 -> A, 25 -> Z, 26 -> AA.
pub(crate) fn column_letter(index: usize) -> String {
    let mut n = index as i64;
    let mut letters = String::new();
    while n >= 0 {
        letters.insert(0, (b'A' + (n % 26) as u8) as char);
        n = n / 26 - 1;
    }
    letters
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn worksheet_titles_are_quoted_in_ranges() {
        assert_eq!(quote_title("IPO"), "'IPO'");
        assert_eq!(quote_title("공모주 2024"), "'공모주 2024'");
        assert_eq!(quote_title("it's"), "'it''s'");
    }

    #[test]
    fn column_letters_cover_the_two_letter_range() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(3), "D");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(51), "AZ");
        assert_eq!(column_letter(52), "BA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn grid_decoding_mints_row_handles_below_the_header() {
        let grid = vec![
            vec![json!("종목코드"), json!("종목명"), json!("상장일")],
            vec![json!("A12345"), json!("가온칩스"), json!("2024.02.01")],
            vec![json!("B67890"), json!("바이오"), json!("N/A")],
        ];
        let rows = grid_to_records(grid);
        assert_eq!(rows.len(), 2);

        let (row, record) = &rows[0];
        assert_eq!(row.sheet_row(), 2);
        assert_eq!(record.get(Field::Code), Some("A12345"));
        assert_eq!(record.get(Field::ListingDate), Some("2024.02.01"));

        let (row, record) = &rows[1];
        assert_eq!(row.sheet_row(), 3);
        // the sentinel reads back as an absent field
        assert_eq!(record.get(Field::ListingDate), None);
    }

    #[test]
    fn unknown_columns_are_ignored_but_keep_their_position() {
        let grid = vec![
            vec![json!("종목코드"), json!("메모"), json!("종목명")],
            vec![json!("A12345"), json!("수동 메모"), json!("가온칩스")],
        ];
        let rows = grid_to_records(grid);
        let (_, record) = &rows[0];
        assert_eq!(record.get(Field::Name), Some("가온칩스"));
    }

    #[test]
    fn duplicate_known_labels_mean_the_sheet_needs_a_rebuild() {
        let grid = vec![
            vec![json!("종목코드"), json!("종목명"), json!("종목명")],
            vec![json!("A12345"), json!("하나"), json!("둘")],
        ];
        assert!(grid_to_records(grid).is_empty());
    }

    #[test]
    fn numeric_cells_read_back_as_text() {
        let grid = vec![
            vec![json!("종목코드"), json!("확정공모가")],
            vec![json!(12345), json!(15000)],
        ];
        let rows = grid_to_records(grid);
        let (_, record) = &rows[0];
        assert_eq!(record.get(Field::Code), Some("12345"));
        assert_eq!(record.get(Field::OfferingPrice), Some("15000"));
    }

    #[test]
    fn short_rows_leave_trailing_fields_unknown() {
        let grid = vec![
            vec![json!("종목코드"), json!("종목명"), json!("상장일")],
            vec![json!("A12345")],
            vec![],
        ];
        let rows = grid_to_records(grid);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1.get(Field::Name), None);
        assert_eq!(rows[1].1.get(Field::Code), None);
        // the empty row still occupies its sheet position
        assert_eq!(rows[1].0.sheet_row(), 3);
    }

    #[test]
    fn an_empty_grid_has_no_rows() {
        assert!(grid_to_records(Vec::new()).is_empty());
    }
}
