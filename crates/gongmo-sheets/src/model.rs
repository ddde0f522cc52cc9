//! Wire types for the slice of the Sheets v4 api the store uses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request and response body of the `values` endpoints. Cells arrive as
/// whatever json type the api felt like; the client flattens them to
/// strings on read.
#[derive(Serialize, Deserialize, Debug, Default)]
pub(crate) struct ValueRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(rename = "majorDimension", skip_serializing_if = "Option::is_none")]
    pub major_dimension: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl ValueRange {
    pub fn rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            range: None,
            major_dimension: Some("ROWS".to_string()),
            values: rows
                .into_iter()
                .map(|row| row.into_iter().map(Value::String).collect())
                .collect(),
        }
    }
}

/// Body of `values:batchUpdate`: sparse single-cell writes.
#[derive(Serialize, Debug)]
pub(crate) struct BatchValuesUpdate {
    #[serde(rename = "valueInputOption")]
    pub value_input_option: &'static str,
    pub data: Vec<ValueRange>,
}

/// `spreadsheets.get` pruned down to `fields=sheets.properties`.
#[derive(Deserialize, Debug)]
pub(crate) struct SpreadsheetMeta {
    #[serde(default)]
    pub sheets: Vec<SheetMeta>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct SheetMeta {
    pub properties: SheetProperties,
}

#[derive(Deserialize, Debug)]
pub(crate) struct SheetProperties {
    #[serde(rename = "sheetId")]
    pub sheet_id: i64,
    pub title: String,
}

/// Reply to a `spreadsheets:batchUpdate`; only the `addSheet` reply is
/// ever inspected.
#[derive(Deserialize, Debug)]
pub(crate) struct BatchUpdateReply {
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct Reply {
    #[serde(rename = "addSheet")]
    pub add_sheet: Option<SheetMeta>,
}
