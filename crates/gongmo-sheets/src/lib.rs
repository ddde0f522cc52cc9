//! Google Sheets store adapter: the v4 rest api wired up as a
//! [`gongmo_core::SheetStore`], authenticated with a service account.

mod client;
mod model;

pub use client::{SheetsClient, SheetsConfig};
