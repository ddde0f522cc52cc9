//! Listing enumeration: the "recent" and "upcoming" views are endless
//! scrolls over a paged json api; walking the pages directly gets the
//! same codes without a browser.

use crate::{NaverClient, BASE_URL};
use anyhow::Result;
use async_trait::async_trait;
use gongmo_core::{ListingEnumerator, ListingKind};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, warn};

const PAGE_SIZE: usize = 100;
const MAX_PAGES: u32 = 50;

#[derive(Deserialize, Debug)]
struct IpoPage {
    #[serde(default)]
    ipos: Vec<IpoEntry>,
}

// `default` because withdrawn or pre-assignment entries can come back
// without a code; they fall through the code filter below
#[derive(Deserialize, Debug)]
struct IpoEntry {
    #[serde(rename = "stockCode", default)]
    stock_code: String,
}

fn view_url(kind: ListingKind, page: u32) -> String {
    match kind {
        ListingKind::Recent => {
            format!("{BASE_URL}/api/ipo/recent?page={page}&pageSize={PAGE_SIZE}")
        }
        ListingKind::Upcoming => format!(
            "{BASE_URL}/api/ipo?progressType=subscribing-upcoming&page={page}&pageSize={PAGE_SIZE}"
        ),
    }
}

/// A stock code is five or six digits, optionally behind an `A` market
/// prefix, e.g. `450080` or `A12345`.
fn is_stock_code(raw: &str) -> bool {
    let digits = raw.strip_prefix('A').unwrap_or(raw);
    (5..=6).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Codes accumulated while walking one view, page by page.
struct PageWalk {
    codes: Vec<String>,
    seen: HashSet<String>,
}

impl PageWalk {
    fn new() -> Self {
        Self {
            codes: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Fold one page in: entries that are not stock codes are skipped,
    /// repeats keep their first position. Returns `false` once the page
    /// came back short, meaning the view is drained.
    fn absorb(&mut self, page: IpoPage) -> bool {
        let fetched = page.ipos.len();
        for entry in page.ipos {
            if !is_stock_code(&entry.stock_code) {
                debug!("skipping non-code entry {:?}", entry.stock_code);
                continue;
            }
            if self.seen.insert(entry.stock_code.clone()) {
                self.codes.push(entry.stock_code);
            }
        }
        fetched == PAGE_SIZE
    }

    fn into_codes(self) -> Vec<String> {
        self.codes
    }
}

#[async_trait]
impl ListingEnumerator for NaverClient {
    async fn enumerate(&self, kind: ListingKind) -> Result<Vec<String>> {
        let mut walk = PageWalk::new();
        for page in 1..=MAX_PAGES {
            let url = view_url(kind, page);
            let body: IpoPage = self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            if !walk.absorb(body) {
                break;
            }
            if page == MAX_PAGES {
                warn!("{kind:?} view did not drain within {MAX_PAGES} pages");
            }
        }

        let codes = walk.into_codes();
        debug!("collected {} codes from the {kind:?} view", codes.len());
        Ok(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(codes: &[&str]) -> IpoPage {
        IpoPage {
            ipos: codes
                .iter()
                .map(|c| IpoEntry {
                    stock_code: c.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn stock_codes_allow_an_optional_market_prefix() {
        assert!(is_stock_code("450080"));
        assert!(is_stock_code("45008"));
        assert!(is_stock_code("A12345"));
        assert!(is_stock_code("A123456"));
    }

    #[test]
    fn anything_else_is_not_a_stock_code() {
        assert!(!is_stock_code(""));
        assert!(!is_stock_code("A"));
        assert!(!is_stock_code("1234"));
        assert!(!is_stock_code("1234567"));
        assert!(!is_stock_code("B12345"));
        assert!(!is_stock_code("45O080")); // letter O, not zero
    }

    #[test]
    fn pages_deserialize_with_unknown_fields_ignored() {
        let raw = r#"{
            "ipos": [
                {"stockCode": "450080", "stockName": "에코프로머티리얼즈", "ipoState": "LISTED"},
                {"stockCode": "A12345", "stockName": "테스트", "ipoState": "SUBSCRIBING"}
            ],
            "totalCount": 2
        }"#;
        let page: IpoPage = serde_json::from_str(raw).unwrap();
        let codes: Vec<&str> = page.ipos.iter().map(|e| e.stock_code.as_str()).collect();
        assert_eq!(codes, vec!["450080", "A12345"]);
    }

    #[test]
    fn an_empty_body_is_an_empty_page() {
        let page: IpoPage = serde_json::from_str("{}").unwrap();
        assert!(page.ipos.is_empty());
    }

    #[test]
    fn an_entry_without_a_code_does_not_poison_the_page() {
        let raw = r#"{
            "ipos": [
                {"stockCode": "450080", "stockName": "에코프로머티리얼즈"},
                {"stockName": "공모철회기업"},
                {"stockCode": "111110", "stockName": "다음회사"}
            ]
        }"#;
        let body: IpoPage = serde_json::from_str(raw).unwrap();
        let mut walk = PageWalk::new();
        walk.absorb(body);
        assert_eq!(walk.into_codes(), vec!["450080", "111110"]);
    }

    #[test]
    fn codes_keep_display_order_across_pages_without_repeats() {
        let mut walk = PageWalk::new();
        walk.absorb(page(&["450080", "조회불가", "111110"]));
        walk.absorb(page(&["111110", "222220"]));
        assert_eq!(walk.into_codes(), vec!["450080", "111110", "222220"]);
    }

    #[test]
    fn only_a_short_page_ends_the_walk() {
        let full: Vec<String> = (0..PAGE_SIZE).map(|i| format!("{:06}", 100_000 + i)).collect();
        let mut walk = PageWalk::new();
        assert!(walk.absorb(IpoPage {
            ipos: full
                .into_iter()
                .map(|stock_code| IpoEntry { stock_code })
                .collect(),
        }));
        assert!(!walk.absorb(page(&["450080"])));
        assert_eq!(walk.into_codes().len(), PAGE_SIZE + 1);
    }

    #[test]
    fn view_urls_carry_the_paging_parameters() {
        assert_eq!(
            view_url(ListingKind::Recent, 3),
            "https://m.stock.naver.com/api/ipo/recent?page=3&pageSize=100"
        );
        assert!(view_url(ListingKind::Upcoming, 1).contains("progressType=subscribing-upcoming"));
    }
}
