//! Detail-page scraping: one server-rendered page per listing, parsed
//! with css selectors keyed on class-name prefixes (the suffixes are
//! build hashes and change between deploys).

use crate::{NaverClient, BASE_URL};
use async_trait::async_trait;
use gongmo_core::{DetailFetcher, Field, IpoRecord};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use tracing::error;

#[async_trait]
impl DetailFetcher for NaverClient {
    async fn fetch_detail(&self, code: &str) -> IpoRecord {
        let mut record = IpoRecord::new(code);
        let url = format!("{BASE_URL}/ipo/{code}");
        match self.get_text(&url).await {
            Ok(html) => parse_detail_page(&html, &mut record),
            Err(e) => error!("[{code}] failed to fetch the detail page: {e}"),
        }
        record
    }
}

/// Pull every field the page offers into `record`. Sections that are
/// missing or unrecognisable are skipped; whatever was parsed before
/// the gap is kept.
pub fn parse_detail_page(html: &str, record: &mut IpoRecord) {
    let doc = Html::parse_document(html);

    // company name; two generations of the page markup are still around
    let name = first_text(&doc, "h2[class*='IpoInfo_title']")
        .or_else(|| first_text(&doc, "h2[class*='VStockPageTitle_name']"));
    if let Some(name) = name {
        record.set(Field::Name, &name);
    }

    // generic harvest: every th/td table row and dt/dd pair on the page
    let info = collect_page_info(&doc);
    set_from(record, Field::ListingDate, &info, "상장일");
    set_from(record, Field::LeadManager, &info, "증권사");
    if let Some(raw) = info.get("공모가") {
        record.set(Field::OfferingPrice, strip_won(raw));
    }
    if let Some(raw) = info.get("시초가") {
        record.set(Field::OpeningPrice, strip_won(raw));
    }
    set_from(record, Field::MarketSegment, &info, "시장구분");
    set_from(record, Field::Sector, &info, "업종");
    set_from(record, Field::MainProducts, &info, "주요제품");
    set_from(record, Field::PriceBand, &info, "희망공모가");
    set_from(record, Field::OfferingAmount, &info, "공모금액");
    set_from(record, Field::OfferingShares, &info, "공모주식수");
    set_from(record, Field::InstitutionalRatio, &info, "기관경쟁률");

    // the schedule card is fresher than the summary table and wins
    parse_schedule(&doc, record);
    parse_finance(&doc, record);
}

fn collect_page_info(doc: &Html) -> HashMap<String, String> {
    let tr_sel = Selector::parse("tr").unwrap();
    let th_sel = Selector::parse("th").unwrap();
    let td_sel = Selector::parse("td").unwrap();
    let dt_sel = Selector::parse("dt").unwrap();

    let mut info = HashMap::new();
    for tr in doc.select(&tr_sel) {
        if let (Some(th), Some(td)) = (tr.select(&th_sel).next(), tr.select(&td_sel).next()) {
            info.insert(text_of(th), text_of(td));
        }
    }
    for dt in doc.select(&dt_sel) {
        if let Some(dd) = next_sibling_element(dt, "dd") {
            info.insert(text_of(dt), text_of(dd));
        }
    }
    info
}

fn set_from(record: &mut IpoRecord, field: Field, info: &HashMap<String, String>, key: &str) {
    if let Some(value) = info.get(key) {
        record.set(field, value);
    }
}

fn parse_schedule(doc: &Html, record: &mut IpoRecord) {
    let article_sel = Selector::parse("div[class*='IpoDetailSchedule_article']").unwrap();
    let item_sel = Selector::parse("li[class*='IpoDetailSchedule_item']").unwrap();
    let text_sel = Selector::parse("span[class*='IpoDetailSchedule_text']").unwrap();
    let date_sel = Selector::parse("span[class*='IpoDetailSchedule_date']").unwrap();

    let Some(article) = doc.select(&article_sel).next() else {
        return;
    };
    for item in article.select(&item_sel) {
        let (Some(title), Some(date)) = (
            item.select(&text_sel).next(),
            item.select(&date_sel).next(),
        ) else {
            continue;
        };
        let field = match text_of(title).as_str() {
            "청약신청" => Field::SubscriptionDate,
            "환불" => Field::RefundDate,
            "상장" => Field::ListingDate,
            "청약결과" => Field::CompetitionRatio,
            _ => continue,
        };
        record.set(field, &text_of(date));
    }
}

fn parse_finance(doc: &Html, record: &mut IpoRecord) {
    let section_sel = Selector::parse("div[class*='VFinanceInfo_finance_info']").unwrap();
    let caption_sel = Selector::parse("th[scope='col']").unwrap();
    let row_sel = Selector::parse("tbody tr").unwrap();
    let th_sel = Selector::parse("th").unwrap();
    let td_sel = Selector::parse("td").unwrap();

    let Some(section) = doc.select(&section_sel).next() else {
        return;
    };

    // first column header is the metric label, the rest are fiscal years
    let years: Vec<Option<u16>> = section
        .select(&caption_sel)
        .skip(1)
        .map(|th| caption_year(&text_of(th)))
        .collect();

    for row in section.select(&row_sel) {
        let Some(title) = row.select(&th_sel).next() else {
            continue;
        };
        let title = text_of(title);
        let values: Vec<String> = row.select(&td_sel).map(text_of).collect();
        for (year, value) in years.iter().zip(values.iter()) {
            let Some(year) = year else { continue };
            if title.contains("매출액") {
                record.set(Field::Revenue(*year), value);
            }
            if title.contains("영업이익") {
                record.set(Field::OperatingProfit(*year), value);
            }
            if title.contains("당기순이익") {
                record.set(Field::NetIncome(*year), value);
            }
        }
    }
}

fn first_text(doc: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).unwrap();
    let text = text_of(doc.select(&selector).next()?);
    (!text.is_empty()).then_some(text)
}

fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn next_sibling_element<'a>(element: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    let mut node = element.next_sibling();
    while let Some(sibling) = node {
        if let Some(found) = ElementRef::wrap(sibling) {
            if found.value().name() == name {
                return Some(found);
            }
        }
        node = sibling.next_sibling();
    }
    None
}

/// Prices render as "15,000원 (확정)"; only the number is kept.
fn strip_won(raw: &str) -> &str {
    raw.split('원').next().unwrap_or(raw).trim()
}

/// Fiscal-year captions come as "2023", "2023.12" and similar; the first
/// four-digit run is the year.
fn caption_year(caption: &str) -> Option<u16> {
    let mut run = String::new();
    for c in caption.chars() {
        if c.is_ascii_digit() {
            run.push(c);
            if run.len() == 4 {
                return run.parse().ok();
            }
        } else {
            run.clear();
        }
    }
    None
}
