use std::collections::BTreeMap;
use std::fmt;

/// Sentinel written to the sheet wherever a value is not known, e.g.,
///
/// ```text
/// 종목코드 | 종목명 | 청약일 | 상장일
/// A123    | N/A   | N/A    | N/A
/// ```
///
/// Internally an unknown value is simply absent; the sentinel only
/// materialises when a record is projected onto a header.
pub const UNKNOWN: &str = "N/A";

/// "To be decided" marker used by the source site for listing dates that
/// have not been announced yet. Unlike [`UNKNOWN`] it is a real scraped
/// value and survives a round trip through the sheet, but a row carrying
/// it still counts as incomplete.
pub const TBD: &str = "미정";

/// Finance columns carried by the default header, e.g. `매출액_2023`.
pub const DEFAULT_FINANCE_YEARS: [u16; 3] = [2023, 2024, 2025];

/// One column of the IPO sheet.
///
/// The Korean labels are the contract with the spreadsheet: they are what
/// `Display` renders into the header row, and what [`Field::from_label`]
/// parses back when reading an existing sheet. The finance fields carry
/// the fiscal year, so `Revenue(2024)` maps to the `매출액_2024` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Code,
    Name,
    SubscriptionDate,
    RefundDate,
    ListingDate,
    LeadManager,
    PriceBand,
    OfferingPrice,
    OpeningPrice,
    OfferingAmount,
    OfferingShares,
    MarketSegment,
    Sector,
    MainProducts,
    InstitutionalRatio,
    CompetitionRatio,
    Revenue(u16),
    OperatingProfit(u16),
    NetIncome(u16),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Code => f.write_str("종목코드"),
            Field::Name => f.write_str("종목명"),
            Field::SubscriptionDate => f.write_str("청약일"),
            Field::RefundDate => f.write_str("환불일"),
            Field::ListingDate => f.write_str("상장일"),
            Field::LeadManager => f.write_str("주관사"),
            Field::PriceBand => f.write_str("희망공모가"),
            Field::OfferingPrice => f.write_str("확정공모가"),
            Field::OpeningPrice => f.write_str("시초가"),
            Field::OfferingAmount => f.write_str("공모금액"),
            Field::OfferingShares => f.write_str("공모주식수"),
            Field::MarketSegment => f.write_str("시장구분"),
            Field::Sector => f.write_str("업종"),
            Field::MainProducts => f.write_str("주요제품"),
            Field::InstitutionalRatio => f.write_str("기관경쟁률"),
            Field::CompetitionRatio => f.write_str("청약경쟁률"),
            Field::Revenue(year) => write!(f, "매출액_{year}"),
            Field::OperatingProfit(year) => write!(f, "영업이익_{year}"),
            Field::NetIncome(year) => write!(f, "당기순이익_{year}"),
        }
    }
}

impl Field {
    /// Inverse of `Display`; returns `None` for labels that belong to no
    /// known column, e.g. a column a user added to the sheet by hand.
    pub fn from_label(label: &str) -> Option<Field> {
        let field = match label {
            "종목코드" => Field::Code,
            "종목명" => Field::Name,
            "청약일" => Field::SubscriptionDate,
            "환불일" => Field::RefundDate,
            "상장일" => Field::ListingDate,
            "주관사" => Field::LeadManager,
            "희망공모가" => Field::PriceBand,
            "확정공모가" => Field::OfferingPrice,
            "시초가" => Field::OpeningPrice,
            "공모금액" => Field::OfferingAmount,
            "공모주식수" => Field::OfferingShares,
            "시장구분" => Field::MarketSegment,
            "업종" => Field::Sector,
            "주요제품" => Field::MainProducts,
            "기관경쟁률" => Field::InstitutionalRatio,
            "청약경쟁률" => Field::CompetitionRatio,
            _ => {
                let (metric, year) = label.split_once('_')?;
                let year: u16 = year.parse().ok()?;
                match metric {
                    "매출액" => Field::Revenue(year),
                    "영업이익" => Field::OperatingProfit(year),
                    "당기순이익" => Field::NetIncome(year),
                    _ => return None,
                }
            }
        };
        Some(field)
    }
}

/// Ordered set of columns the sheet is projected onto.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    fields: Vec<Field>,
}

impl Header {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// The full column set: identity, schedule, pricing and market info,
    /// followed by one finance column per metric per year.
    pub fn with_finance_years(years: &[u16]) -> Self {
        let mut fields = vec![
            Field::Code,
            Field::Name,
            Field::SubscriptionDate,
            Field::RefundDate,
            Field::ListingDate,
            Field::LeadManager,
            Field::PriceBand,
            Field::OfferingPrice,
            Field::OpeningPrice,
            Field::OfferingAmount,
            Field::OfferingShares,
            Field::MarketSegment,
            Field::Sector,
            Field::MainProducts,
            Field::InstitutionalRatio,
            Field::CompetitionRatio,
        ];
        fields.extend(years.iter().map(|&y| Field::Revenue(y)));
        fields.extend(years.iter().map(|&y| Field::OperatingProfit(y)));
        fields.extend(years.iter().map(|&y| Field::NetIncome(y)));
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    /// Korean labels in column order; this is the literal header row.
    pub fn labels(&self) -> Vec<String> {
        self.fields.iter().map(Field::to_string).collect()
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::with_finance_years(&DEFAULT_FINANCE_YEARS)
    }
}

/// One IPO listing, keyed by stock code.
///
/// Only *known* values are held; [`IpoRecord::set`] silently discards
/// empty strings and the [`UNKNOWN`] sentinel, so a record read back from
/// a half-filled sheet row and a record scraped from a half-rendered page
/// look identical. Unknowns reappear as `N/A` when the record is
/// projected onto a header for writing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IpoRecord {
    values: BTreeMap<Field, String>,
}

impl IpoRecord {
    /// A record carrying nothing but its stock code; this is also the
    /// placeholder shape that new rows are written with.
    pub fn new(code: &str) -> Self {
        let mut record = Self::default();
        record.set(Field::Code, code);
        record
    }

    /// Record a value, trimming it and dropping it entirely when it is
    /// empty or the unknown sentinel. `미정` is a real value and is kept.
    pub fn set(&mut self, field: Field, value: &str) {
        let value = value.trim();
        if value.is_empty() || value == UNKNOWN {
            return;
        }
        self.values.insert(field, value.to_string());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Every known `(field, value)` pair, in column-enum order.
    pub fn known(&self) -> impl Iterator<Item = (Field, &str)> {
        self.values.iter().map(|(field, value)| (*field, value.as_str()))
    }

    /// A row is complete once the subscription date and the competition
    /// ratio are known and the listing date is known *and* decided;
    /// a `미정` listing date keeps the row on the refresh list.
    pub fn is_complete(&self) -> bool {
        self.get(Field::SubscriptionDate).is_some()
            && self.get(Field::ListingDate).is_some_and(|v| v != TBD)
            && self.get(Field::CompetitionRatio).is_some()
    }

    /// Cell values in header order, with unknowns rendered as the
    /// sentinel. Fields outside the header are dropped; this is the only
    /// place the sheet shape is decided.
    pub fn project(&self, header: &Header) -> Vec<String> {
        header
            .fields()
            .iter()
            .map(|field| match self.values.get(field) {
                Some(value) => value.clone(),
                None => UNKNOWN.to_string(),
            })
            .collect()
    }
}
