use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Normalize a ticker symbol for storage: trimmed and upper-cased.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub id: String,
    pub name: String,
    pub base_currency: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub prices: Vec<PriceQuote>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub dividends: Vec<DividendEntry>,
    #[serde(default)]
    pub history: Vec<HistoryPoint>,
}

impl Portfolio {
    pub fn new(name: String, base_currency: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            base_currency,
            transactions: Vec::new(),
            prices: Vec::new(),
            triggers: Vec::new(),
            dividends: Vec::new(),
            history: Vec::new(),
        }
    }
}

/// A buy or sell of a single ticker. Immutable once recorded; removed by id.
///
/// Transactions are appended in entry order. Aggregation folds each ticker's
/// list in that stored order, not re-sorted by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub ticker: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub qty: f64,
    pub price: f64,
    #[serde(default)]
    pub fees: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Buy,
    Sell,
}

/// Manually entered quote. At most one per ticker; latest write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub ticker: String,
    pub price: f64,
    pub updated_at: DateTime<Utc>,
}

/// Price-trigger rule for a ticker. At most one per ticker; partial updates
/// merge onto the existing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub ticker: String,
    pub buy_price: Option<f64>,
    pub sell_price: Option<f64>,
    /// Percentage 0-100; a position losing more than this fires a stop.
    pub trailing_stop_pct: Option<f64>,
    pub note: Option<String>,
}

impl Trigger {
    pub fn empty(ticker: String) -> Self {
        Self {
            ticker,
            buy_price: None,
            sell_price: None,
            trailing_stop_pct: None,
            note: None,
        }
    }
}

/// A dividend payment record. Immutable once recorded; removed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DividendEntry {
    pub id: String,
    pub date: NaiveDate,
    pub ticker: String,
    #[serde(rename = "type")]
    pub kind: DividendKind,
    pub value_per_share: f64,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DividendKind {
    On,
    Pn,
    Unit,
    Bdr,
    Etf,
    Other,
}

/// A recorded snapshot of total portfolio value on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub total_value: f64,
}
