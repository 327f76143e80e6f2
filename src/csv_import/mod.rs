//! CSV transaction import.
//!
//! Accepts the export format of the companion spreadsheet: a header line
//! naming the columns `date,ticker,type,qty,price,fees` in any order,
//! followed by comma-separated rows. There is no quoting or escaping
//! support; fields containing commas are not representable. That is a
//! known limitation of the format, not something this parser works around.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{normalize_ticker, Transaction, TransactionKind};

/// Column indexes resolved from the header line by case-insensitive name.
#[derive(Debug, Default, Clone)]
struct ColumnMap {
    date: Option<usize>,
    ticker: Option<usize>,
    kind: Option<usize>,
    qty: Option<usize>,
    price: Option<usize>,
    fees: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &str) -> Self {
        let mut map = Self::default();
        for (index, name) in header.split(',').enumerate() {
            match name.trim().to_lowercase().as_str() {
                "date" => map.date = Some(index),
                "ticker" => map.ticker = Some(index),
                "type" => map.kind = Some(index),
                "qty" => map.qty = Some(index),
                "price" => map.price = Some(index),
                "fees" => map.fees = Some(index),
                _ => {}
            }
        }
        map
    }
}

/// Parse CSV text into transactions.
///
/// Rows with an empty ticker are skipped. A missing or unparsable date
/// falls back to the current date, numeric fields fall back to 0, and a
/// missing `fees` column means zero fees. `type` maps to SELL only on an
/// exact case-insensitive match; anything else is a BUY.
pub fn parse_transactions(text: &str) -> Vec<Transaction> {
    let mut lines = text.lines().skip_while(|line| line.trim().is_empty());

    let header = match lines.next() {
        Some(header) => header,
        None => return Vec::new(),
    };
    let columns = ColumnMap::from_header(header);

    let mut transactions = Vec::new();
    let mut skipped = 0_usize;

    for line in lines {
        let values: Vec<&str> = line.split(',').collect();

        let ticker = field(&values, columns.ticker);
        if ticker.is_empty() {
            skipped += 1;
            continue;
        }

        let date =
            parse_date(field(&values, columns.date)).unwrap_or_else(|| Utc::now().date_naive());
        let kind = if field(&values, columns.kind).eq_ignore_ascii_case("SELL") {
            TransactionKind::Sell
        } else {
            TransactionKind::Buy
        };

        transactions.push(Transaction {
            id: Uuid::new_v4().to_string(),
            date,
            ticker: normalize_ticker(ticker),
            kind,
            qty: parse_number(field(&values, columns.qty)),
            price: parse_number(field(&values, columns.price)),
            fees: parse_number(field(&values, columns.fees)),
        });
    }

    if skipped > 0 {
        log::info!("CSV import: skipped {} rows without a ticker", skipped);
    }

    transactions
}

/// Cell at `index`, trimmed; empty when the column or the cell is absent.
fn field<'a>(values: &[&'a str], index: Option<usize>) -> &'a str {
    index
        .and_then(|i| values.get(i))
        .map(|v| v.trim())
        .unwrap_or("")
}

/// Parse a date flexibly - handles the common export formats.
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d.%m.%Y"))
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .ok()
}

fn parse_number(s: &str) -> f64 {
    s.parse().unwrap_or(0.0)
}
