//! Position aggregation engine
//!
//! Folds a portfolio document into per-ticker positions using the
//! weighted-average cost method:
//! - BUY: adds shares; `qty * price + fees` joins the cost basis
//! - SELL: removes shares at the running average price; sell fees stay in
//!   the residual cost basis
//! - dividends: entitlement is the share count held on the payment date
//!   times the declared value per share
//!
//! Transactions are folded in stored order, never re-sorted by date.
//! Selling more than the held quantity drives quantity and cost negative,
//! and the result is reported as-is rather than clamped.
//!
//! The engine is pure: no I/O, no validation, no cached state. Every read
//! recomputes the full output from the current document.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Portfolio, Transaction, TransactionKind, Trigger};

/// Trading signal derived from a position's trigger rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
    Stop,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
            Self::Stop => "STOP",
        }
    }
}

/// Derived per-ticker snapshot. Never persisted; recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub ticker: String,
    pub qty: f64,
    /// Cost basis. Can go negative after an over-sell.
    pub invested: f64,
    pub avg_price: f64,
    /// Latest manual quote, 0 when the ticker has none.
    pub last_price: f64,
    pub mkt_value: f64,
    pub pl: f64,
    pub pl_pct: f64,
    pub divs_total: f64,
    pub div_yield_on_cost: f64,
    pub signal: Signal,
    pub trigger: Option<Trigger>,
}

/// Aggregate a portfolio document into one position per ticker, sorted
/// ascending by ticker.
///
/// Every ticker appearing in transactions, quotes, or triggers gets exactly
/// one position; tickers with a quote or trigger but no transactions come
/// out with zero quantity and cost.
pub fn aggregate(portfolio: &Portfolio) -> Vec<Position> {
    let mut txns_by_ticker: HashMap<&str, Vec<&Transaction>> = HashMap::new();
    for txn in &portfolio.transactions {
        txns_by_ticker
            .entry(txn.ticker.as_str())
            .or_default()
            .push(txn);
    }

    // Latest write wins if a document carries duplicate quotes for a ticker.
    let mut quotes: HashMap<&str, f64> = HashMap::new();
    for quote in &portfolio.prices {
        quotes.insert(quote.ticker.as_str(), quote.price);
    }

    let mut triggers: HashMap<&str, &Trigger> = HashMap::new();
    for trigger in &portfolio.triggers {
        triggers.insert(trigger.ticker.as_str(), trigger);
    }

    let tickers: BTreeSet<&str> = portfolio
        .transactions
        .iter()
        .map(|t| t.ticker.as_str())
        .chain(portfolio.prices.iter().map(|q| q.ticker.as_str()))
        .chain(portfolio.triggers.iter().map(|t| t.ticker.as_str()))
        .collect();

    let mut positions = Vec::with_capacity(tickers.len());

    for ticker in tickers {
        let last_price = quotes.get(ticker).copied().unwrap_or(0.0);
        let trigger = triggers.get(ticker).copied();

        let (qty, cost) = match txns_by_ticker.get(ticker) {
            Some(txns) => fold_cost_basis(ticker, txns),
            None => (0.0, 0.0),
        };

        // The max(1) guards only this division; a negative quantity still
        // flows through market value and P/L untouched.
        let avg_price = if qty > 0.0 { cost / qty.max(1.0) } else { 0.0 };
        let mkt_value = qty * last_price;
        let pl = mkt_value - cost;
        let pl_pct = if cost > 0.0 { pl / cost * 100.0 } else { 0.0 };

        let divs_total: f64 = portfolio
            .dividends
            .iter()
            .filter(|d| d.ticker == ticker)
            .map(|d| share_count_at_date(&portfolio.transactions, ticker, d.date) * d.value_per_share)
            .sum();
        let div_yield_on_cost = if cost > 0.0 { divs_total / cost } else { 0.0 };

        // With no cost basis pl_pct is fixed at zero, so quote/trigger-only
        // tickers can only fire the buy/sell comparisons, never the stop.
        let signal = derive_signal(trigger, last_price, pl_pct);

        positions.push(Position {
            ticker: ticker.to_string(),
            qty,
            invested: cost,
            avg_price,
            last_price,
            mkt_value,
            pl,
            pl_pct,
            divs_total,
            div_yield_on_cost,
            signal,
            trigger: trigger.cloned(),
        });
    }

    positions
}

/// Fold one ticker's transactions, in stored order, into running quantity
/// and cost basis.
fn fold_cost_basis(ticker: &str, txns: &[&Transaction]) -> (f64, f64) {
    let mut qty = 0.0_f64;
    let mut cost = 0.0_f64;

    for txn in txns {
        match txn.kind {
            TransactionKind::Buy => {
                qty += txn.qty;
                cost += txn.qty * txn.price + txn.fees;
            }
            TransactionKind::Sell => {
                if txn.qty > qty {
                    log::warn!(
                        "sell of {} {} exceeds held quantity {}; carrying negative position",
                        txn.qty,
                        ticker,
                        qty
                    );
                }
                let avg = if qty > 0.0 { cost / qty } else { 0.0 };
                qty -= txn.qty;
                cost -= avg * txn.qty;
                cost += txn.fees;
            }
        }
    }

    (qty, cost)
}

/// Share count held on `date`: signed sum (+BUY, -SELL) of the ticker's
/// transactions dated on-or-before it, clamped to zero.
///
/// Shared by the aggregation fold and the dividend ledger view so both
/// report the same entitlement. Comparison is date-granular; entries dated
/// exactly on the payment date count.
pub fn share_count_at_date(transactions: &[Transaction], ticker: &str, date: NaiveDate) -> f64 {
    let mut count = 0.0_f64;
    for txn in transactions
        .iter()
        .filter(|t| t.ticker == ticker && t.date <= date)
    {
        match txn.kind {
            TransactionKind::Buy => count += txn.qty,
            TransactionKind::Sell => count -= txn.qty,
        }
    }
    count.max(0.0)
}

/// Later checks take precedence: SELL overrides BUY, STOP overrides both.
/// Price comparisons only fire against a real quote (`last_price > 0`).
fn derive_signal(trigger: Option<&Trigger>, last_price: f64, pl_pct: f64) -> Signal {
    let Some(trigger) = trigger else {
        return Signal::Hold;
    };

    let mut signal = Signal::Hold;

    if let Some(buy_at) = trigger.buy_price {
        if last_price > 0.0 && last_price <= buy_at {
            signal = Signal::Buy;
        }
    }
    if let Some(sell_at) = trigger.sell_price {
        if last_price > 0.0 && last_price >= sell_at {
            signal = Signal::Sell;
        }
    }
    if let Some(stop_pct) = trigger.trailing_stop_pct {
        if stop_pct > 0.0 && last_price > 0.0 && pl_pct <= -stop_pct {
            signal = Signal::Stop;
        }
    }

    signal
}
