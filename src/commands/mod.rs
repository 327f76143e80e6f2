//! Mutation commands over the record store.
//!
//! Every mutation follows the same discipline: fetch the full collection
//! with its version token, apply the change in memory, and write the whole
//! collection back under that token. Requests are validated before the
//! store is touched. A version conflict from the backend is surfaced to
//! the caller unchanged; the remedy is reload-and-retry, never an
//! automatic merge.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    normalize_ticker, DividendEntry, DividendKind, HistoryPoint, Portfolio, PriceQuote,
    Transaction, TransactionKind, Trigger,
};
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("portfolio not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn validation(message: &str) -> CommandError {
    CommandError::Validation(message.to_string())
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub ticker: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub qty: f64,
    pub price: f64,
    #[serde(default)]
    pub fees: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDividend {
    pub date: NaiveDate,
    pub ticker: String,
    #[serde(rename = "type")]
    pub kind: DividendKind,
    pub value_per_share: f64,
    pub note: Option<String>,
}

/// Partial trigger update. Fields left `None` keep their stored values;
/// clearing a trigger entirely goes through `remove_trigger`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerUpdate {
    pub ticker: String,
    pub buy_price: Option<f64>,
    pub sell_price: Option<f64>,
    pub trailing_stop_pct: Option<f64>,
    pub note: Option<String>,
}

/// Overlay an update onto the stored trigger (or a fresh empty one),
/// keeping every field the update does not carry.
pub fn merge_trigger(existing: Option<&Trigger>, update: &TriggerUpdate) -> Trigger {
    let ticker = normalize_ticker(&update.ticker);
    let mut merged = existing
        .cloned()
        .unwrap_or_else(|| Trigger::empty(ticker.clone()));
    merged.ticker = ticker;

    if update.buy_price.is_some() {
        merged.buy_price = update.buy_price;
    }
    if update.sell_price.is_some() {
        merged.sell_price = update.sell_price;
    }
    if update.trailing_stop_pct.is_some() {
        merged.trailing_stop_pct = update.trailing_stop_pct;
    }
    if let Some(note) = &update.note {
        merged.note = Some(note.clone());
    }

    merged
}

// ============================================================================
// Commands
// ============================================================================

pub struct Commands<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> Commands<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Current collection, re-read from the store.
    pub async fn portfolios(&self) -> Result<Vec<Portfolio>, CommandError> {
        Ok(self.store.fetch().await?.0)
    }

    /// Fetch, apply one change to the addressed portfolio, write back.
    async fn update_portfolio<R>(
        &self,
        id: &str,
        apply: impl FnOnce(&mut Portfolio) -> Result<R, CommandError>,
    ) -> Result<R, CommandError> {
        let (mut portfolios, token) = self.store.fetch().await?;
        let portfolio = portfolios
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CommandError::NotFound(id.to_string()))?;

        let result = apply(portfolio)?;
        self.store.replace(&portfolios, token.as_ref()).await?;
        Ok(result)
    }

    pub async fn create_portfolio(
        &self,
        name: &str,
        base_currency: &str,
    ) -> Result<Portfolio, CommandError> {
        if name.trim().is_empty() {
            return Err(validation("portfolio name is required"));
        }
        if base_currency.trim().is_empty() {
            return Err(validation("base currency is required"));
        }

        let (mut portfolios, token) = self.store.fetch().await?;
        let portfolio = Portfolio::new(name.trim().to_string(), base_currency.trim().to_string());
        portfolios.push(portfolio.clone());
        self.store.replace(&portfolios, token.as_ref()).await?;

        log::info!("created portfolio '{}' ({})", portfolio.name, portfolio.id);
        Ok(portfolio)
    }

    pub async fn rename_portfolio(&self, id: &str, name: &str) -> Result<(), CommandError> {
        if name.trim().is_empty() {
            return Err(validation("portfolio name is required"));
        }
        let name = name.trim().to_string();
        self.update_portfolio(id, |portfolio| {
            portfolio.name = name;
            Ok(())
        })
        .await
    }

    pub async fn delete_portfolio(&self, id: &str) -> Result<(), CommandError> {
        let (mut portfolios, token) = self.store.fetch().await?;
        let before = portfolios.len();
        portfolios.retain(|p| p.id != id);
        if portfolios.len() == before {
            return Err(CommandError::NotFound(id.to_string()));
        }
        self.store.replace(&portfolios, token.as_ref()).await?;
        Ok(())
    }

    pub async fn add_transaction(
        &self,
        id: &str,
        request: NewTransaction,
    ) -> Result<Transaction, CommandError> {
        if request.ticker.trim().is_empty() {
            return Err(validation("ticker is required"));
        }
        if !(request.qty > 0.0) {
            return Err(validation("qty must be a positive number"));
        }
        if !(request.price > 0.0) {
            return Err(validation("price must be a positive number"));
        }
        if !(request.fees >= 0.0) {
            return Err(validation("fees must not be negative"));
        }

        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            date: request.date,
            ticker: normalize_ticker(&request.ticker),
            kind: request.kind,
            qty: request.qty,
            price: request.price,
            fees: request.fees,
        };

        self.update_portfolio(id, |portfolio| {
            portfolio.transactions.push(transaction.clone());
            Ok(transaction)
        })
        .await
    }

    /// Append every transaction parsed from CSV text. Rows are taken as the
    /// parser produced them (its own defaulting rules apply, not the
    /// single-entry validation). Returns how many were imported.
    pub async fn import_transactions(
        &self,
        id: &str,
        csv_text: &str,
    ) -> Result<usize, CommandError> {
        let parsed = crate::csv_import::parse_transactions(csv_text);
        if parsed.is_empty() {
            return Ok(0);
        }

        let count = parsed.len();
        self.update_portfolio(id, |portfolio| {
            portfolio.transactions.extend(parsed);
            Ok(())
        })
        .await?;

        log::info!("imported {} transactions into portfolio {}", count, id);
        Ok(count)
    }

    pub async fn delete_transaction(&self, id: &str, txn_id: &str) -> Result<(), CommandError> {
        self.update_portfolio(id, |portfolio| {
            portfolio.transactions.retain(|t| t.id != txn_id);
            Ok(())
        })
        .await
    }

    /// Upsert the manual quote for a ticker; latest write wins.
    pub async fn set_price(&self, id: &str, ticker: &str, price: f64) -> Result<(), CommandError> {
        if ticker.trim().is_empty() {
            return Err(validation("ticker is required"));
        }
        if !(price >= 0.0) {
            return Err(validation("price must not be negative"));
        }

        let ticker = normalize_ticker(ticker);
        self.update_portfolio(id, |portfolio| {
            let now = Utc::now();
            match portfolio.prices.iter().position(|q| q.ticker == ticker) {
                Some(index) => {
                    let quote = &mut portfolio.prices[index];
                    quote.price = price;
                    quote.updated_at = now;
                }
                None => portfolio.prices.push(PriceQuote {
                    ticker,
                    price,
                    updated_at: now,
                }),
            }
            Ok(())
        })
        .await
    }

    /// Merge a partial trigger update onto the ticker's stored trigger.
    pub async fn set_trigger(
        &self,
        id: &str,
        update: TriggerUpdate,
    ) -> Result<Trigger, CommandError> {
        if update.ticker.trim().is_empty() {
            return Err(validation("ticker is required"));
        }
        if let Some(pct) = update.trailing_stop_pct {
            if !(0.0..=100.0).contains(&pct) {
                return Err(validation("trailing stop must be between 0 and 100"));
            }
        }

        let ticker = normalize_ticker(&update.ticker);
        self.update_portfolio(id, |portfolio| {
            let merged = merge_trigger(
                portfolio.triggers.iter().find(|t| t.ticker == ticker),
                &update,
            );
            match portfolio.triggers.iter().position(|t| t.ticker == ticker) {
                Some(index) => portfolio.triggers[index] = merged.clone(),
                None => portfolio.triggers.push(merged.clone()),
            }
            Ok(merged)
        })
        .await
    }

    pub async fn remove_trigger(&self, id: &str, ticker: &str) -> Result<(), CommandError> {
        let ticker = normalize_ticker(ticker);
        self.update_portfolio(id, |portfolio| {
            portfolio.triggers.retain(|t| t.ticker != ticker);
            Ok(())
        })
        .await
    }

    pub async fn add_dividend(
        &self,
        id: &str,
        request: NewDividend,
    ) -> Result<DividendEntry, CommandError> {
        if request.ticker.trim().is_empty() {
            return Err(validation("ticker is required"));
        }
        if !(request.value_per_share > 0.0) {
            return Err(validation("value per share must be a positive number"));
        }

        let entry = DividendEntry {
            id: Uuid::new_v4().to_string(),
            date: request.date,
            ticker: normalize_ticker(&request.ticker),
            kind: request.kind,
            value_per_share: request.value_per_share,
            note: request.note,
        };

        self.update_portfolio(id, |portfolio| {
            portfolio.dividends.push(entry.clone());
            Ok(entry)
        })
        .await
    }

    pub async fn delete_dividend(&self, id: &str, dividend_id: &str) -> Result<(), CommandError> {
        self.update_portfolio(id, |portfolio| {
            portfolio.dividends.retain(|d| d.id != dividend_id);
            Ok(())
        })
        .await
    }

    /// Record a total-value snapshot; one point per date, kept in date order.
    pub async fn add_history_point(
        &self,
        id: &str,
        date: NaiveDate,
        total_value: f64,
    ) -> Result<(), CommandError> {
        self.update_portfolio(id, |portfolio| {
            match portfolio.history.iter().position(|h| h.date == date) {
                Some(index) => portfolio.history[index].total_value = total_value,
                None => {
                    portfolio.history.push(HistoryPoint { date, total_value });
                    portfolio.history.sort_by_key(|h| h.date);
                }
            }
            Ok(())
        })
        .await
    }
}

// ============================================================================
// Export / Import
// ============================================================================

/// Serialize the full collection as indented JSON, the download format.
pub fn export_json(portfolios: &[Portfolio]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(portfolios)
}

/// Restore a collection from a previously exported document.
pub fn import_json(text: &str) -> serde_json::Result<Vec<Portfolio>> {
    serde_json::from_str(text)
}
