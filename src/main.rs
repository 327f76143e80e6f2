//! Portfolio positions report
//!
//! Loads the record store and prints, per portfolio, the aggregated
//! positions, the totals line, and any active signals. Read-only.
//!
//! The backend is picked with FOLIO_STORE: `local` (default) reads the
//! JSON file under the platform data dir, `remote` reads the document
//! configured through the FOLIO_REMOTE_* variables.

use anyhow::{bail, Result};

use folio_tracker::aggregation;
use folio_tracker::metrics;
use folio_tracker::store::{LocalStore, RecordStore, RemoteConfig, RemoteStore};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let store: Box<dyn RecordStore> = match std::env::var("FOLIO_STORE").as_deref() {
        Ok("remote") => Box::new(RemoteStore::new(RemoteConfig::from_env()?)?),
        Ok("local") | Err(_) => Box::new(LocalStore::default_location()?),
        Ok(other) => bail!("unknown FOLIO_STORE value '{}' (expected local or remote)", other),
    };

    let (portfolios, _token) = store.fetch().await?;

    if portfolios.is_empty() {
        println!("No portfolios found.");
        return Ok(());
    }

    for portfolio in &portfolios {
        println!("=== {} ({}) ===\n", portfolio.name, portfolio.base_currency);

        let positions = aggregation::aggregate(portfolio);

        println!(
            "{:<8} {:>12} {:>10} {:>10} {:>12} {:>12} {:>8} {:>10}  {}",
            "Ticker", "Qty", "Avg", "Last", "Mkt Value", "P/L", "P/L %", "Divs", "Signal"
        );
        for position in &positions {
            println!(
                "{:<8} {:>12.4} {:>10.2} {:>10.2} {:>12.2} {:>12.2} {:>7.2}% {:>10.2}  {}",
                position.ticker,
                position.qty,
                position.avg_price,
                position.last_price,
                position.mkt_value,
                position.pl,
                position.pl_pct,
                position.divs_total,
                position.signal.as_str()
            );
        }

        let totals = metrics::totals(&positions);
        println!(
            "\nInvested: {:.2}  Market: {:.2}  P/L: {:.2} ({:.2}%)  Dividends: {:.2}",
            totals.invested, totals.mkt_value, totals.pl, totals.pl_pct, totals.divs_total
        );

        let signals = metrics::active_signals(&positions);
        if !signals.is_empty() {
            println!("\nActive signals:");
            for position in &signals {
                println!("  {} -> {}", position.ticker, position.signal.as_str());
            }
        }
        println!();
    }

    Ok(())
}
