//! Portfolio-level rollups over aggregated positions: totals, the
//! allocation series for charting, and the list of active signals.

use serde::{Deserialize, Serialize};

use crate::aggregation::{Position, Signal};

/// Whole-portfolio totals across all positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioTotals {
    pub invested: f64,
    pub mkt_value: f64,
    pub pl: f64,
    pub pl_pct: f64,
    pub divs_total: f64,
}

/// One slice of the allocation chart: a held ticker and its market value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSlice {
    pub name: String,
    pub value: f64,
}

pub fn totals(positions: &[Position]) -> PortfolioTotals {
    let invested: f64 = positions.iter().map(|p| p.invested).sum();
    let mkt_value: f64 = positions.iter().map(|p| p.mkt_value).sum();
    let pl = mkt_value - invested;
    let pl_pct = if invested > 0.0 {
        pl / invested * 100.0
    } else {
        0.0
    };
    let divs_total: f64 = positions.iter().map(|p| p.divs_total).sum();

    PortfolioTotals {
        invested,
        mkt_value,
        pl,
        pl_pct,
        divs_total,
    }
}

/// Allocation series for the held part of the portfolio: positions with
/// positive quantity and market value, values rounded to cents.
pub fn allocation(positions: &[Position]) -> Vec<AllocationSlice> {
    positions
        .iter()
        .filter(|p| p.qty > 0.0 && p.mkt_value > 0.0)
        .map(|p| AllocationSlice {
            name: p.ticker.clone(),
            value: (p.mkt_value * 100.0).round() / 100.0,
        })
        .collect()
}

/// Positions whose trigger currently fires, i.e. anything not HOLD.
pub fn active_signals(positions: &[Position]) -> Vec<Position> {
    positions
        .iter()
        .filter(|p| p.signal != Signal::Hold)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn pos(ticker: &str, qty: f64, invested: f64, mkt_value: f64, signal: Signal) -> Position {
        Position {
            ticker: ticker.to_string(),
            qty,
            invested,
            avg_price: if qty > 0.0 { invested / qty } else { 0.0 },
            last_price: if qty > 0.0 { mkt_value / qty } else { 0.0 },
            mkt_value,
            pl: mkt_value - invested,
            pl_pct: if invested > 0.0 {
                (mkt_value - invested) / invested * 100.0
            } else {
                0.0
            },
            divs_total: 0.0,
            div_yield_on_cost: 0.0,
            signal,
            trigger: None,
        }
    }

    #[test]
    fn totals_sum_across_positions() {
        let positions = vec![
            pos("PETR4", 100.0, 1000.0, 1100.0, Signal::Hold),
            pos("VALE3", 50.0, 3000.0, 2700.0, Signal::Hold),
        ];

        let t = totals(&positions);
        assert!((t.invested - 4000.0).abs() < EPS);
        assert!((t.mkt_value - 3800.0).abs() < EPS);
        assert!((t.pl + 200.0).abs() < EPS);
        assert!((t.pl_pct + 5.0).abs() < EPS);
    }

    #[test]
    fn totals_guard_percentage_when_nothing_invested() {
        let t = totals(&[]);
        assert_eq!(t.pl_pct, 0.0);
        assert_eq!(t.invested, 0.0);
    }

    #[test]
    fn allocation_keeps_only_held_positions_and_rounds() {
        let positions = vec![
            pos("PETR4", 100.0, 1000.0, 1234.567, Signal::Hold),
            pos("WATCH", 0.0, 0.0, 0.0, Signal::Hold), // quote-only ticker
            pos("SHORT", -5.0, -50.0, -50.0, Signal::Hold),
        ];

        let slices = allocation(&positions);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].name, "PETR4");
        assert!((slices[0].value - 1234.57).abs() < EPS);
    }

    #[test]
    fn active_signals_drop_hold_positions() {
        let positions = vec![
            pos("A", 1.0, 1.0, 1.0, Signal::Hold),
            pos("B", 1.0, 1.0, 1.0, Signal::Buy),
            pos("C", 1.0, 1.0, 1.0, Signal::Stop),
        ];

        let signals = active_signals(&positions);
        let tickers: Vec<&str> = signals.iter().map(|p| p.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["B", "C"]);
    }
}
