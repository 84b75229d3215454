use crate::domain::stock::{Stock, Ticker};
use crate::strategy::classify::latest_by_ticker;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationEntry {
    pub ticker: Ticker,
    pub amount: f64,
}

/// Budget split across stocks, one entry per ticker, in the order the stocks were
/// given.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Allocation {
    budget: f64,
    entries: Vec<AllocationEntry>,
}

impl Allocation {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[AllocationEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Budget this allocation distributes; 0 for an empty allocation.
    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.amount).sum()
    }

    pub fn get(&self, ticker: &Ticker) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| &e.ticker == ticker)
            .map(|e| e.amount)
    }
}

/// Splits `total_budget` in proportion to each stock's inverse RSI.
///
/// Stocks without an inverse RSI (undefined or zero RSI) carry no weight and get no
/// entry. No usable weight, or a budget that is not a positive number, yields an
/// empty allocation.
pub fn allocate(oversold: &[Stock], total_budget: f64) -> Allocation {
    if !(total_budget.is_finite() && total_budget > 0.0) {
        return Allocation::empty();
    }

    let mut weighted: Vec<(Ticker, f64)> = Vec::with_capacity(oversold.len());
    for stock in latest_by_ticker(oversold) {
        match stock.inverse_rsi.filter(|w| w.is_finite() && *w > 0.0) {
            Some(w) => weighted.push((stock.ticker, w)),
            None => tracing::warn!(
                ticker = %stock.ticker,
                rsi = ?stock.rsi,
                "no usable inverse RSI; excluded from allocation"
            ),
        }
    }

    let total_weight: f64 = weighted.iter().map(|(_, w)| w).sum();
    if !(total_weight.is_finite() && total_weight > 0.0) {
        return Allocation::empty();
    }

    let entries = weighted
        .into_iter()
        .map(|(ticker, w)| AllocationEntry {
            ticker,
            amount: total_budget * w / total_weight,
        })
        .collect();

    Allocation {
        budget: total_budget,
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(ticker: &str, rsi: Option<f64>) -> Stock {
        Stock::new(Ticker::new(ticker).unwrap(), rsi, 50.0)
    }

    fn t(s: &str) -> Ticker {
        Ticker::new(s).unwrap()
    }

    #[test]
    fn weights_inversely_by_rsi() {
        let alloc = allocate(&[stock("A", Some(10.0)), stock("B", Some(20.0))], 150.0);

        let a = alloc.get(&t("A")).unwrap();
        let b = alloc.get(&t("B")).unwrap();
        assert!((a - 100.0).abs() < 1e-9);
        assert!((b - 50.0).abs() < 1e-9);
        assert!((a - 2.0 * b).abs() < 1e-9);
        assert!((alloc.total() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn conserves_budget() {
        let stocks: Vec<Stock> = [3.5, 7.0, 12.25, 18.0, 22.2, 29.9]
            .iter()
            .enumerate()
            .map(|(i, rsi)| stock(&format!("T{i}"), Some(*rsi)))
            .collect();

        for budget in [1.0, 400.0, 12_345.67] {
            let alloc = allocate(&stocks, budget);
            assert_eq!(alloc.len(), stocks.len());
            assert!(((alloc.total() - budget) / budget).abs() < 1e-6);
            assert!(alloc.entries().iter().all(|e| e.amount > 0.0));
        }
    }

    #[test]
    fn empty_input_is_empty_allocation() {
        let alloc = allocate(&[], 100.0);
        assert!(alloc.is_empty());
        assert_eq!(alloc.total(), 0.0);
        assert_eq!(alloc.budget(), 0.0);
    }

    #[test]
    fn undefined_and_zero_rsi_carry_no_weight() {
        let stocks = [stock("ZERO", Some(0.0)), stock("NONE", None), stock("OK", Some(15.0))];
        let alloc = allocate(&stocks, 90.0);

        assert_eq!(alloc.len(), 1);
        assert!((alloc.get(&t("OK")).unwrap() - 90.0).abs() < 1e-9);
        assert_eq!(alloc.get(&t("ZERO")), None);

        let only_bad = allocate(&[stock("ZERO", Some(0.0))], 90.0);
        assert!(only_bad.is_empty());
    }

    #[test]
    fn non_positive_budget_allocates_nothing() {
        let stocks = [stock("A", Some(10.0))];
        assert!(allocate(&stocks, 0.0).is_empty());
        assert!(allocate(&stocks, -10.0).is_empty());
        assert!(allocate(&stocks, f64::NAN).is_empty());
    }

    #[test]
    fn keeps_input_order_and_dedupes_by_ticker() {
        let stocks = [stock("B", Some(5.0)), stock("A", Some(25.0)), stock("B", Some(25.0))];
        let alloc = allocate(&stocks, 100.0);

        let order: Vec<&str> = alloc.entries().iter().map(|e| e.ticker.as_str()).collect();
        assert_eq!(order, vec!["B", "A"]);
        assert!((alloc.get(&t("B")).unwrap() - 50.0).abs() < 1e-9);
    }
}
