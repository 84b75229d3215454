use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const QUOTE_BASE_URL: &str = "https://finance.yahoo.com/quote";

/// Symbol as understood by the price source. Identity of a stock within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn new(symbol: impl AsRef<str>) -> anyhow::Result<Self> {
        let s = symbol.as_ref().trim();
        ensure!(!s.is_empty(), "ticker must be non-empty");
        ensure!(
            !s.chars().any(char::is_whitespace),
            "ticker must not contain whitespace: {s:?}"
        );
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses a comma separated list, skipping blank entries.
    pub fn parse_list(s: &str) -> anyhow::Result<Vec<Self>> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Self::new)
            .collect()
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}

/// Per-run snapshot of one ticker.
///
/// `rsi` is `None` when the latest RSI is undefined (flat prices, too little data).
/// `inverse_rsi` is only present for a strictly positive RSI; it is the allocation weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stock {
    pub ticker: Ticker,
    pub rsi: Option<f64>,
    pub inverse_rsi: Option<f64>,
    pub price: f64,
    pub reference_url: String,
}

impl Stock {
    pub fn new(ticker: Ticker, rsi: Option<f64>, price: f64) -> Self {
        let rsi = rsi.filter(|v| v.is_finite());
        let inverse_rsi = rsi.filter(|v| *v > 0.0).map(|v| 1.0 / v);
        let reference_url = reference_url(&ticker);

        Self {
            ticker,
            rsi,
            inverse_rsi,
            price,
            reference_url,
        }
    }
}

pub fn reference_url(ticker: &Ticker) -> String {
    format!("{QUOTE_BASE_URL}/{ticker}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_trims_and_rejects_blank() {
        assert_eq!(Ticker::new("  AAPL ").unwrap().as_str(), "AAPL");
        assert!(Ticker::new("   ").is_err());
        assert!(Ticker::new("BRK B").is_err());
    }

    #[test]
    fn parse_list_skips_empty_entries() {
        let list = Ticker::parse_list("AAPL, MSFT,,BTC-USD ,").unwrap();
        let symbols: Vec<&str> = list.iter().map(Ticker::as_str).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "BTC-USD"]);
    }

    #[test]
    fn ticker_deserializes_through_validation() {
        let t: Ticker = serde_json::from_value(serde_json::json!("NVDA")).unwrap();
        assert_eq!(t.as_str(), "NVDA");
        assert!(serde_json::from_value::<Ticker>(serde_json::json!("")).is_err());
    }

    #[test]
    fn stock_derives_inverse_rsi_and_url() {
        let s = Stock::new(Ticker::new("KO").unwrap(), Some(25.0), 61.2);
        assert_eq!(s.inverse_rsi, Some(0.04));
        assert_eq!(s.reference_url, "https://finance.yahoo.com/quote/KO");
    }

    #[test]
    fn stock_without_usable_rsi_has_no_weight() {
        let zero = Stock::new(Ticker::new("A").unwrap(), Some(0.0), 1.0);
        assert_eq!(zero.rsi, Some(0.0));
        assert_eq!(zero.inverse_rsi, None);

        let nan = Stock::new(Ticker::new("B").unwrap(), Some(f64::NAN), 1.0);
        assert_eq!(nan.rsi, None);
        assert_eq!(nan.inverse_rsi, None);
    }
}
