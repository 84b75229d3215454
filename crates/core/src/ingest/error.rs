use crate::domain::stock::Ticker;
use std::fmt;

#[derive(Debug, Clone)]
pub struct SourceDiagnosticsError {
    pub provider: &'static str,
    pub stage: &'static str,
    pub ticker: Ticker,
    pub detail: String,
}

impl fmt::Display for SourceDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "price source error (provider={}, stage={}, ticker={}): {}",
            self.provider, self.stage, self.ticker, self.detail
        )
    }
}

impl std::error::Error for SourceDiagnosticsError {}
