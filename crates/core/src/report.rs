use crate::domain::stock::Stock;
use crate::notify::Notification;
use crate::strategy::allocate::Allocation;
use crate::strategy::classify::Classification;
use std::fmt::Write;

pub const DEFAULT_SUBJECT: &str = "Weekly Stock Report";

const EMPTY_SECTION: &str = "(none)";

#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub classification: &'a Classification,
    pub allocation: &'a Allocation,
    pub average_rsi: Option<f64>,
    /// Denominator of the allocation percentages.
    pub nominal_budget: f64,
}

/// Renders the weekly report. Section order and line order follow the
/// classification and the allocation exactly.
pub fn render_report(subject: &str, input: &ReportInput<'_>) -> Notification {
    let mut body = String::new();
    body.push_str("Here's your weekly stock report.\n");

    if let Some(avg) = input.average_rsi {
        let _ = writeln!(body, "Market average RSI: {avg:.2}");
    }

    body.push_str("\nOverbought stocks:\n");
    push_stock_lines(&mut body, &input.classification.overbought);

    body.push_str("\nOversold stocks:\n");
    push_stock_lines(&mut body, &input.classification.oversold);

    let allocation = input.allocation;
    let _ = writeln!(
        body,
        "\nHere's how you might allocate ${:.2}:",
        allocation.total()
    );
    if allocation.is_empty() {
        body.push_str(EMPTY_SECTION);
        body.push('\n');
    }
    for entry in allocation.entries() {
        let pct = if input.nominal_budget > 0.0 {
            entry.amount / input.nominal_budget * 100.0
        } else {
            0.0
        };
        let _ = writeln!(body, "{} - ${:.2} - {:.2}%", entry.ticker, entry.amount, pct);
    }

    Notification {
        subject: subject.to_string(),
        body,
    }
}

fn push_stock_lines(body: &mut String, stocks: &[Stock]) {
    if stocks.is_empty() {
        body.push_str(EMPTY_SECTION);
        body.push('\n');
        return;
    }

    for stock in stocks {
        let rsi = stock
            .rsi
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(body, "{} - ${:.2} - {} RSI", stock.ticker, stock.price, rsi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stock::Ticker;
    use crate::strategy::allocate::allocate;
    use crate::strategy::classify::{classify, Thresholds};

    fn stock(ticker: &str, rsi: f64, price: f64) -> Stock {
        Stock::new(Ticker::new(ticker).unwrap(), Some(rsi), price)
    }

    #[test]
    fn renders_sections_in_classification_order() {
        let stocks = [
            stock("AAPL", 25.0, 170.4),
            stock("NVDA", 81.234, 120.0),
            stock("KO", 50.0, 60.0),
            stock("TSLA", 10.0, 180.0),
            stock("META", 75.0, 480.1),
        ];
        let classification = classify(&stocks, Thresholds::default());
        // Weights 1/10 and 1/25 split 140 into 100 and 40.
        let allocation = allocate(&classification.oversold, 140.0);

        let report = render_report(
            DEFAULT_SUBJECT,
            &ReportInput {
                classification: &classification,
                allocation: &allocation,
                average_rsi: Some(48.2468),
                nominal_budget: 140.0,
            },
        );

        let expected = "\
Here's your weekly stock report.
Market average RSI: 48.25

Overbought stocks:
NVDA - $120.00 - 81.23 RSI
META - $480.10 - 75.00 RSI

Oversold stocks:
TSLA - $180.00 - 10.00 RSI
AAPL - $170.40 - 25.00 RSI

Here's how you might allocate $140.00:
TSLA - $100.00 - 71.43%
AAPL - $40.00 - 28.57%
";
        assert_eq!(report.subject, "Weekly Stock Report");
        assert_eq!(report.body, expected);
    }

    #[test]
    fn empty_sections_render_placeholder() {
        let classification = Classification::default();
        let allocation = Allocation::empty();
        let input = ReportInput {
            classification: &classification,
            allocation: &allocation,
            average_rsi: None,
            nominal_budget: 0.0,
        };

        let report = render_report("s", &input);
        assert_eq!(
            report.body,
            "Here's your weekly stock report.\n\nOverbought stocks:\n(none)\n\nOversold stocks:\n(none)\n\nHere's how you might allocate $0.00:\n(none)\n"
        );
        assert_eq!(render_report("s", &input), report);
    }
}
