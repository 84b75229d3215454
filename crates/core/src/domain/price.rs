use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closes for one ticker, ascending by date with at most one point per date.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Sorts by date; when a date repeats, the later point wins.
    pub fn new(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);

        let mut out: Vec<PricePoint> = Vec::with_capacity(points.len());
        for p in points {
            match out.last_mut() {
                Some(last) if last.date == p.date => *last = p,
                _ => out.push(p),
            }
        }

        Self { points: out }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.points.binary_search_by_key(&date, |p| p.date).ok()
    }

    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.position(date).map(|i| self.points[i].close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn sorts_and_keeps_last_duplicate() {
        let series = PriceSeries::new(vec![
            PricePoint { date: d(5), close: 3.0 },
            PricePoint { date: d(1), close: 1.0 },
            PricePoint { date: d(5), close: 4.0 },
            PricePoint { date: d(2), close: 2.0 },
        ]);

        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![1.0, 2.0, 4.0]);
        assert_eq!(series.last().map(|p| p.date), Some(d(5)));
    }

    #[test]
    fn close_on_requires_exact_date() {
        let series = PriceSeries::new(vec![
            PricePoint { date: d(1), close: 10.0 },
            PricePoint { date: d(4), close: 12.5 },
        ]);

        assert_eq!(series.close_on(d(4)), Some(12.5));
        assert_eq!(series.close_on(d(2)), None);
        assert_eq!(series.position(d(1)), Some(0));
    }
}
