//! OHLCV bars and the append-only bar series.

use chrono::{DateTime, Utc};

use crate::domain::error::ScanError;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Bars for one symbol, ordered by strictly increasing timestamp.
///
/// The only mutation is [`BarSeries::push`], which refuses out-of-order bars,
/// so every indicator can rely on index order being time order.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: Vec::new(),
        }
    }

    pub fn from_bars(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, ScanError> {
        let mut series = Self::new(symbol);
        series.bars.reserve(bars.len());
        for bar in bars {
            series.push(bar)?;
        }
        Ok(series)
    }

    pub fn push(&mut self, bar: Bar) -> Result<(), ScanError> {
        if let Some(last) = self.bars.last() {
            if bar.timestamp <= last.timestamp {
                return Err(ScanError::NonMonotonicTimestamp {
                    symbol: self.symbol.clone(),
                    previous: last.timestamp,
                    timestamp: bar.timestamp,
                });
            }
        }
        self.bars.push(bar);
        Ok(())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    pub fn opens(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.open).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar_at(hour: u32, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close,
            volume: 50_000.0,
        }
    }

    #[test]
    fn typical_price() {
        let bar = bar_at(10, 105.0);
        let expected = (110.0 + 90.0 + 105.0) / 3.0;
        assert!((bar.typical_price() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_hl_dominates() {
        let bar = bar_at(10, 105.0);
        assert!((bar.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bar = bar_at(10, 105.0);
        // |110-70| = 40
        assert!((bar.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let bar = bar_at(10, 105.0);
        // |90-130| = 40
        assert!((bar.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn push_accepts_increasing_timestamps() {
        let mut series = BarSeries::new("GC=F");
        series.push(bar_at(9, 100.0)).unwrap();
        series.push(bar_at(10, 101.0)).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![100.0, 101.0]);
    }

    #[test]
    fn push_rejects_duplicate_timestamp() {
        let mut series = BarSeries::new("GC=F");
        series.push(bar_at(9, 100.0)).unwrap();
        let err = series.push(bar_at(9, 101.0)).unwrap_err();
        assert!(matches!(err, ScanError::NonMonotonicTimestamp { .. }));
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn from_bars_rejects_out_of_order_input() {
        let result = BarSeries::from_bars("GC=F", vec![bar_at(10, 1.0), bar_at(9, 2.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn column_accessors_align() {
        let series =
            BarSeries::from_bars("SPY", vec![bar_at(9, 100.0), bar_at(10, 101.0)]).unwrap();
        assert_eq!(series.highs().len(), series.len());
        assert_eq!(series.lows().len(), series.len());
        assert_eq!(series.volumes(), vec![50_000.0, 50_000.0]);
        assert_eq!(series.timestamps()[1].format("%H").to_string(), "10");
        assert_eq!(series.last().map(|b| b.close), Some(101.0));
    }
}
