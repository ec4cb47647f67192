//! Ordered, timestamp-unique bar sequences.

use chrono::{DateTime, Utc};
use market_data_ingestor::models::bar::Bar;

/// Bars sorted ascending by timestamp, at most one bar per timestamp.
///
/// Every constructor establishes the ordering, so code holding a `Series`
/// never has to re-check it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts `bars` by timestamp; on duplicate timestamps the bar that came
    /// *later* in the input wins.
    pub fn from_bars(mut bars: Vec<Bar>) -> Self {
        // stable, so equal timestamps keep their input order
        bars.sort_by_key(|b| b.timestamp);

        let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match out.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => out.push(bar),
            }
        }
        Self { bars: out }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    /// Bar at exactly `ts`, if any.
    pub fn get(&self, ts: DateTime<Utc>) -> Option<&Bar> {
        self.bars
            .binary_search_by_key(&ts, |b| b.timestamp)
            .ok()
            .map(|i| &self.bars[i])
    }

    /// Drops every bar older than `cutoff`. Returns how many were removed.
    pub fn retain_since(&mut self, cutoff: DateTime<Utc>) -> usize {
        let keep_from = self.bars.partition_point(|b| b.timestamp < cutoff);
        self.bars.drain(..keep_from).count()
    }
}

impl FromIterator<Bar> for Series {
    fn from_iter<I: IntoIterator<Item = Bar>>(iter: I) -> Self {
        Self::from_bars(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Bar;
    type IntoIter = std::slice::Iter<'a, Bar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}
