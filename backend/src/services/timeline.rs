//! Merging of heterogeneous row streams into one newest-first timeline

use chrono::NaiveDateTime;

/// A row tagged with the timestamp it is ordered by
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<T> {
    pub at: NaiveDateTime,
    pub row: T,
}

impl<T> Stamped<T> {
    pub fn new(at: NaiveDateTime, row: T) -> Self {
        Self { at, row }
    }
}

/// Concatenate the streams in the order given and sort newest first.
///
/// The sort is stable: rows sharing a timestamp keep the order they had in
/// their stream, and earlier streams come before later ones.
pub fn merge_newest_first<T>(streams: Vec<Vec<Stamped<T>>>) -> Vec<Stamped<T>> {
    let mut merged: Vec<Stamped<T>> = streams.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.at.cmp(&a.at));
    merged
}
