//! Per-entity counter aggregation.
//!
//! Several kernel tables report one row per CPU (or per queue). Collectors
//! publish the host-wide total, so rows are summed field by field here.

use std::collections::BTreeMap;

/// One entity's named counters, e.g. a single CPU row of `softnet_stat`.
pub type CounterRecord = BTreeMap<&'static str, i64>;

/// Field-wise sum of a sequence of [`CounterRecord`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    /// Sum of every field seen in any record.
    pub totals: BTreeMap<&'static str, i64>,
    /// Number of records folded in.
    pub records: usize,
    /// Set when records did not all carry the same field set.
    pub heterogeneous: bool,
}

impl Aggregate {
    /// Returns the total for `field`, or 0 when no record carried it.
    pub fn get(&self, field: &str) -> i64 {
        self.totals.get(field).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

/// Sums records field by field.
///
/// An empty input yields an empty aggregate. Records with differing field sets
/// are still summed (a missing field counts as zero) but the result is marked
/// `heterogeneous`. Addition wraps instead of panicking on overflow.
pub fn sum_records<'a, I>(records: I) -> Aggregate
where
    I: IntoIterator<Item = &'a CounterRecord>,
{
    let mut aggregate = Aggregate::default();
    let mut first_shape: Option<Vec<&'static str>> = None;

    for record in records {
        let shape: Vec<&'static str> = record.keys().copied().collect();
        match &first_shape {
            None => first_shape = Some(shape),
            Some(expected) if *expected != shape => aggregate.heterogeneous = true,
            Some(_) => {}
        }

        for (&field, &value) in record {
            let total = aggregate.totals.entry(field).or_insert(0);
            *total = total.wrapping_add(value);
        }
        aggregate.records += 1;
    }

    aggregate
}
