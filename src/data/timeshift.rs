//! Per-signal timestamp offsets with identity-cached shifted arrays.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::cache::IdentityCache;
use super::signals::{ArrayId, DataSet, Samples};

#[derive(Debug, Default)]
pub struct Timeshifts {
    offsets: HashMap<String, f64>,
    cache: IdentityCache<f64, Samples<f64>>,
}

impl Timeshifts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the offset of every named signal. Zero removes the offset.
    pub fn set_timeshift(&mut self, names: &[String], offset: f64) {
        for name in names {
            if offset == 0.0 {
                self.offsets.remove(name);
            } else {
                self.offsets.insert(name.clone(), offset);
            }
        }
    }

    pub fn offset(&self, name: &str) -> f64 {
        self.offsets.get(name).copied().unwrap_or(0.0)
    }

    /// Names with a nonzero offset.
    pub fn shifted_names(&self) -> impl Iterator<Item = (&str, f64)> {
        self.offsets.iter().map(|(n, &o)| (n.as_str(), o))
    }

    /// Timestamps of `name` shifted by its offset, or `None` if the signal is
    /// not in `data`.
    ///
    /// With no offset the original array comes back unchanged. Otherwise the
    /// shifted array is cached against the source array, so repeated calls
    /// return the same [`Samples`] until either the offset or the source
    /// array changes.
    pub fn apply_timeshift(&mut self, name: &str, data: &DataSet) -> Option<Samples<f64>> {
        let signal = data.get(name)?;
        let offset = self.offset(name);
        if offset == 0.0 {
            return Some(signal.timestamps.clone());
        }
        let source = &signal.timestamps;
        let shifted = self.cache.get_or_insert_with(source.id(), offset, || {
            debug!(signal = name, offset, "timeshift cache miss");
            Samples::new(source.iter().map(|t| t + offset).collect())
        });
        Some(shifted.clone())
    }

    /// Forget the offset of a removed signal.
    pub fn clear(&mut self, name: &str) {
        self.offsets.remove(name);
    }

    /// Drop cached arrays derived from arrays no longer in use.
    pub fn retain_sources(&mut self, live: &HashSet<ArrayId>) {
        self.cache.retain_sources(live);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::signals::Signal;

    fn data() -> DataSet {
        DataSet::new().with("a", Signal::numeric("a", vec![0.0, 1.0, 2.0], vec![5.0, 6.0, 7.0]).unwrap())
    }

    #[test]
    fn zero_offset_returns_source_array() {
        let ds = data();
        let mut ts = Timeshifts::new();
        let out = ts.apply_timeshift("a", &ds).unwrap();
        assert!(out.same_array(&ds.get("a").unwrap().timestamps));
    }

    #[test]
    fn repeated_shift_hits_cache() {
        let ds = data();
        let mut ts = Timeshifts::new();
        ts.set_timeshift(&["a".into()], 1.0);
        let first = ts.apply_timeshift("a", &ds).unwrap();
        let second = ts.apply_timeshift("a", &ds).unwrap();
        assert_eq!(first.as_slice(), &[1.0, 2.0, 3.0]);
        assert!(first.same_array(&second));
    }

    #[test]
    fn new_offset_replaces_cached_array() {
        let ds = data();
        let mut ts = Timeshifts::new();
        ts.set_timeshift(&["a".into()], 1.0);
        let first = ts.apply_timeshift("a", &ds).unwrap();
        ts.set_timeshift(&["a".into()], 2.0);
        let second = ts.apply_timeshift("a", &ds).unwrap();
        assert!(!first.same_array(&second));
        assert_eq!(second.as_slice(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn new_source_array_misses() {
        let mut ts = Timeshifts::new();
        ts.set_timeshift(&["a".into()], 1.0);
        let first = ts.apply_timeshift("a", &data()).unwrap();
        let second = ts.apply_timeshift("a", &data()).unwrap();
        assert!(!first.same_array(&second));
        assert_eq!(first.as_slice(), second.as_slice());
    }

    #[test]
    fn missing_signal_is_none() {
        let mut ts = Timeshifts::new();
        assert!(ts.apply_timeshift("nope", &data()).is_none());
    }
}
