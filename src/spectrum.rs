//! Frequency-keyed maps.
//!
//! Every per-frequency quantity (impedance caches, source currents, fault
//! scalings, results) lives in a [`Spectrum`]. On the wire it is an object
//! keyed by the frequency's shortest round-trip decimal text, e.g.
//! `{"50": [1.0, 1.0], "250": [1.0, 5.0]}`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::collections::btree_map;
use crate::errors::GroundingError;
use crate::units::Frequency;

#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum<T>(BTreeMap<Frequency, T>);

impl<T> Default for Spectrum<T> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<T> Spectrum<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a spectrum from raw hertz values, validating each frequency.
    pub fn from_hz<I>(entries: I) -> Result<Self, GroundingError>
    where
        I: IntoIterator<Item = (f64, T)>,
    {
        entries
            .into_iter()
            .map(|(hz, value)| Frequency::new(hz).map(|f| (f, value)))
            .collect()
    }

    pub fn insert(&mut self, frequency: Frequency, value: T) -> Option<T> {
        self.0.insert(frequency, value)
    }

    pub fn get(&self, frequency: Frequency) -> Option<&T> {
        self.0.get(&frequency)
    }

    /// Lookup by raw hertz; invalid frequencies simply have no entry.
    pub fn get_hz(&self, hz: f64) -> Option<&T> {
        Frequency::new(hz).ok().and_then(|f| self.0.get(&f))
    }

    pub fn contains(&self, frequency: Frequency) -> bool {
        self.0.contains_key(&frequency)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn frequencies(&self) -> impl Iterator<Item = Frequency> + '_ {
        self.0.keys().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.values()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Frequency, T> {
        self.0.iter()
    }
}

impl<T> FromIterator<(Frequency, T)> for Spectrum<T> {
    fn from_iter<I: IntoIterator<Item = (Frequency, T)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a Spectrum<T> {
    type Item = (&'a Frequency, &'a T);
    type IntoIter = btree_map::Iter<'a, Frequency, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<T: Serialize> Serialize for Spectrum<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(f, value)| (f.to_string(), value)))
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Spectrum<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, T>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, value)| {
                let hz: f64 = key
                    .parse()
                    .map_err(|_| D::Error::custom(format!("invalid frequency key `{key}`")))?;
                let frequency = Frequency::new(hz).map_err(D::Error::custom)?;
                Ok((frequency, value))
            })
            .collect()
    }
}
