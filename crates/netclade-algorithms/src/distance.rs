//! Symmetric pairwise distance store
//!
//! Each unordered pair of distinct entities holds at most one distance, stored once
//! under its canonical `(lower, upper)` key. The set of live entities is tracked
//! separately from the entries, so a matrix over a single entity still knows it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistanceError {
    #[error("Invalid distance {0}: must be finite and non-negative")]
    InvalidDistance(f64),

    #[error("Distance between an entity and itself is always zero")]
    SelfDistance,
}

pub type DistanceResult<T> = Result<T, DistanceError>;

#[derive(Clone)]
pub struct DistanceMatrix<T> {
    rows: BTreeMap<T, BTreeMap<T, f64>>,
    entities: BTreeSet<T>,
}

impl<T: Ord + Clone> Default for DistanceMatrix<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone> DistanceMatrix<T> {
    pub fn new() -> Self {
        DistanceMatrix {
            rows: BTreeMap::new(),
            entities: BTreeSet::new(),
        }
    }

    /// Register an entity that has no distances yet
    pub fn add_entity(&mut self, entity: T) {
        self.entities.insert(entity);
    }

    /// Store `d(a, b)`, replacing any previous value for the pair
    pub fn set_distance(&mut self, a: T, b: T, distance: f64) -> DistanceResult<()> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(DistanceError::InvalidDistance(distance));
        }
        if a == b {
            return Err(DistanceError::SelfDistance);
        }
        self.insert(a, b, distance);
        Ok(())
    }

    /// Store an already validated distance
    pub(crate) fn insert(&mut self, a: T, b: T, distance: f64) {
        debug_assert!(distance.is_finite() && distance >= 0.0);
        debug_assert!(a != b);
        self.entities.insert(a.clone());
        self.entities.insert(b.clone());
        let (lower, upper) = if a < b { (a, b) } else { (b, a) };
        self.rows.entry(lower).or_default().insert(upper, distance);
    }

    /// Symmetric lookup; `Some(0.0)` for identical entities, `None` for a pair never set
    pub fn get_distance(&self, a: &T, b: &T) -> Option<f64> {
        if a == b {
            return Some(0.0);
        }
        let (lower, upper) = if a < b { (a, b) } else { (b, a) };
        self.rows.get(lower).and_then(|row| row.get(upper)).copied()
    }

    /// The globally closest pair.
    ///
    /// Entries are scanned in canonical key order and only a strictly smaller distance
    /// replaces the current best, so ties resolve to the smallest `(lower, upper)` key.
    pub fn minimum_distance_entry(&self) -> Option<(T, T, f64)> {
        let mut best: Option<(&T, &T, f64)> = None;
        for (lower, row) in &self.rows {
            for (upper, &distance) in row {
                match best {
                    Some((_, _, d)) if distance >= d => {}
                    _ => best = Some((lower, upper, distance)),
                }
            }
        }
        best.map(|(a, b, d)| (a.clone(), b.clone(), d))
    }

    /// Drop an entity and every entry that mentions it
    pub fn remove_all_associated(&mut self, entity: &T) {
        self.entities.remove(entity);
        self.rows.remove(entity);
        self.rows.retain(|_, row| {
            row.remove(entity);
            !row.is_empty()
        });
    }

    pub fn entities(&self) -> impl Iterator<Item = &T> {
        self.entities.iter()
    }

    pub fn contains_entity(&self, entity: &T) -> bool {
        self.entities.contains(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of stored pair distances
    pub fn len(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    /// True when no pair distance is stored, even if entities are registered
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every stored `(lower, upper, distance)` in canonical order
    pub fn entries(&self) -> impl Iterator<Item = (&T, &T, f64)> {
        self.rows
            .iter()
            .flat_map(|(lower, row)| row.iter().map(move |(upper, &d)| (lower, upper, d)))
    }

    /// Deep copy with every entity passed through `mapping`.
    ///
    /// `mapping` runs exactly once per entity, in entity order, so a mapping that
    /// allocates fresh identities (e.g. cloned tree leaves) produces one new identity
    /// per original entity no matter how many entries refer to it.
    pub fn remap<U, F>(&self, mut mapping: F) -> DistanceMatrix<U>
    where
        U: Ord + Clone,
        F: FnMut(&T) -> U,
    {
        let mapped: BTreeMap<&T, U> = self.entities.iter().map(|e| (e, mapping(e))).collect();

        let mut result = DistanceMatrix::new();
        for target in mapped.values() {
            result.add_entity(target.clone());
        }
        for (a, b, d) in self.entries() {
            result.insert(mapped[a].clone(), mapped[b].clone(), d);
        }
        result
    }
}

impl<T: fmt::Debug> fmt::Debug for DistanceMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistanceMatrix")
            .field("entities", &self.entities)
            .field("rows", &self.rows)
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for DistanceMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (lower, row) in &self.rows {
            for (upper, d) in row {
                writeln!(f, "{}\t{}\t{}", lower, upper, d)?;
            }
        }
        Ok(())
    }
}
