use std::collections::{BTreeMap, BTreeSet};

use super::types::{GridPoint, VertexId, rail_key};

/// Orientation of an axis-aligned rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub fn of(a: GridPoint, b: GridPoint) -> Option<Axis> {
        if a.y == b.y {
            Some(Axis::Horizontal)
        } else if a.x == b.x {
            Some(Axis::Vertical)
        } else {
            None
        }
    }
}

/// Rails grouped by their fixed coordinate: rows keyed by y, columns by x.
///
/// Only the tiling mutates a registry, inside the same call that edits
/// adjacency, so the two views never disagree.
#[derive(Debug, Default, Clone)]
pub struct RailRegistry {
    rows: BTreeMap<i32, BTreeSet<(VertexId, VertexId)>>,
    columns: BTreeMap<i32, BTreeSet<(VertexId, VertexId)>>,
}

impl RailRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn insert(&mut self, a: VertexId, pa: GridPoint, b: VertexId, pb: GridPoint) {
        let key = rail_key(a, b);
        match Axis::of(pa, pb) {
            Some(Axis::Horizontal) => {
                self.rows.entry(pa.y).or_default().insert(key);
            }
            Some(Axis::Vertical) => {
                self.columns.entry(pa.x).or_default().insert(key);
            }
            None => {}
        }
    }

    pub(super) fn remove(&mut self, a: VertexId, pa: GridPoint, b: VertexId, pb: GridPoint) {
        let key = rail_key(a, b);
        let (map, fixed) = match Axis::of(pa, pb) {
            Some(Axis::Horizontal) => (&mut self.rows, pa.y),
            Some(Axis::Vertical) => (&mut self.columns, pa.x),
            None => return,
        };
        if let Some(set) = map.get_mut(&fixed) {
            set.remove(&key);
            if set.is_empty() {
                map.remove(&fixed);
            }
        }
    }

    pub fn row(&self, y: i32) -> Vec<(VertexId, VertexId)> {
        self.rows
            .get(&y)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn column(&self, x: i32) -> Vec<(VertexId, VertexId)> {
        self.columns
            .get(&x)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn rows(&self) -> Vec<i32> {
        self.rows.keys().copied().collect()
    }

}
