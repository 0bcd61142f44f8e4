use rstar::primitives::{GeomWithData, Line};
use rstar::{AABB, RTree};

use super::types::{GridPoint, VertexId};

type IndexedVertex = GeomWithData<[i32; 2], VertexId>;
type IndexedRail = GeomWithData<Line<[i32; 2]>, (VertexId, VertexId)>;

fn envelope(min: GridPoint, max: GridPoint) -> AABB<[i32; 2]> {
    AABB::from_corners([min.x, min.y], [max.x, max.y])
}

/// R*-tree over the positions of live vertices.
#[derive(Debug)]
pub struct VertexIndex {
    tree: RTree<IndexedVertex>,
}

impl VertexIndex {
    pub fn bulk_load(entries: impl IntoIterator<Item = (GridPoint, VertexId)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(p, id)| GeomWithData::new([p.x, p.y], id))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn insert(&mut self, p: GridPoint, id: VertexId) {
        self.tree.insert(GeomWithData::new([p.x, p.y], id));
    }

    pub fn remove(&mut self, p: GridPoint, id: VertexId) -> bool {
        self.tree.remove(&GeomWithData::new([p.x, p.y], id)).is_some()
    }

    /// Ids at exactly `p`, in ascending order.
    pub fn at(&self, p: GridPoint) -> Vec<VertexId> {
        self.in_box(p, p)
    }

    /// Ids inside the closed box `[min, max]`, in ascending order.
    pub fn in_box(&self, min: GridPoint, max: GridPoint) -> Vec<VertexId> {
        let mut ids: Vec<VertexId> = self
            .tree
            .locate_in_envelope(&envelope(min, max))
            .map(|entry| entry.data)
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// R*-tree over rail segments, keyed by the canonical `(min id, max id)` pair.
///
/// Segments are stored with the smaller id's endpoint first so removal can
/// rebuild the exact stored geometry.
#[derive(Debug)]
pub struct RailIndex {
    tree: RTree<IndexedRail>,
}

impl RailIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    pub fn insert(&mut self, key: (VertexId, VertexId), from: GridPoint, to: GridPoint) {
        self.tree.insert(Self::entry(key, from, to));
    }

    pub fn remove(&mut self, key: (VertexId, VertexId), from: GridPoint, to: GridPoint) -> bool {
        self.tree.remove(&Self::entry(key, from, to)).is_some()
    }

    /// Rails whose bounding box touches the closed box `[min, max]`.
    pub fn intersecting(&self, min: GridPoint, max: GridPoint) -> Vec<(VertexId, VertexId)> {
        let mut keys: Vec<_> = self
            .tree
            .locate_in_envelope_intersecting(&envelope(min, max))
            .map(|entry| entry.data)
            .collect();
        keys.sort_unstable();
        keys
    }

    fn entry(key: (VertexId, VertexId), from: GridPoint, to: GridPoint) -> IndexedRail {
        GeomWithData::new(Line::new([from.x, from.y], [to.x, to.y]), key)
    }
}

impl Default for RailIndex {
    fn default() -> Self {
        Self::new()
    }
}
