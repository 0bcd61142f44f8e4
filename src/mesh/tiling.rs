use std::collections::{HashMap, HashSet, VecDeque};

use log::warn;

use crate::error::{MeshError, Result};

use super::geometry;
use super::rails::RailRegistry;
use super::spatial::{RailIndex, VertexIndex};
use super::types::{GridPoint, Rail, RailMarks, Vertex, VertexId, rail_key};

/// Position → id map handed to [`Tiling::insert_vertex_dedup`] by builders.
pub type LocationIndex = HashMap<GridPoint, VertexId>;

pub const DEFAULT_MAX_DEGREE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingLimits {
    /// Upper bound on vertices ever created, junctions included.
    pub max_vertices: Option<usize>,
    pub max_degree: usize,
}

impl Default for TilingLimits {
    fn default() -> Self {
        Self {
            max_vertices: None,
            max_degree: DEFAULT_MAX_DEGREE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TilingStats {
    pub originals: usize,
    pub junctions: usize,
    pub rails: usize,
    pub claimed_rails: usize,
}

/// The mutable routing mesh.
///
/// Vertices live in an arena and are addressed by stable ids. Ids below
/// `original_count` are the input nodes; everything above is a junction the
/// mesh synthesized. Junctions are never removed from the arena, only marked
/// invalid, so ids stay valid for the lifetime of the tiling.
#[derive(Debug)]
pub struct Tiling {
    vertices: Vec<Vertex>,
    adjacency: Vec<Vec<Rail>>,
    original_count: usize,
    limits: TilingLimits,
    vertex_index: VertexIndex,
    rail_index: RailIndex,
    registry: Option<RailRegistry>,
}

impl Tiling {
    pub fn new(points: &[GridPoint], limits: TilingLimits) -> Result<Self> {
        let mut seen = HashSet::with_capacity(points.len());
        for p in points {
            if !seen.insert(*p) {
                return Err(MeshError::DuplicateVertex { x: p.x, y: p.y });
            }
        }
        if let Some(limit) = limits.max_vertices
            && points.len() > limit
        {
            return Err(MeshError::CapacityExceeded { limit });
        }
        Ok(Self {
            vertices: points.iter().copied().map(Vertex::new).collect(),
            adjacency: vec![Vec::new(); points.len()],
            original_count: points.len(),
            limits,
            vertex_index: VertexIndex::bulk_load(points.iter().copied().zip(0..)),
            rail_index: RailIndex::new(),
            registry: None,
        })
    }

    pub fn limits(&self) -> TilingLimits {
        self.limits
    }

    pub fn original_count(&self) -> usize {
        self.original_count
    }

    /// Total number of vertices ever created, invalid junctions included.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id]
    }

    pub fn pos(&self, id: VertexId) -> GridPoint {
        self.vertices[id].pos
    }

    pub fn set_attributes(&mut self, id: VertexId, weight: f64, zoom_level: u32) {
        let vertex = &mut self.vertices[id];
        vertex.weight = weight;
        vertex.zoom_level = zoom_level;
    }

    pub fn is_original(&self, id: VertexId) -> bool {
        id < self.original_count
    }

    pub fn is_live(&self, id: VertexId) -> bool {
        self.vertices.get(id).is_some_and(|v| !v.invalid)
    }

    pub fn live_vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.vertices.len()).filter(|&id| !self.vertices[id].invalid)
    }

    pub fn live_junctions(&self) -> impl Iterator<Item = VertexId> + '_ {
        (self.original_count..self.vertices.len()).filter(|&id| !self.vertices[id].invalid)
    }

    pub fn degree(&self, id: VertexId) -> usize {
        self.adjacency[id].len()
    }

    pub fn rails(&self, id: VertexId) -> &[Rail] {
        &self.adjacency[id]
    }

    pub fn neighbors(&self, id: VertexId) -> impl Iterator<Item = VertexId> + '_ {
        self.adjacency[id].iter().map(|rail| rail.target)
    }

    pub fn rail(&self, a: VertexId, b: VertexId) -> Option<&Rail> {
        self.adjacency.get(a)?.iter().find(|rail| rail.target == b)
    }

    pub fn are_adjacent(&self, a: VertexId, b: VertexId) -> bool {
        self.rail(a, b).is_some()
    }

    pub fn rail_marks(&self, a: VertexId, b: VertexId) -> Option<RailMarks> {
        self.rail(a, b).map(|rail| RailMarks::new(rail.selected, rail.used))
    }

    pub fn rail_length(&self, a: VertexId, b: VertexId) -> f64 {
        geometry::length(self.pos(a), self.pos(b))
    }

    /// Every live rail once, as `(smaller id, larger id)`, in ascending order.
    pub fn edges(&self) -> Vec<(VertexId, VertexId)> {
        let mut edges = Vec::new();
        for a in self.live_vertices() {
            for rail in &self.adjacency[a] {
                if a < rail.target {
                    edges.push((a, rail.target));
                }
            }
        }
        edges
    }

    pub(super) fn adjacency_mut(&mut self, id: VertexId) -> &mut Vec<Rail> {
        &mut self.adjacency[id]
    }

    fn ensure_live(&self, id: VertexId) -> Result<()> {
        if self.is_live(id) {
            Ok(())
        } else {
            Err(MeshError::InvalidVertex(id))
        }
    }

    fn push_vertex(&mut self, p: GridPoint) -> Result<VertexId> {
        if let Some(limit) = self.limits.max_vertices
            && self.vertices.len() >= limit
        {
            return Err(MeshError::CapacityExceeded { limit });
        }
        let id = self.vertices.len();
        self.vertices.push(Vertex::new(p));
        self.adjacency.push(Vec::new());
        self.vertex_index.insert(p, id);
        Ok(id)
    }

    /// Returns the live vertex at `p`, creating a junction there if none exists.
    pub fn insert_vertex_dedup(&mut self, p: GridPoint, locations: &mut LocationIndex) -> Result<VertexId> {
        if let Some(&id) = locations.get(&p)
            && self.is_live(id)
            && self.pos(id) == p
        {
            return Ok(id);
        }
        let id = match self.vertex_at(p) {
            Some(id) => id,
            None => self.push_vertex(p)?,
        };
        locations.insert(p, id);
        Ok(id)
    }

    /// Adds an unclaimed rail. `Ok(false)` means the pair was already adjacent.
    pub fn add_edge(&mut self, a: VertexId, b: VertexId) -> Result<bool> {
        self.add_edge_with_marks(a, b, RailMarks::UNCLAIMED)
    }

    pub fn add_edge_with_marks(&mut self, a: VertexId, b: VertexId, marks: RailMarks) -> Result<bool> {
        self.ensure_live(a)?;
        self.ensure_live(b)?;
        if a == b || self.are_adjacent(a, b) {
            return Ok(false);
        }
        for v in [a, b] {
            if self.degree(v) >= self.limits.max_degree {
                return Err(MeshError::DegreeExceeded {
                    vertex: v,
                    limit: self.limits.max_degree,
                });
            }
        }
        for (tail, head) in [(a, b), (b, a)] {
            let mut rail = Rail::new(head);
            rail.selected = marks.selected;
            rail.used = marks.used;
            self.adjacency[tail].push(rail);
        }
        self.index_rail(a, b);
        Ok(true)
    }

    /// Removes the rail `a`–`b`. A junction left without rails is invalidated.
    pub fn remove_edge(&mut self, a: VertexId, b: VertexId) -> bool {
        if self.detach(a, b).is_none() {
            return false;
        }
        self.retire_if_isolated(a);
        self.retire_if_isolated(b);
        true
    }

    /// Drops both halves of a rail without touching vertex validity.
    fn detach(&mut self, a: VertexId, b: VertexId) -> Option<RailMarks> {
        if a >= self.adjacency.len() || b >= self.adjacency.len() {
            return None;
        }
        let forward = self.adjacency[a].iter().position(|rail| rail.target == b);
        let backward = self.adjacency[b].iter().position(|rail| rail.target == a);
        match (forward, backward) {
            (Some(i), Some(j)) => {
                self.unindex_rail(a, b);
                let rail = self.adjacency[a].remove(i);
                self.adjacency[b].remove(j);
                Some(RailMarks::new(rail.selected, rail.used))
            }
            (None, None) => None,
            _ => {
                warn!("asymmetric adjacency between {a} and {b}");
                None
            }
        }
    }

    fn retire_if_isolated(&mut self, id: VertexId) {
        if !self.is_original(id) && self.is_live(id) && self.adjacency[id].is_empty() {
            let p = self.pos(id);
            self.vertices[id].invalid = true;
            self.vertex_index.remove(p, id);
        }
    }

    /// Logically deletes a junction together with its rails.
    ///
    /// Original vertices are never deleted; asking for one returns `false`.
    pub fn invalidate(&mut self, id: VertexId) -> bool {
        if self.is_original(id) || !self.is_live(id) {
            return false;
        }
        let neighbors: Vec<VertexId> = self.neighbors(id).collect();
        for n in neighbors {
            self.detach(id, n);
        }
        self.retire_if_isolated(id);
        true
    }

    /// Moves every rail of `duplicate` onto `keep` and invalidates `duplicate`.
    pub fn merge_vertex_into(&mut self, duplicate: VertexId, keep: VertexId) -> Result<()> {
        self.ensure_live(duplicate)?;
        self.ensure_live(keep)?;
        if duplicate == keep {
            return Ok(());
        }
        let rails: Vec<Rail> = self.adjacency[duplicate].clone();
        for rail in rails {
            let marks = RailMarks::new(rail.selected, rail.used);
            self.detach(duplicate, rail.target);
            if rail.target != keep {
                match self.rail_marks(keep, rail.target) {
                    Some(existing) => self.set_marks(keep, rail.target, existing.merge(marks)),
                    None => {
                        self.add_edge_with_marks(keep, rail.target, marks)?;
                    }
                }
            }
        }
        if self.is_original(duplicate) {
            warn!("original vertex {duplicate} coincides with {keep}; keeping both");
        } else {
            self.retire_if_isolated(duplicate);
        }
        Ok(())
    }

    pub fn move_vertex(&mut self, id: VertexId, p: GridPoint) -> Result<()> {
        self.ensure_live(id)?;
        let old = self.pos(id);
        if old == p {
            return Ok(());
        }
        if self.vertex_at(p).is_some() {
            return Err(MeshError::DuplicateVertex { x: p.x, y: p.y });
        }
        let neighbors: Vec<VertexId> = self.neighbors(id).collect();
        for &n in &neighbors {
            self.unindex_rail(id, n);
        }
        self.vertex_index.remove(old, id);
        self.vertices[id].pos = p;
        self.vertex_index.insert(p, id);
        for &n in &neighbors {
            self.index_rail(id, n);
        }
        Ok(())
    }

    pub fn vertex_at(&self, p: GridPoint) -> Option<VertexId> {
        self.vertex_index.at(p).into_iter().next()
    }

    /// Any live vertex within `offset` of `p` on both axes, ignoring `exclude`.
    pub fn vertex_near(&self, p: GridPoint, offset: i32, exclude: Option<VertexId>) -> Option<VertexId> {
        self.vertex_index
            .in_box(p.offset(-offset, -offset), p.offset(offset, offset))
            .into_iter()
            .find(|&id| Some(id) != exclude)
    }

    pub fn query_region(&self, min: GridPoint, max: GridPoint) -> Vec<VertexId> {
        self.vertex_index.in_box(min, max)
    }

    pub fn rails_in_region(&self, min: GridPoint, max: GridPoint) -> Vec<(VertexId, VertexId)> {
        self.rail_index.intersecting(min, max)
    }

    /// First-writer-wins zoom claim on both halves of a rail.
    ///
    /// Returns `true` when this call set the mark.
    pub fn claim_rail(&mut self, a: VertexId, b: VertexId, zoom_level: u32) -> bool {
        let Some(marks) = self.rail_marks(a, b) else {
            return false;
        };
        if marks.used != 0 {
            return false;
        }
        let selected = if marks.selected == 0 { zoom_level } else { marks.selected };
        self.set_marks(a, b, RailMarks::new(selected, zoom_level));
        true
    }

    fn set_marks(&mut self, a: VertexId, b: VertexId, marks: RailMarks) {
        for (tail, head) in [(a, b), (b, a)] {
            if let Some(rail) = self.adjacency[tail].iter_mut().find(|rail| rail.target == head) {
                rail.selected = marks.selected;
                rail.used = marks.used;
            }
        }
    }

    pub(super) fn reset_rail_weights(&mut self) {
        for rails in &mut self.adjacency {
            for rail in rails {
                rail.weight = 0.0;
            }
        }
    }

    /// Adds `delta` to both halves of the rail `a`–`b`.
    pub(super) fn add_rail_weight(&mut self, a: VertexId, b: VertexId, delta: f64) {
        for (tail, head) in [(a, b), (b, a)] {
            if let Some(rail) = self.adjacency[tail].iter_mut().find(|rail| rail.target == head) {
                rail.weight += delta;
            }
        }
    }

    fn index_rail(&mut self, a: VertexId, b: VertexId) {
        let (lo, hi) = rail_key(a, b);
        let (plo, phi) = (self.pos(lo), self.pos(hi));
        self.rail_index.insert((lo, hi), plo, phi);
        if let Some(registry) = self.registry.as_mut() {
            registry.insert(lo, plo, hi, phi);
        }
    }

    fn unindex_rail(&mut self, a: VertexId, b: VertexId) {
        let (lo, hi) = rail_key(a, b);
        let (plo, phi) = (self.pos(lo), self.pos(hi));
        if !self.rail_index.remove((lo, hi), plo, phi) {
            warn!("rail {lo}-{hi} missing from the rail index");
        }
        if let Some(registry) = self.registry.as_mut() {
            registry.remove(lo, plo, hi, phi);
        }
    }

    /// Starts tracking rails by fixed coordinate, seeded with the current rails.
    pub fn enable_rail_registry(&mut self) {
        let mut registry = RailRegistry::new();
        for (a, b) in self.edges() {
            registry.insert(a, self.pos(a), b, self.pos(b));
        }
        self.registry = Some(registry);
    }

    pub fn disable_rail_registry(&mut self) -> Option<RailRegistry> {
        self.registry.take()
    }

    pub fn rail_registry(&self) -> Option<&RailRegistry> {
        self.registry.as_ref()
    }

    /// Replaces rail `a`–`b` with the chain `a, through.., b`, keeping its marks.
    ///
    /// `through` must already be ordered from `a` towards `b`. Returns
    /// `Ok(false)` when there is no such rail or nothing to split at.
    pub fn split_rail(&mut self, a: VertexId, b: VertexId, through: &[VertexId]) -> Result<bool> {
        let Some(marks) = self.rail_marks(a, b) else {
            return Ok(false);
        };
        let mut chain = vec![a];
        for &v in through {
            if v != b && chain.last() != Some(&v) {
                chain.push(v);
            }
        }
        if chain.len() == 1 {
            return Ok(false);
        }
        chain.push(b);
        self.detach(a, b);
        for pair in chain.windows(2) {
            self.add_edge_with_marks(pair[0], pair[1], marks)?;
        }
        Ok(true)
    }

    /// Removes every rail among a set of collinear vertices and relinks them
    /// consecutively along the line. Returns how many rails were removed.
    ///
    /// Each new rail inherits the merged marks of the removed rails that
    /// spanned it.
    pub fn relink_collinear(&mut self, ids: &[VertexId]) -> Result<usize> {
        let mut order: Vec<VertexId> = ids.iter().copied().filter(|&id| self.is_live(id)).collect();
        order.sort_by_key(|&id| (self.pos(id), id));
        order.dedup();
        if order.len() < 2 {
            return Ok(0);
        }
        let mut removed = Vec::new();
        for i in 0..order.len() {
            for j in (i + 1)..order.len() {
                if let Some(marks) = self.detach(order[i], order[j]) {
                    removed.push((i, j, marks));
                }
            }
        }
        for k in 0..order.len() - 1 {
            let marks = removed
                .iter()
                .filter(|(i, j, _)| *i <= k && *j > k)
                .fold(RailMarks::UNCLAIMED, |acc, (_, _, m)| acc.merge(*m));
            self.add_edge_with_marks(order[k], order[k + 1], marks)?;
        }
        for &id in &order {
            self.retire_if_isolated(id);
        }
        Ok(removed.len())
    }

    /// Pairs `(a, b)` where `a` lists `b` but `b` does not list `a`.
    pub fn check_symmetry(&self) -> Vec<(VertexId, VertexId)> {
        let mut broken = Vec::new();
        for a in 0..self.adjacency.len() {
            for rail in &self.adjacency[a] {
                if !self.adjacency[rail.target].iter().any(|back| back.target == a) {
                    broken.push((a, rail.target));
                }
            }
        }
        broken
    }

    /// Tags every live vertex with a 1-based component number.
    pub fn label_components(&mut self) -> usize {
        for vertex in &mut self.vertices {
            vertex.component = 0;
        }
        let mut count = 0u32;
        for start in 0..self.vertices.len() {
            if self.vertices[start].invalid || self.vertices[start].component != 0 {
                continue;
            }
            count += 1;
            self.vertices[start].component = count;
            let mut queue = VecDeque::from([start]);
            while let Some(v) = queue.pop_front() {
                for i in 0..self.adjacency[v].len() {
                    let n = self.adjacency[v][i].target;
                    if self.vertices[n].component == 0 {
                        self.vertices[n].component = count;
                        queue.push_back(n);
                    }
                }
            }
        }
        count as usize
    }

    pub fn stats(&self) -> TilingStats {
        let edges = self.edges();
        let claimed_rails = edges
            .iter()
            .filter(|&&(a, b)| self.rail(a, b).is_some_and(Rail::is_claimed))
            .count();
        TilingStats {
            originals: self.original_count,
            junctions: self.live_junctions().count(),
            rails: edges.len(),
            claimed_rails,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> GridPoint {
        GridPoint::new(x, y)
    }

    fn line_tiling() -> Tiling {
        Tiling::new(&[p(0, 0), p(10, 0)], TilingLimits::default()).unwrap()
    }

    #[test]
    fn duplicate_originals_are_rejected() {
        let err = Tiling::new(&[p(1, 1), p(1, 1)], TilingLimits::default()).unwrap_err();
        assert_eq!(err, MeshError::DuplicateVertex { x: 1, y: 1 });
    }

    #[test]
    fn dedup_insert_is_idempotent() {
        let mut tiling = line_tiling();
        let mut locations = LocationIndex::new();
        let first = tiling.insert_vertex_dedup(p(5, 0), &mut locations).unwrap();
        let count = tiling.vertex_count();
        let second = tiling.insert_vertex_dedup(p(5, 0), &mut locations).unwrap();
        assert_eq!(first, second);
        assert_eq!(tiling.vertex_count(), count);
        let original = tiling.insert_vertex_dedup(p(0, 0), &mut locations).unwrap();
        assert_eq!(original, 0);
    }

    #[test]
    fn add_and_remove_keep_adjacency_symmetric() {
        let mut tiling = line_tiling();
        assert!(tiling.add_edge(0, 1).unwrap());
        assert!(!tiling.add_edge(1, 0).unwrap());
        assert!(tiling.check_symmetry().is_empty());
        assert_eq!(tiling.degree(0), 1);
        assert!(tiling.remove_edge(1, 0));
        assert!(!tiling.remove_edge(0, 1));
        assert!(tiling.check_symmetry().is_empty());
        assert!(tiling.is_live(0) && tiling.is_live(1));
    }

    #[test]
    fn isolated_junction_is_invalidated() {
        let mut tiling = line_tiling();
        let mut locations = LocationIndex::new();
        let j = tiling.insert_vertex_dedup(p(5, 0), &mut locations).unwrap();
        tiling.add_edge(0, j).unwrap();
        assert!(tiling.remove_edge(0, j));
        assert!(!tiling.is_live(j));
        assert_eq!(tiling.vertex_at(p(5, 0)), None);
        assert_eq!(tiling.add_edge(0, j), Err(MeshError::InvalidVertex(j)));
    }

    #[test]
    fn limits_are_enforced() {
        let limits = TilingLimits {
            max_vertices: Some(3),
            max_degree: 1,
        };
        let mut tiling = Tiling::new(&[p(0, 0), p(4, 0)], limits).unwrap();
        let mut locations = LocationIndex::new();
        let j = tiling.insert_vertex_dedup(p(0, 4), &mut locations).unwrap();
        assert_eq!(
            tiling.insert_vertex_dedup(p(4, 4), &mut locations),
            Err(MeshError::CapacityExceeded { limit: 3 })
        );
        tiling.add_edge(0, 1).unwrap();
        assert_eq!(
            tiling.add_edge(0, j),
            Err(MeshError::DegreeExceeded { vertex: 0, limit: 1 })
        );
    }

    #[test]
    fn split_rail_keeps_marks_and_registry() {
        let mut tiling = line_tiling();
        tiling.enable_rail_registry();
        tiling.add_edge_with_marks(0, 1, RailMarks::new(2, 3)).unwrap();
        let mut locations = LocationIndex::new();
        let j = tiling.insert_vertex_dedup(p(4, 0), &mut locations).unwrap();
        assert!(tiling.split_rail(0, 1, &[j]).unwrap());
        assert!(!tiling.are_adjacent(0, 1));
        assert_eq!(tiling.rail_marks(0, j), Some(RailMarks::new(2, 3)));
        assert_eq!(tiling.rail_marks(j, 1), Some(RailMarks::new(2, 3)));
        let registry = tiling.rail_registry().unwrap();
        assert_eq!(registry.row(0), vec![(0, j), (1, j)]);
        assert_eq!(tiling.rails_in_region(p(2, 0), p(2, 0)), vec![(0, j)]);
    }

    #[test]
    fn relink_collinear_drops_skip_rails() {
        let mut tiling = Tiling::new(&[p(0, 0), p(3, 0), p(6, 0)], TilingLimits::default()).unwrap();
        tiling.add_edge(0, 2).unwrap();
        tiling.add_edge(0, 1).unwrap();
        let removed = tiling.relink_collinear(&[2, 0, 1]).unwrap();
        assert_eq!(removed, 2);
        assert!(tiling.are_adjacent(0, 1));
        assert!(tiling.are_adjacent(1, 2));
        assert!(!tiling.are_adjacent(0, 2));
    }

    #[test]
    fn claims_are_first_writer_wins() {
        let mut tiling = line_tiling();
        tiling.add_edge(0, 1).unwrap();
        assert!(tiling.claim_rail(0, 1, 3));
        assert!(!tiling.claim_rail(1, 0, 1));
        assert_eq!(tiling.rail(1, 0).unwrap().used, 3);
    }

    #[test]
    fn move_vertex_updates_indexes() {
        let mut tiling = line_tiling();
        let mut locations = LocationIndex::new();
        let j = tiling.insert_vertex_dedup(p(5, 5), &mut locations).unwrap();
        tiling.add_edge(0, j).unwrap();
        tiling.move_vertex(j, p(6, 5)).unwrap();
        assert_eq!(tiling.vertex_at(p(6, 5)), Some(j));
        assert_eq!(tiling.vertex_at(p(5, 5)), None);
        assert_eq!(tiling.rails_in_region(p(6, 5), p(6, 5)), vec![(0, j)]);
        assert!(tiling.move_vertex(j, p(10, 0)).is_err());
    }

    #[test]
    fn merge_moves_rails_onto_keeper() {
        let mut tiling = Tiling::new(&[p(0, 0), p(5, 0), p(5, 5)], TilingLimits::default()).unwrap();
        let mut locations = LocationIndex::new();
        let j = tiling.insert_vertex_dedup(p(9, 9), &mut locations).unwrap();
        tiling.add_edge(j, 2).unwrap();
        tiling.add_edge(j, 0).unwrap();
        tiling.merge_vertex_into(j, 1).unwrap();
        assert!(!tiling.is_live(j));
        assert!(tiling.are_adjacent(1, 2));
        assert!(tiling.are_adjacent(1, 0));
        assert!(tiling.check_symmetry().is_empty());
    }

    #[test]
    fn components_are_labelled() {
        let mut tiling = Tiling::new(&[p(0, 0), p(1, 0), p(5, 5)], TilingLimits::default()).unwrap();
        tiling.add_edge(0, 1).unwrap();
        assert_eq!(tiling.label_components(), 2);
        assert_eq!(tiling.vertex(0).component, tiling.vertex(1).component);
        assert_ne!(tiling.vertex(0).component, tiling.vertex(2).component);
    }
}
