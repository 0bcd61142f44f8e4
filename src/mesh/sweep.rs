//! Sweep-based mesh construction.
//!
//! Instead of growing rays one unit at a time, each ray's stopping point is
//! resolved directly:
//!
//! * horizontal rays stop at the column of the closest diagonal-cone
//!   neighbor, whose own vertical ray would have crossed the row first;
//! * vertical rays are resolved by sweeping rows of horizontal rails in `y`
//!   order while an x-ordered map holds the points whose rays are still open.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info};

use crate::error::{MeshError, Result};

use super::consolidate::{ConsolidationReport, fix_mesh, wire_box};
use super::neighbors::{Cone, cone_nearest_neighbors};
use super::tiling::{LocationIndex, Tiling};
use super::types::{Bounds, GridPoint, VertexId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FastBuildReport {
    pub junctions: usize,
    pub horizontal_rays: usize,
    pub vertical_hits: usize,
    pub consolidation: ConsolidationReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn cones(self) -> [Cone; 2] {
        match self {
            Side::Left => [Cone::LeftUp, Cone::LeftDown],
            Side::Right => [Cone::RightUp, Cone::RightDown],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sweep {
    Upward,
    Downward,
}

pub fn build_fast_mesh(tiling: &mut Tiling, bounds: Bounds) -> Result<FastBuildReport> {
    if bounds.max_x <= 0 || bounds.max_y <= 0 {
        return Err(MeshError::EmptyBox);
    }
    let originals: Vec<GridPoint> = (0..tiling.original_count()).map(|id| tiling.pos(id)).collect();
    if let Some(p) = originals.iter().find(|p| !bounds.contains(**p)) {
        return Err(MeshError::OutOfBounds { x: p.x, y: p.y });
    }
    let before = tiling.vertex_count();
    tiling.enable_rail_registry();

    let mut builder = FastBuilder {
        tiling,
        bounds,
        locations: originals.iter().copied().zip(0..).collect(),
        pending: BTreeSet::new(),
        report: FastBuildReport::default(),
    };
    let built = builder.run(&originals);
    let mut report = builder.report;
    tiling.disable_rail_registry();
    built?;

    report.consolidation = fix_mesh(tiling, &[])?;
    report.junctions = tiling.vertex_count() - before;
    info!(
        "fast mesh: {} originals, {} junctions, {} rails",
        originals.len(),
        report.junctions,
        tiling.edges().len()
    );
    Ok(report)
}

struct FastBuilder<'a> {
    tiling: &'a mut Tiling,
    bounds: Bounds,
    locations: LocationIndex,
    /// Stop junctions of horizontal rays that still need vertical rails.
    pending: BTreeSet<VertexId>,
    report: FastBuildReport,
}

impl FastBuilder<'_> {
    fn run(&mut self, originals: &[GridPoint]) -> Result<()> {
        wire_box(self.tiling, self.bounds, &mut self.locations)?;

        let nearest: HashMap<Cone, Vec<Option<usize>>> = Cone::ALL
            .into_iter()
            .map(|cone| (cone, cone_nearest_neighbors(originals, cone)))
            .collect();
        for side in [Side::Left, Side::Right] {
            for v in 0..originals.len() {
                let candidates = side.cones().map(|cone| nearest[&cone][v]);
                self.horizontal_ray(v, side, candidates)?;
            }
        }
        self.consolidate_rows()?;

        let mut sources: Vec<VertexId> = (0..originals.len())
            .filter(|&v| !self.bounds.on_vertical_side(originals[v]))
            .collect();
        sources.extend(self.pending.iter().copied().filter(|&j| self.tiling.is_live(j)));
        self.vertical_sweep(&sources, Sweep::Upward)?;
        self.vertical_sweep(&sources, Sweep::Downward)?;
        debug!(
            "fast mesh: {} horizontal rays, {} vertical hits",
            self.report.horizontal_rays, self.report.vertical_hits
        );
        Ok(())
    }

    fn horizontal_ray(&mut self, v: VertexId, side: Side, candidates: [Option<usize>; 2]) -> Result<()> {
        let origin = self.tiling.pos(v);
        let blocked = match side {
            Side::Left => origin.x == 0,
            Side::Right => origin.x == self.bounds.max_x,
        };
        if blocked || self.bounds.on_horizontal_side(origin) {
            return Ok(());
        }
        self.report.horizontal_rays += 1;

        // The column reached first wins; a same-row neighbor wins ties.
        let neighbor = candidates
            .into_iter()
            .flatten()
            .min_by_key(|&w| {
                let pw = self.tiling.pos(w);
                ((pw.x - origin.x).abs(), (pw.y - origin.y).abs(), w)
            });

        if let Some(w) = neighbor
            && self.tiling.pos(w).y == origin.y
        {
            let stop = self.collinear_chain_end(w, origin);
            self.tiling.add_edge(v, stop)?;
            return Ok(());
        }

        let column = match (neighbor, side) {
            (Some(w), _) => self.tiling.pos(w).x,
            (None, Side::Left) => 0,
            (None, Side::Right) => self.bounds.max_x,
        };
        let stop_at = GridPoint::new(column, origin.y);
        let stop = match self.tiling.vertex_at(stop_at) {
            Some(existing) => existing,
            None => {
                let spanning = self.vertical_rail_spanning(column, origin.y);
                let junction = self.tiling.insert_vertex_dedup(stop_at, &mut self.locations)?;
                match spanning {
                    Some((a, b)) => {
                        self.tiling.split_rail(a, b, &[junction])?;
                    }
                    None => {
                        self.pending.insert(junction);
                    }
                }
                junction
            }
        };
        self.tiling.add_edge(v, stop)?;
        Ok(())
    }

    /// Walks from `w` along its own row towards `origin` while the next
    /// collinear neighbor stays strictly between the two.
    fn collinear_chain_end(&self, w: VertexId, origin: GridPoint) -> VertexId {
        let mut current = w;
        loop {
            let here = self.tiling.pos(current);
            let next = self.tiling.neighbors(current).find(|&n| {
                let pn = self.tiling.pos(n);
                pn.y == origin.y && pn.x > here.x.min(origin.x) && pn.x < here.x.max(origin.x)
            });
            match next {
                Some(n) => current = n,
                None => return current,
            }
        }
    }

    fn vertical_rail_spanning(&self, x: i32, y: i32) -> Option<(VertexId, VertexId)> {
        let registry = self.tiling.rail_registry()?;
        registry.column(x).into_iter().find(|&(a, b)| {
            let (ya, yb) = (self.tiling.pos(a).y, self.tiling.pos(b).y);
            ya.min(yb) < y && y < ya.max(yb)
        })
    }

    /// Re-links each row so overlapping rays collapse into consecutive rails.
    fn consolidate_rows(&mut self) -> Result<()> {
        let rows = match self.tiling.rail_registry() {
            Some(registry) => registry.rows(),
            None => return Ok(()),
        };
        for y in rows {
            let rails = self.rails_on_row(y);
            let mut spans: Vec<(i32, i32, usize)> = Vec::new();
            let mut intervals: Vec<(i32, i32)> = rails
                .iter()
                .map(|&(a, b)| {
                    let (xa, xb) = (self.tiling.pos(a).x, self.tiling.pos(b).x);
                    (xa.min(xb), xa.max(xb))
                })
                .collect();
            intervals.sort_unstable();
            for (lo, hi) in intervals {
                match spans.last_mut() {
                    Some(last) if lo <= last.1 => {
                        last.1 = last.1.max(hi);
                        last.2 += 1;
                    }
                    _ => spans.push((lo, hi, 1)),
                }
            }
            for (lo, hi, rail_count) in spans {
                let ids = self.tiling.query_region(GridPoint::new(lo, y), GridPoint::new(hi, y));
                if !self.is_consecutive(&ids, rail_count) {
                    self.tiling.relink_collinear(&ids)?;
                }
            }
        }
        Ok(())
    }

    fn rails_on_row(&self, y: i32) -> Vec<(VertexId, VertexId)> {
        self.tiling
            .rail_registry()
            .map(|registry| registry.row(y))
            .unwrap_or_default()
    }

    fn is_consecutive(&self, ids: &[VertexId], rail_count: usize) -> bool {
        let mut sorted = ids.to_vec();
        sorted.sort_by_key(|&id| self.tiling.pos(id));
        rail_count + 1 == sorted.len() && sorted.windows(2).all(|w| self.tiling.are_adjacent(w[0], w[1]))
    }

    /// Closes vertical rays of `sources` against the horizontal rails.
    ///
    /// Rows are visited in sweep order. Each row first captures every open
    /// point inside one of its rails (subdividing the rail), then the row's
    /// own sources open their rays.
    fn vertical_sweep(&mut self, sources: &[VertexId], sweep: Sweep) -> Result<()> {
        let mut by_row: BTreeMap<i32, Vec<VertexId>> = BTreeMap::new();
        for &s in sources {
            by_row.entry(self.tiling.pos(s).y).or_default().push(s);
        }
        let mut levels: BTreeSet<i32> = by_row.keys().copied().collect();
        if let Some(registry) = self.tiling.rail_registry() {
            levels.extend(registry.rows());
        }
        let levels: Vec<i32> = match sweep {
            Sweep::Upward => levels.into_iter().collect(),
            Sweep::Downward => levels.into_iter().rev().collect(),
        };

        let mut open: BTreeMap<i32, VertexId> = BTreeMap::new();
        for y in levels {
            for (a, b) in self.rails_on_row(y) {
                self.capture(&mut open, a, b)?;
            }
            for &s in by_row.get(&y).map(Vec::as_slice).unwrap_or_default() {
                let ps = self.tiling.pos(s);
                if let Some(below) = open.remove(&ps.x) {
                    self.tiling.add_edge(below, s)?;
                    self.report.vertical_hits += 1;
                }
                let has_room = match sweep {
                    Sweep::Upward => ps.y < self.bounds.max_y,
                    Sweep::Downward => ps.y > 0,
                };
                if has_room {
                    open.insert(ps.x, s);
                }
            }
        }
        Ok(())
    }

    fn capture(&mut self, open: &mut BTreeMap<i32, VertexId>, a: VertexId, b: VertexId) -> Result<()> {
        if !self.tiling.are_adjacent(a, b) {
            return Ok(());
        }
        let (pa, pb) = (self.tiling.pos(a), self.tiling.pos(b));
        let (lo, hi) = (pa.x.min(pb.x), pa.x.max(pb.x));
        let hits: Vec<(i32, VertexId)> = open.range(lo..=hi).map(|(&x, &v)| (x, v)).collect();
        if hits.is_empty() {
            return Ok(());
        }
        let mut stops = Vec::with_capacity(hits.len());
        for &(x, source) in &hits {
            open.remove(&x);
            let stop = self
                .tiling
                .insert_vertex_dedup(GridPoint::new(x, pa.y), &mut self.locations)?;
            stops.push((source, stop));
        }
        let mut through: Vec<VertexId> = stops
            .iter()
            .map(|&(_, stop)| stop)
            .filter(|&stop| stop != a && stop != b)
            .collect();
        if pa.x > pb.x {
            through.reverse();
        }
        if !through.is_empty() {
            self.tiling.split_rail(a, b, &through)?;
        }
        for (source, stop) in stops {
            self.tiling.add_edge(source, stop)?;
            self.report.vertical_hits += 1;
        }
        Ok(())
    }
}
