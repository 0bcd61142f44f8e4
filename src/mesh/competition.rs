//! Competitive ray growth.
//!
//! Every original vertex emits four rays that grow one grid unit per round.
//! When the tip of one ray lands on another ray the two are joined and the
//! hitting ray stops at the end of the round. Rays that reach the box
//! unhindered are wired to its border. The cost is `O(rounds × rays²)`; the
//! sweep builder produces a comparable mesh much faster.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, Result};

use super::consolidate::{ConsolidationReport, fix_mesh, wire_box};
use super::geometry::segment_contains_point_axis_aligned;
use super::rails::Axis;
use super::tiling::{LocationIndex, Tiling};
use super::types::{Bounds, GridPoint, VertexId};

/// Which ray survives an orthogonal hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GrowthPriority {
    /// The hitting ray always stops.
    #[default]
    Uniform,
    /// Rays growing rightwards or downwards cross the rail they hit and keep
    /// growing.
    LeftPriority,
}

/// Outcome of resolving one ray tip landing on another ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    Connected,
    /// Parallel rays whose nearest placed vertices coincide.
    DegenerateParallel,
    /// Orthogonal hit whose back-walk neighbors coincide.
    DegenerateOrthogonal,
    /// Nothing to resolve for this pair in this round.
    Ignored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompetitionReport {
    pub rounds: usize,
    pub connected: usize,
    pub degenerate: usize,
    /// Rays wired to the border after growing into the box.
    pub landed: usize,
    pub consolidation: ConsolidationReport,
}

#[derive(Debug, Clone, Copy)]
struct Ray {
    origin: VertexId,
    start: GridPoint,
    end: GridPoint,
    dx: i32,
    dy: i32,
    alive: bool,
    /// Stopped by a collision rather than by the box.
    blocked: bool,
}

impl Ray {
    fn axis(&self) -> Axis {
        if self.dy == 0 { Axis::Horizontal } else { Axis::Vertical }
    }

    fn contains(&self, p: GridPoint) -> bool {
        segment_contains_point_axis_aligned(self.start, self.end, p)
    }

    /// Continues through the hit rail when left priority applies.
    fn survives_hit(&self, priority: GrowthPriority) -> bool {
        priority == GrowthPriority::LeftPriority && (self.dx > 0 || self.dy < 0)
    }
}

pub fn build_competition_mesh(
    tiling: &mut Tiling,
    bounds: Bounds,
    priority: GrowthPriority,
) -> Result<CompetitionReport> {
    if bounds.max_x <= 0 || bounds.max_y <= 0 {
        return Err(MeshError::EmptyBox);
    }
    let mut rays = Vec::with_capacity(tiling.original_count() * 4);
    for origin in 0..tiling.original_count() {
        let start = tiling.pos(origin);
        if !bounds.contains(start) {
            return Err(MeshError::OutOfBounds { x: start.x, y: start.y });
        }
        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            rays.push(Ray {
                origin,
                start,
                end: start,
                dx,
                dy,
                alive: true,
                blocked: false,
            });
        }
    }

    let mut growth = Growth {
        tiling,
        rays,
        growing: Vec::new(),
        stopping: Vec::new(),
        priority,
        locations: LocationIndex::new(),
        report: CompetitionReport::default(),
    };
    let max_rounds = bounds.max_x.max(bounds.max_y) as usize;
    while growth.report.rounds < max_rounds && growth.grow(bounds) {
        growth.report.rounds += 1;
        growth.resolve_round()?;
    }
    growth.report.landed = growth.land_on_border(bounds)?;
    wire_box(growth.tiling, bounds, &mut growth.locations)?;

    let traced: Vec<(GridPoint, GridPoint)> = growth.rays.iter().map(|r| (r.start, r.end)).collect();
    let mut report = growth.report;
    report.consolidation = fix_mesh(tiling, &traced)?;
    info!(
        "competition mesh: {} rounds, {} connections, {} degenerate, {} landed",
        report.rounds, report.connected, report.degenerate, report.landed
    );
    Ok(report)
}

struct Growth<'a> {
    tiling: &'a mut Tiling,
    rays: Vec<Ray>,
    /// Liveness of each ray when the current round started.
    growing: Vec<bool>,
    /// Rays a collision stopped this round; they retire once every pair is checked.
    stopping: Vec<bool>,
    priority: GrowthPriority,
    locations: LocationIndex,
    report: CompetitionReport,
}

impl Growth<'_> {
    /// Advances every live ray one unit. Returns false once no ray is left.
    fn grow(&mut self, bounds: Bounds) -> bool {
        let mut any = false;
        for ray in self.rays.iter_mut().filter(|r| r.alive) {
            let next = ray.end.offset(ray.dx, ray.dy);
            if bounds.contains(next) {
                ray.end = next;
                any = true;
            } else {
                ray.alive = false;
            }
        }
        any
    }

    fn resolve_round(&mut self) -> Result<()> {
        self.growing = self.rays.iter().map(|r| r.alive).collect();
        self.stopping = vec![false; self.rays.len()];
        for i in 0..self.rays.len() {
            if !self.growing[i] {
                continue;
            }
            for j in 0..self.rays.len() {
                if i == j || self.rays[i].origin == self.rays[j].origin {
                    continue;
                }
                match self.resolve(i, j)? {
                    Collision::Connected => self.report.connected += 1,
                    Collision::DegenerateParallel | Collision::DegenerateOrthogonal => {
                        self.report.degenerate += 1
                    }
                    Collision::Ignored => {}
                }
            }
        }
        for (ray, &stopped) in self.rays.iter_mut().zip(&self.stopping) {
            if stopped {
                ray.alive = false;
                ray.blocked = true;
            }
        }
        Ok(())
    }

    fn resolve(&mut self, i: usize, j: usize) -> Result<Collision> {
        let (hitting, hit) = (self.rays[i], self.rays[j]);
        let tip = hitting.end;
        if !hit.contains(tip) {
            return Ok(Collision::Ignored);
        }
        if hitting.axis() == hit.axis() {
            return self.resolve_parallel(i, j);
        }
        // Tip-to-tip meetings are handled once, by the lower index, provided
        // that ray was still growing when the round began.
        if hit.end == tip && i > j && self.growing[j] {
            return Ok(Collision::Ignored);
        }
        self.resolve_orthogonal(i, j)
    }

    fn resolve_parallel(&mut self, i: usize, j: usize) -> Result<Collision> {
        let (hitting, hit) = (self.rays[i], self.rays[j]);
        if hitting.end == hit.start {
            // The other origin's perpendicular rays resolve this tip.
            return Ok(Collision::Ignored);
        }
        let a = self.closest_towards(hitting.end, hitting.start);
        let b = self.closest_towards(hit.end, hit.start);
        self.stopping[i] = true;
        self.stopping[j] = true;
        match (a, b) {
            (Some(a), Some(b)) if a != b => {
                // The mirrored pair finds the rail already in place.
                if self.tiling.add_edge(a, b)? {
                    Ok(Collision::Connected)
                } else {
                    Ok(Collision::Ignored)
                }
            }
            _ => {
                debug!("degenerate parallel collision at {:?}", hitting.end);
                Ok(Collision::DegenerateParallel)
            }
        }
    }

    fn resolve_orthogonal(&mut self, i: usize, j: usize) -> Result<Collision> {
        let (hitting, hit) = (self.rays[i], self.rays[j]);
        let tip = hitting.end;
        let behind = self.closest_towards(tip, hitting.start);
        if !hitting.survives_hit(self.priority) {
            self.stopping[i] = true;
        }

        if let Some(existing) = self.tiling.vertex_at(tip) {
            if let Some(c) = behind
                && c != existing
            {
                self.tiling.add_edge(c, existing)?;
            }
            return Ok(Collision::Connected);
        }

        let towards_start = self.closest_towards(tip, hit.start);
        let towards_end = if hit.end == tip {
            None
        } else {
            self.closest_towards(tip, hit.end)
        };
        let junction = self.tiling.insert_vertex_dedup(tip, &mut self.locations)?;
        for v in [towards_start, towards_end, behind].into_iter().flatten() {
            self.tiling.add_edge(v, junction)?;
        }
        match (towards_start, towards_end) {
            (Some(a), Some(b)) if a == b => {
                debug!("degenerate orthogonal collision at {tip:?}");
                Ok(Collision::DegenerateOrthogonal)
            }
            (Some(a), Some(b)) => {
                self.tiling.remove_edge(a, b);
                Ok(Collision::Connected)
            }
            _ => Ok(Collision::Connected),
        }
    }

    /// Joins every ray that grew up to the box without being stopped to a
    /// junction on the border. Returns the number of rails added.
    fn land_on_border(&mut self, bounds: Bounds) -> Result<usize> {
        let mut landed = 0;
        for k in 0..self.rays.len() {
            let ray = self.rays[k];
            if ray.blocked || ray.end == ray.start || bounds.contains(ray.end.offset(ray.dx, ray.dy)) {
                continue;
            }
            let behind = self.closest_towards(ray.end, ray.start);
            let junction = self.tiling.insert_vertex_dedup(ray.end, &mut self.locations)?;
            if let Some(b) = behind
                && self.tiling.add_edge(b, junction)?
            {
                landed += 1;
            }
        }
        Ok(landed)
    }

    /// Live vertex on the axis-aligned span from `anchor` to `toward`
    /// (excluding `anchor` itself) that sits closest to `anchor`.
    fn closest_towards(&self, anchor: GridPoint, toward: GridPoint) -> Option<VertexId> {
        let min = GridPoint::new(anchor.x.min(toward.x), anchor.y.min(toward.y));
        let max = GridPoint::new(anchor.x.max(toward.x), anchor.y.max(toward.y));
        self.tiling
            .query_region(min, max)
            .into_iter()
            .filter(|&id| self.tiling.pos(id) != anchor)
            .min_by_key(|&id| (anchor.manhattan(self.tiling.pos(id)), id))
    }
}
