//! Rail weights: every weighted node spreads a Gaussian halo over the rails
//! reachable from it, nearest rails first.

use std::collections::{HashSet, VecDeque};
use std::f64::consts::PI;

use log::debug;

use super::geometry::length;
use super::tiling::Tiling;
use super::types::VertexId;

const HALO_SIGMA: f64 = 15.0;
const HALO_PEAK: f64 = 50.0;
const HALO_FLOOR: f64 = 0.0001;
/// Added to the rails that start at the weighted node itself.
const SOURCE_RAIL_WEIGHT: f64 = 1000.0;
/// The search from one node is abandoned once its queue grows past this.
const MAX_FRONTIER: usize = 200;

fn gaussian(d: f64) -> f64 {
    HALO_PEAK * (-(d * d) / (2.0 * HALO_SIGMA * HALO_SIGMA)).exp() / (HALO_SIGMA * (2.0 * PI).sqrt())
}

/// Weight `source` adds to the rail `from`–`to`.
pub fn halo(tiling: &Tiling, source: VertexId, from: VertexId, to: VertexId) -> f64 {
    if source == from {
        return SOURCE_RAIL_WEIGHT;
    }
    let at = tiling.pos(source);
    (gaussian(length(at, tiling.pos(from))) + gaussian(length(at, tiling.pos(to)))) / 2.0 + HALO_FLOOR
}

/// Recomputes every rail weight from zero by a breadth-first search out of
/// each node with a non-zero weight. Returns the heaviest rail.
pub fn compute_rail_weights(tiling: &mut Tiling) -> f64 {
    tiling.reset_rail_weights();
    let sources: Vec<VertexId> = tiling
        .live_vertices()
        .filter(|&v| tiling.vertex(v).weight != 0.0)
        .collect();
    let mut heaviest = 0.0f64;
    for &source in &sources {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([source]);
        'search: while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let neighbors: Vec<VertexId> = tiling.neighbors(current).collect();
            for next in neighbors {
                if visited.contains(&next) {
                    continue;
                }
                queue.push_back(next);
                if queue.len() > MAX_FRONTIER {
                    break 'search;
                }
                tiling.add_rail_weight(current, next, halo(tiling, source, current, next));
                if let Some(rail) = tiling.rail(current, next) {
                    heaviest = heaviest.max(rail.weight);
                }
            }
        }
    }
    debug!("rail weights from {} weighted nodes, heaviest {heaviest:.3}", sources.len());
    heaviest
}
