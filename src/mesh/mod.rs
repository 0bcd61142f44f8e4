//! Rectilinear routing mesh: construction, planar clean-up, routing,
//! refinement and rail weights.

mod competition;
mod consolidate;
pub mod geometry;
mod neighbors;
mod planar;
mod rails;
mod refine;
mod router;
mod simplify;
mod spatial;
mod sweep;
mod tiling;
pub(crate) mod types;
mod weights;

pub use competition::{Collision, CompetitionReport, GrowthPriority, build_competition_mesh};
pub use consolidate::{ConsolidationReport, fix_mesh};
pub use neighbors::{Cone, cone_nearest_neighbors};
pub use planar::{
    Embedding, Face, bounded_faces, embed_planar, face_width, next_clockwise_neighbor,
    rails_avoid_vertices, remove_long_edge_from_thin_faces, right_face,
};
pub use rails::{Axis, RailRegistry};
pub use refine::{
    Contraction, ContractionConfig, Elision, ElisionConfig, PositionConfig, PositionObjective,
    add_detour_rings, contract_short_rails, elide_degree_two, optimize_positions,
};
pub use router::{
    DEFAULT_DISCOURAGE_PENALTY, LogicalEdge, RailWeight, RouteBook, RouteOutcome, RouteQuery,
    RouteStatus, SearchPhase, claim_first_writer, discouraged_weight, route, route_edges,
    shortest_path,
};
pub use simplify::simplify_polyline;
pub use sweep::{FastBuildReport, build_fast_mesh};
pub use tiling::{DEFAULT_MAX_DEGREE, LocationIndex, Tiling, TilingLimits, TilingStats};
pub use types::*;
pub use weights::{compute_rail_weights, halo};

use log::{info, warn};
use serde::Serialize;

use crate::config::{MeshConfig, MeshStrategy};
use crate::error::Result;
use crate::ir::MeshInput;

/// Counters collected while building one mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStats {
    pub originals: usize,
    pub junctions: usize,
    pub rails: usize,
    pub claimed_rails: usize,
    pub components: usize,
    pub embedding_consistent: bool,
    pub thin_rails_removed: usize,
    pub routed: usize,
    pub unrouted: usize,
    pub detour_diagonals: usize,
    pub elided: usize,
    pub contracted: usize,
    pub moves: usize,
    pub heaviest_rail_weight: f64,
}

/// Everything the pipeline produced for one input.
#[derive(Debug)]
pub struct MeshLayout {
    pub bounds: Bounds,
    pub tiling: Tiling,
    pub routes: RouteBook,
    /// One simplified polyline per input edge, empty when unrouted.
    pub polylines: Vec<Vec<(f64, f64)>>,
    pub stats: BuildStats,
}

/// Builds the mesh, routes every edge over it and tidies the result.
pub fn compute_mesh(input: &MeshInput, config: &MeshConfig) -> Result<MeshLayout> {
    input.validate()?;
    let bounds = input.bounds();
    let edges = input.logical_edges()?;
    let mut tiling = Tiling::new(&input.points(), config.limits.into())?;
    for (id, node) in input.nodes.iter().enumerate() {
        tiling.set_attributes(id, node.weight.unwrap_or(0.0), node.zoom_level.unwrap_or(0));
    }

    info!(
        "building {:?} mesh: {} nodes, {} edges, box {}x{}",
        config.strategy,
        input.nodes.len(),
        edges.len(),
        bounds.max_x,
        bounds.max_y
    );
    match config.strategy {
        MeshStrategy::Fast => {
            build_fast_mesh(&mut tiling, bounds)?;
        }
        MeshStrategy::Competition => {
            build_competition_mesh(&mut tiling, bounds, GrowthPriority::Uniform)?;
        }
        MeshStrategy::CompetitionLeftPriority => {
            build_competition_mesh(&mut tiling, bounds, GrowthPriority::LeftPriority)?;
        }
    }

    let embedding = embed_planar(&mut tiling);
    let thin_rails_removed = if config.remove_thin_faces {
        remove_long_edge_from_thin_faces(&mut tiling, config.thinness)
    } else {
        0
    };
    if !rails_avoid_vertices(&tiling) {
        warn!("a rail passes through a vertex it does not end at");
    }
    let detour_diagonals = if config.detour {
        add_detour_rings(&mut tiling)?
    } else {
        0
    };

    let mut routes = route_edges(&mut tiling, &edges, config.discourage_penalty);

    let (mut elided, mut contracted, mut moves) = (0, 0, 0);
    if config.refine {
        let elisions = elide_degree_two(&mut tiling, &config.elision)?;
        routes.apply_elisions(&elisions);
        elided = elisions.len();
        let contractions = contract_short_rails(&mut tiling, &config.contraction)?;
        routes.apply_contractions(&contractions);
        contracted = contractions.len();
        if config.optimize_positions {
            moves = optimize_positions(&mut tiling, bounds, &config.positions)?;
        }
    }
    routes.refresh_lengths(&tiling);
    let heaviest_rail_weight = compute_rail_weights(&mut tiling);

    let polylines = routes
        .paths
        .iter()
        .map(|path| {
            let points: Vec<(f64, f64)> = path.iter().map(|&v| tiling.pos(v).to_f64()).collect();
            simplify_polyline(&points, config.simplify_epsilon)
        })
        .collect();

    let components = tiling.label_components();
    let totals = tiling.stats();
    let stats = BuildStats {
        originals: totals.originals,
        junctions: totals.junctions,
        rails: totals.rails,
        claimed_rails: totals.claimed_rails,
        components,
        embedding_consistent: embedding.consistent,
        thin_rails_removed,
        routed: routes.found(),
        unrouted: edges.len() - routes.found(),
        detour_diagonals,
        elided,
        contracted,
        moves,
        heaviest_rail_weight,
    };
    info!(
        "mesh ready: {} junctions, {} rails, {}/{} edges routed",
        stats.junctions,
        stats.rails,
        stats.routed,
        edges.len()
    );

    Ok(MeshLayout {
        bounds,
        tiling,
        routes,
        polylines,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{EdgeSpec, NodeSpec};

    fn node(id: &str, x: i32, y: i32) -> NodeSpec {
        NodeSpec {
            id: id.into(),
            x,
            y,
            weight: None,
            zoom_level: None,
        }
    }

    fn edge(from: &str, to: &str) -> EdgeSpec {
        EdgeSpec {
            from: from.into(),
            to: to.into(),
            zoom_level: None,
        }
    }

    fn corner_input() -> MeshInput {
        MeshInput {
            width: 10,
            height: 10,
            nodes: vec![node("a", 0, 0), node("b", 10, 0), node("c", 10, 10)],
            edges: vec![edge("a", "c")],
        }
    }

    #[test]
    fn unrefined_corner_route_has_length_twenty() {
        let config = MeshConfig {
            refine: false,
            ..MeshConfig::default()
        };
        let layout = compute_mesh(&corner_input(), &config).unwrap();
        assert_eq!(layout.routes.statuses, vec![RouteStatus::Found]);
        assert_eq!(layout.routes.lengths[0], 20.0);
        let line = &layout.polylines[0];
        assert_eq!(line.first(), Some(&(0.0, 0.0)));
        assert_eq!(line.last(), Some(&(10.0, 10.0)));
        assert_eq!(line.len(), 3);
        assert!(layout.stats.embedding_consistent);
    }

    #[test]
    fn every_strategy_routes_the_corner_case() {
        for strategy in [
            MeshStrategy::Fast,
            MeshStrategy::Competition,
            MeshStrategy::CompetitionLeftPriority,
        ] {
            let config = MeshConfig {
                strategy,
                ..MeshConfig::default()
            };
            let layout = compute_mesh(&corner_input(), &config).unwrap();
            assert_eq!(layout.stats.routed, 1, "{strategy:?}");
            let path = layout.routes.path(0);
            assert_eq!((path[0], path[path.len() - 1]), (0, 2));
            assert!(layout.tiling.check_symmetry().is_empty());
        }
    }

    #[test]
    fn routes_survive_refinement() {
        let layout = compute_mesh(&corner_input(), &MeshConfig::default()).unwrap();
        let path = layout.routes.path(0);
        for pair in path.windows(2) {
            assert!(layout.tiling.are_adjacent(pair[0], pair[1]));
        }
        let expected: f64 = path.windows(2).map(|w| layout.tiling.rail_length(w[0], w[1])).sum();
        assert_eq!(layout.routes.lengths[0], expected);
    }

    #[test]
    fn invalid_inputs_fail_before_building() {
        let mut input = corner_input();
        input.edges.push(edge("a", "nowhere"));
        assert_eq!(
            compute_mesh(&input, &MeshConfig::default()).unwrap_err(),
            crate::error::MeshError::UnknownNode("nowhere".into())
        );
    }

    #[test]
    fn detour_rings_are_opt_in() {
        // A hub in the middle of the box has rails in all four directions.
        let mut input = corner_input();
        input.nodes.push(node("hub", 5, 5));
        input.edges = vec![edge("a", "hub")];
        let plain = compute_mesh(&input, &MeshConfig::default()).unwrap();
        assert_eq!(plain.stats.detour_diagonals, 0);
        let config = MeshConfig {
            detour: true,
            refine: false,
            ..MeshConfig::default()
        };
        let ringed = compute_mesh(&input, &config).unwrap();
        assert!(ringed.stats.detour_diagonals > 0);
        assert_eq!(ringed.stats.routed, 1);
        assert!(ringed.tiling.check_symmetry().is_empty());
    }

    #[test]
    fn weighted_nodes_leave_a_halo() {
        let mut input = corner_input();
        input.nodes[1].weight = Some(2.0);
        let layout = compute_mesh(&input, &MeshConfig::default()).unwrap();
        assert!(layout.stats.heaviest_rail_weight >= 1000.0);
        let layout = compute_mesh(&corner_input(), &MeshConfig::default()).unwrap();
        assert_eq!(layout.stats.heaviest_rail_weight, 0.0);
    }
}
