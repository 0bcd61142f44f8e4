use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::mesh::{
    ContractionConfig, DEFAULT_DISCOURAGE_PENALTY, DEFAULT_MAX_DEGREE, ElisionConfig, PositionConfig,
    TilingLimits,
};

/// How the rectilinear mesh is grown around the nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeshStrategy {
    /// Cone-neighbor rays plus a vertical sweep, `O(n log n)` expected.
    #[default]
    Fast,
    /// Ray-by-ray growth; every hitting ray stops.
    Competition,
    /// Ray-by-ray growth where rays heading right or down cross what they hit.
    CompetitionLeftPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimitsConfig {
    pub max_vertices: Option<usize>,
    pub max_degree: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_vertices: None,
            max_degree: DEFAULT_MAX_DEGREE,
        }
    }
}

impl From<LimitsConfig> for TilingLimits {
    fn from(limits: LimitsConfig) -> Self {
        TilingLimits {
            max_vertices: limits.max_vertices,
            max_degree: limits.max_degree,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshConfig {
    pub strategy: MeshStrategy,
    pub limits: LimitsConfig,
    /// Junction-only faces narrower than this lose their longest rail.
    pub thinness: f64,
    pub remove_thin_faces: bool,
    /// Extra cost for routing over a rail another edge already claimed.
    pub discourage_penalty: f64,
    /// Rings every node with junctions and diagonal rails before routing.
    pub detour: bool,
    /// Runs elision, contraction and position optimization after routing.
    pub refine: bool,
    pub elision: ElisionConfig,
    pub contraction: ContractionConfig,
    pub optimize_positions: bool,
    pub positions: PositionConfig,
    /// Douglas–Peucker tolerance for the output polylines.
    pub simplify_epsilon: f64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            strategy: MeshStrategy::Fast,
            limits: LimitsConfig::default(),
            thinness: 2.0,
            remove_thin_faces: true,
            discourage_penalty: DEFAULT_DISCOURAGE_PENALTY,
            detour: false,
            refine: true,
            elision: ElisionConfig::default(),
            contraction: ContractionConfig::default(),
            optimize_positions: true,
            positions: PositionConfig::default(),
            simplify_epsilon: 0.5,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ElisionConfigFile {
    separation: Option<f64>,
    angular_resolution: Option<f64>,
    iterations: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ContractionConfigFile {
    min_length: Option<f64>,
    iterations: Option<usize>,
    separation: Option<f64>,
    angular_resolution: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PositionConfigFile {
    objective: Option<crate::mesh::PositionObjective>,
    unit: Option<i32>,
    iterations: Option<usize>,
    separation: Option<f64>,
    angular_resolution: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ConfigFile {
    strategy: Option<MeshStrategy>,
    max_vertices: Option<usize>,
    max_degree: Option<usize>,
    thinness: Option<f64>,
    remove_thin_faces: Option<bool>,
    discourage_penalty: Option<f64>,
    detour: Option<bool>,
    refine: Option<bool>,
    elision: Option<ElisionConfigFile>,
    contraction: Option<ContractionConfigFile>,
    optimize_positions: Option<bool>,
    positions: Option<PositionConfigFile>,
    simplify_epsilon: Option<f64>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<MeshConfig> {
    let mut config = MeshConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;

    if let Some(v) = parsed.strategy {
        config.strategy = v;
    }
    if parsed.max_vertices.is_some() {
        config.limits.max_vertices = parsed.max_vertices;
    }
    if let Some(v) = parsed.max_degree {
        config.limits.max_degree = v;
    }
    if let Some(v) = parsed.thinness {
        config.thinness = v;
    }
    if let Some(v) = parsed.remove_thin_faces {
        config.remove_thin_faces = v;
    }
    if let Some(v) = parsed.discourage_penalty {
        config.discourage_penalty = v;
    }
    if let Some(v) = parsed.detour {
        config.detour = v;
    }
    if let Some(v) = parsed.refine {
        config.refine = v;
    }
    if let Some(v) = parsed.optimize_positions {
        config.optimize_positions = v;
    }
    if let Some(v) = parsed.simplify_epsilon {
        config.simplify_epsilon = v;
    }

    if let Some(elision) = parsed.elision {
        if let Some(v) = elision.separation {
            config.elision.separation = v;
        }
        if let Some(v) = elision.angular_resolution {
            config.elision.angular_resolution = v;
        }
        if let Some(v) = elision.iterations {
            config.elision.iterations = v;
        }
    }

    if let Some(contraction) = parsed.contraction {
        if let Some(v) = contraction.min_length {
            config.contraction.min_length = v;
        }
        if let Some(v) = contraction.iterations {
            config.contraction.iterations = v;
        }
        if let Some(v) = contraction.separation {
            config.contraction.separation = v;
        }
        if let Some(v) = contraction.angular_resolution {
            config.contraction.angular_resolution = v;
        }
    }

    if let Some(positions) = parsed.positions {
        if let Some(v) = positions.objective {
            config.positions.objective = v;
        }
        if let Some(v) = positions.unit {
            config.positions.unit = v;
        }
        if let Some(v) = positions.iterations {
            config.positions.iterations = v;
        }
        if let Some(v) = positions.separation {
            config.positions.separation = v;
        }
        if let Some(v) = positions.angular_resolution {
            config.positions.angular_resolution = v;
        }
    }

    Ok(config)
}
