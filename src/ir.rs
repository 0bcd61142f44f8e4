use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{MeshError, Result};
use crate::mesh::{Bounds, GridPoint, LogicalEdge, VertexId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub weight: Option<f64>,
    pub zoom_level: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    pub zoom_level: Option<u32>,
}

/// The graph to embed: integer node positions inside `(0, 0)`–`(width, height)`
/// plus the edges to route between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshInput {
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

impl MeshInput {
    /// Parses strict JSON, falling back to JSON5 so hand-written graphs may
    /// carry comments and trailing commas. The strict error is reported when
    /// both fail.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        match serde_json::from_str(text) {
            Ok(input) => Ok(input),
            Err(err) => json5::from_str(text).map_err(|_| err),
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.width, self.height)
    }

    /// Node positions in declaration order; index `i` becomes vertex `i`.
    pub fn points(&self) -> Vec<GridPoint> {
        self.nodes.iter().map(|n| GridPoint::new(n.x, n.y)).collect()
    }

    /// Checks the box, node placement and id uniqueness. Position clashes
    /// are reported when the tiling is created.
    pub fn validate(&self) -> Result<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(MeshError::EmptyBox);
        }
        let bounds = self.bounds();
        for node in &self.nodes {
            if !bounds.contains(GridPoint::new(node.x, node.y)) {
                return Err(MeshError::OutOfBounds { x: node.x, y: node.y });
            }
        }
        self.node_ids().map(|_| ())
    }

    fn node_ids(&self) -> Result<HashMap<&str, VertexId>> {
        let mut ids = HashMap::with_capacity(self.nodes.len());
        for (idx, node) in self.nodes.iter().enumerate() {
            if ids.insert(node.id.as_str(), idx).is_some() {
                return Err(MeshError::DuplicateNodeId(node.id.clone()));
            }
        }
        Ok(ids)
    }

    /// Edges with node ids resolved to vertex ids.
    pub fn logical_edges(&self) -> Result<Vec<LogicalEdge>> {
        let ids = self.node_ids()?;
        let lookup = |id: &str| {
            ids.get(id)
                .copied()
                .ok_or_else(|| MeshError::UnknownNode(id.to_string()))
        };
        self.edges
            .iter()
            .map(|edge| {
                Ok(LogicalEdge {
                    from: lookup(&edge.from)?,
                    to: lookup(&edge.to)?,
                    zoom_level: edge.zoom_level,
                })
            })
            .collect()
    }
}
