use thiserror::Error;

use crate::mesh::VertexId;

/// Errors surfaced to callers of the mesh pipeline.
///
/// Geometric degeneracies and unreachable routes are not errors; they are
/// reported through `Collision` and `RouteStatus` and the pipeline keeps going.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("vertex capacity exceeded (limit {limit})")]
    CapacityExceeded { limit: usize },
    #[error("vertex {vertex} exceeds the degree limit of {limit}")]
    DegreeExceeded { vertex: VertexId, limit: usize },
    #[error("two nodes share the grid position ({x}, {y})")]
    DuplicateVertex { x: i32, y: i32 },
    #[error("node at ({x}, {y}) lies outside the bounding box")]
    OutOfBounds { x: i32, y: i32 },
    #[error("node id '{0}' is declared more than once")]
    DuplicateNodeId(String),
    #[error("edge references unknown node '{0}'")]
    UnknownNode(String),
    #[error("vertex id {0} is not a live vertex")]
    InvalidVertex(VertexId),
    #[error("bounding box must have a positive width and height")]
    EmptyBox,
}

pub type Result<T> = std::result::Result<T, MeshError>;
