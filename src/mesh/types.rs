use serde::{Deserialize, Serialize};

/// Stable handle into the tiling's vertex arena.
pub type VertexId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn to_f64(self) -> (f64, f64) {
        (f64::from(self.x), f64::from(self.y))
    }

    pub fn manhattan(self, other: GridPoint) -> i64 {
        i64::from((self.x - other.x).abs()) + i64::from((self.y - other.y).abs())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub pos: GridPoint,
    pub weight: f64,
    pub zoom_level: u32,
    pub invalid: bool,
    /// Filled by `Tiling::label_components`; nothing else reads it.
    pub component: u32,
}

impl Vertex {
    pub fn new(pos: GridPoint) -> Self {
        Self {
            pos,
            weight: 0.0,
            zoom_level: 0,
            invalid: false,
            component: 0,
        }
    }
}

/// One half of an undirected rail, stored in the adjacency of its tail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rail {
    pub target: VertexId,
    /// Halo left by nearby weighted nodes, filled by `compute_rail_weights`.
    pub weight: f64,
    /// Zoom level of the first route that selected this rail, 0 when unclaimed.
    pub selected: u32,
    /// Zoom level of the first route that used this rail, 0 when unclaimed.
    pub used: u32,
}

impl Rail {
    pub fn new(target: VertexId) -> Self {
        Self {
            target,
            weight: 0.0,
            selected: 0,
            used: 0,
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.used != 0 || self.selected != 0
    }
}

/// Zoom claim carried by a rail, copied along when rails are split or merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RailMarks {
    pub selected: u32,
    pub used: u32,
}

impl RailMarks {
    pub const UNCLAIMED: RailMarks = RailMarks { selected: 0, used: 0 };

    pub fn new(selected: u32, used: u32) -> Self {
        Self { selected, used }
    }

    /// Keeps the coarsest non-zero claim of the two.
    pub fn merge(self, other: RailMarks) -> RailMarks {
        fn coarsest(a: u32, b: u32) -> u32 {
            match (a, b) {
                (0, b) => b,
                (a, 0) => a,
                (a, b) => a.min(b),
            }
        }
        RailMarks {
            selected: coarsest(self.selected, other.selected),
            used: coarsest(self.used, other.used),
        }
    }
}

/// Canonical undirected key of a rail: smaller id first.
pub fn rail_key(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Bounding box `(0, 0)`–`(max_x, max_y)` the mesh is built inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub max_x: i32,
    pub max_y: i32,
}

impl Bounds {
    pub fn new(max_x: i32, max_y: i32) -> Self {
        Self { max_x, max_y }
    }

    pub fn contains(&self, p: GridPoint) -> bool {
        p.x >= 0 && p.y >= 0 && p.x <= self.max_x && p.y <= self.max_y
    }

    pub fn on_vertical_side(&self, p: GridPoint) -> bool {
        p.x == 0 || p.x == self.max_x
    }

    pub fn on_horizontal_side(&self, p: GridPoint) -> bool {
        p.y == 0 || p.y == self.max_y
    }

    pub fn corners(&self) -> [GridPoint; 4] {
        [
            GridPoint::new(0, 0),
            GridPoint::new(0, self.max_y),
            GridPoint::new(self.max_x, self.max_y),
            GridPoint::new(self.max_x, 0),
        ]
    }
}
