//! Manhattan nearest neighbors restricted to diagonal cones.
//!
//! For a point `p`, the right-up cone holds every `q` with
//! `q.x - p.x >= q.y - p.y >= 0` (excluding `p`). The other three cones are
//! mirror images. Nearest means smallest L1 distance, ties broken by the
//! lower index.
//!
//! Inside the canonical right-up frame the L1 distance is
//! `(q.x + q.y) - (p.x + p.y)`, and membership is dominance in
//! `(x - y, y)`. A divide-and-conquer pass sorted on `x - y` and merged on
//! `y` finds every answer in `O(n log n)`.

use super::types::GridPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cone {
    RightUp,
    RightDown,
    LeftUp,
    LeftDown,
}

impl Cone {
    pub const ALL: [Cone; 4] = [Cone::RightUp, Cone::RightDown, Cone::LeftUp, Cone::LeftDown];

    fn signs(self) -> (i64, i64) {
        match self {
            Cone::RightUp => (1, 1),
            Cone::RightDown => (1, -1),
            Cone::LeftUp => (-1, 1),
            Cone::LeftDown => (-1, -1),
        }
    }

    /// Whether `to` lies in this cone as seen from `from`.
    pub fn contains(self, from: GridPoint, to: GridPoint) -> bool {
        let (sx, sy) = self.signs();
        let dx = sx * i64::from(to.x - from.x);
        let dy = sy * i64::from(to.y - from.y);
        from != to && dx >= dy && dy >= 0
    }
}

#[derive(Clone, Copy)]
struct Flipped {
    x: i64,
    y: i64,
}

impl Flipped {
    fn diagonal(self) -> i64 {
        self.x - self.y
    }

    fn sum(self) -> i64 {
        self.x + self.y
    }
}

/// For every point, the index of its nearest neighbor inside `cone`.
pub fn cone_nearest_neighbors(points: &[GridPoint], cone: Cone) -> Vec<Option<usize>> {
    let (sx, sy) = cone.signs();
    let flipped: Vec<Flipped> = points
        .iter()
        .map(|p| Flipped {
            x: sx * i64::from(p.x),
            y: sy * i64::from(p.y),
        })
        .collect();

    // Every valid answer for `p` sorts strictly before `p` in this order.
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        flipped[b]
            .diagonal()
            .cmp(&flipped[a].diagonal())
            .then_with(|| flipped[b].y.cmp(&flipped[a].y))
            .then_with(|| a.cmp(&b))
    });

    let mut best: Vec<Option<(i64, usize)>> = vec![None; points.len()];
    solve(&order, &flipped, &mut best);
    best.into_iter().map(|entry| entry.map(|(_, idx)| idx)).collect()
}

/// Resolves answers for pairs split across halves, returns `order` sorted by
/// descending flipped `y`.
fn solve(order: &[usize], pts: &[Flipped], best: &mut [Option<(i64, usize)>]) -> Vec<usize> {
    if order.len() <= 1 {
        return order.to_vec();
    }
    let mid = order.len() / 2;
    let left = solve(&order[..mid], pts, best);
    let right = solve(&order[mid..], pts, best);

    let mut running: Option<(i64, usize)> = None;
    let mut i = 0;
    for &p in &right {
        while i < left.len() && pts[left[i]].y >= pts[p].y {
            let candidate = (pts[left[i]].sum(), left[i]);
            if running.is_none_or(|current| candidate < current) {
                running = Some(candidate);
            }
            i += 1;
        }
        if let Some(candidate) = running
            && best[p].is_none_or(|current| candidate < current)
        {
            best[p] = Some(candidate);
        }
    }

    let mut merged = Vec::with_capacity(order.len());
    let (mut l, mut r) = (0, 0);
    while l < left.len() && r < right.len() {
        if pts[left[l]].y >= pts[right[r]].y {
            merged.push(left[l]);
            l += 1;
        } else {
            merged.push(right[r]);
            r += 1;
        }
    }
    merged.extend_from_slice(&left[l..]);
    merged.extend_from_slice(&right[r..]);
    merged
}
