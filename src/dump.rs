use crate::ir::MeshInput;
use crate::mesh::{BuildStats, MeshLayout, RouteStatus, VertexId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshDump {
    pub width: i32,
    pub height: i32,
    pub vertices: Vec<VertexDump>,
    pub rails: Vec<RailDump>,
    pub routes: Vec<RouteDump>,
    /// Junction id → indices of the routes passing through it.
    pub junctions: BTreeMap<VertexId, Vec<usize>>,
    pub stats: BuildStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexDump {
    pub id: VertexId,
    pub x: i32,
    pub y: i32,
    pub original: bool,
    pub weight: f64,
    pub zoom_level: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RailDump {
    pub from: VertexId,
    pub to: VertexId,
    pub selected: u32,
    pub used: u32,
    pub weight: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDump {
    pub from: String,
    pub to: String,
    pub status: RouteStatus,
    pub length: f64,
    pub path: Vec<VertexId>,
    pub points: Vec<[f64; 2]>,
}

impl MeshDump {
    pub fn from_layout(layout: &MeshLayout, input: &MeshInput) -> Self {
        let tiling = &layout.tiling;
        let vertices = tiling
            .live_vertices()
            .map(|id| {
                let vertex = tiling.vertex(id);
                VertexDump {
                    id,
                    x: vertex.pos.x,
                    y: vertex.pos.y,
                    original: tiling.is_original(id),
                    weight: vertex.weight,
                    zoom_level: vertex.zoom_level,
                }
            })
            .collect();

        let rails = tiling
            .edges()
            .into_iter()
            .map(|(from, to)| {
                let marks = tiling.rail_marks(from, to).unwrap_or_default();
                RailDump {
                    from,
                    to,
                    selected: marks.selected,
                    used: marks.used,
                    weight: tiling.rail(from, to).map_or(0.0, |rail| rail.weight),
                }
            })
            .collect();

        let routes = input
            .edges
            .iter()
            .enumerate()
            .map(|(idx, edge)| RouteDump {
                from: edge.from.clone(),
                to: edge.to.clone(),
                status: layout.routes.statuses[idx],
                length: layout.routes.lengths[idx],
                path: layout.routes.paths[idx].clone(),
                points: layout.polylines[idx].iter().map(|&(x, y)| [x, y]).collect(),
            })
            .collect();

        let junctions = layout
            .routes
            .junction_edges
            .iter()
            .map(|(&junction, edges)| (junction, edges.iter().copied().collect()))
            .collect();

        MeshDump {
            width: layout.bounds.max_x,
            height: layout.bounds.max_y,
            vertices,
            rails,
            routes,
            junctions,
            stats: layout.stats,
        }
    }
}

/// Writes the dump as pretty JSON to `path`, or to stdout when omitted.
pub fn write_dump(dump: &MeshDump, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, dump)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        None => println!("{}", serde_json::to_string_pretty(dump)?),
    }
    Ok(())
}
