#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dump;
pub mod error;
pub mod ir;
pub mod mesh;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{MeshConfig, MeshStrategy, load_config};
pub use error::{MeshError, Result};
pub use ir::MeshInput;
pub use mesh::{MeshLayout, compute_mesh};
