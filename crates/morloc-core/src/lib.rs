//! Code generation backend for the morloc composition language.
//!
//! This crate provides:
//! - LIL parsing into a validated manifold graph
//! - Per-language pool generation (sh, py, R) through grammars and mogrifiers
//! - The bash nexus that dispatches exported commands to pools
//! - Output directory management and the project build

pub mod build;
pub mod error;
pub mod frontend;
pub mod grammar;
pub mod ir;
pub mod lang;
pub mod mogrifier;
pub mod nexus;
pub mod paths;
pub mod pool;
pub mod wire;

pub use build::{BuildConfig, BuildOutput, ProjectBuilder, write_project};
pub use error::{Error, Result};
pub use frontend::{Frontend, FrontendOptions, FrontendOutput};
pub use ir::{ExportTable, Manifold, ManifoldGraph, Program};
pub use lang::{Backend, Lang, backend_for};
pub use nexus::{DEFAULT_NEXUS_NAME, Nexus, compiler_version};
pub use paths::{Workspace, morloc_home};
pub use pool::PoolBuilder;
