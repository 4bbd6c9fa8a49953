//! Typed code multigraph: builder, persisted rows, and the in-memory arena
//! the context-pack traversal runs over.
//!
//! Node taxonomy: file, symbol, directory, module, external. Duplicate
//! `(from, to, type)` edges collapse into one weighted edge carrying up to
//! five examples; call-inferred file deps seen twice or more are promoted to
//! a parallel `file_dep` edge marked `source=inferred`.

pub mod builder;
pub mod errors;
pub mod graph;
pub mod model;
pub mod resolve;

pub use builder::{build_graph, module_of, normalize_name, symbol_key, GraphBuildSummary};
pub use errors::{GraphError, GraphResult};
pub use graph::{CodeGraph, EdgeAttrs, Neighbor, SymbolSpan};
pub use model::{Direction, EdgeType};
