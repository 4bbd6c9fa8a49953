//! Edge taxonomy and traversal direction policy.

use serde::{Deserialize, Serialize};

/// Typed edges of the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    DirContainsDir,
    DirContainsFile,
    ModuleContains,
    ContainsSymbol,
    ClassContainsSymbol,
    SymbolContainsSymbol,
    FileDep,
    FileDepInferred,
    ExternalDep,
    SymbolImportsFile,
    ModuleDep,
    ExportsSymbol,
    ReferencesSymbol,
}

/// Traversal direction relative to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::DirContainsDir => "dir_contains_dir",
            EdgeType::DirContainsFile => "dir_contains_file",
            EdgeType::ModuleContains => "module_contains",
            EdgeType::ContainsSymbol => "contains_symbol",
            EdgeType::ClassContainsSymbol => "class_contains_symbol",
            EdgeType::SymbolContainsSymbol => "symbol_contains_symbol",
            EdgeType::FileDep => "file_dep",
            EdgeType::FileDepInferred => "file_dep_inferred",
            EdgeType::ExternalDep => "external_dep",
            EdgeType::SymbolImportsFile => "symbol_imports_file",
            EdgeType::ModuleDep => "module_dep",
            EdgeType::ExportsSymbol => "exports_symbol",
            EdgeType::ReferencesSymbol => "references_symbol",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "dir_contains_dir" => EdgeType::DirContainsDir,
            "dir_contains_file" => EdgeType::DirContainsFile,
            "module_contains" => EdgeType::ModuleContains,
            "contains_symbol" => EdgeType::ContainsSymbol,
            "class_contains_symbol" => EdgeType::ClassContainsSymbol,
            "symbol_contains_symbol" => EdgeType::SymbolContainsSymbol,
            "file_dep" => EdgeType::FileDep,
            "file_dep_inferred" => EdgeType::FileDepInferred,
            "external_dep" => EdgeType::ExternalDep,
            "symbol_imports_file" => EdgeType::SymbolImportsFile,
            "module_dep" => EdgeType::ModuleDep,
            "exports_symbol" => EdgeType::ExportsSymbol,
            "references_symbol" => EdgeType::ReferencesSymbol,
            _ => return None,
        })
    }

    /// Containment edges are walked top-down only; everything else can be
    /// followed against its direction at a discount.
    pub fn can_traverse(self, direction: Direction) -> bool {
        match self {
            EdgeType::DirContainsDir
            | EdgeType::DirContainsFile
            | EdgeType::ModuleContains
            | EdgeType::ContainsSymbol
            | EdgeType::ClassContainsSymbol
            | EdgeType::SymbolContainsSymbol => direction == Direction::Outgoing,
            _ => true,
        }
    }

    /// Score multiplier applied per traversed edge.
    pub fn multiplier(self, direction: Direction) -> f64 {
        let (out, inc) = match self {
            EdgeType::FileDep => (0.85, 0.72),
            EdgeType::FileDepInferred => (0.70, 0.58),
            EdgeType::ExternalDep => (0.30, 0.30),
            EdgeType::SymbolImportsFile => (0.75, 0.60),
            EdgeType::ModuleDep => (0.50, 0.45),
            EdgeType::ExportsSymbol => (0.70, 0.66),
            EdgeType::ReferencesSymbol => (0.80, 0.66),
            EdgeType::ContainsSymbol => (0.82, 0.0),
            EdgeType::ClassContainsSymbol | EdgeType::SymbolContainsSymbol => (0.78, 0.0),
            EdgeType::DirContainsDir => (0.45, 0.0),
            EdgeType::DirContainsFile => (0.55, 0.0),
            EdgeType::ModuleContains => (0.40, 0.0),
        };
        match direction {
            Direction::Outgoing => out,
            Direction::Incoming => inc,
        }
    }

    /// Edges surfaced as `graphLinks` in the context pack.
    pub fn is_file_dep_family(self) -> bool {
        matches!(self, EdgeType::FileDep | EdgeType::FileDepInferred)
    }
}
