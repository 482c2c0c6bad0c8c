use thiserror::Error;

pub type Result<T> = std::result::Result<T, HardnessError>;

#[derive(Debug, Error)]
pub enum HardnessError {
    /// A geometric or meshing parameter is outside of its valid range
    #[error("Invalid parameter '{parameter}': must satisfy {constraint}")]
    InvalidParameter {
        parameter: &'static str,
        constraint: String,
    },

    /// The external mesher could not be run or did not produce a mesh
    #[error("Mesher error: {0}")]
    Mesher(String),

    #[error("Malformed mesh file at line {line}: {message}")]
    MeshFormat { line: usize, message: String },

    /// A boundary region expected from the mesher is absent
    #[error("Mesh has no region named {region}")]
    MissingRegion { region: String },

    #[error("Element {element} references missing node {node}")]
    DanglingNode { element: usize, node: usize },

    /// A node set that must resolve to exactly one node did not
    #[error("Node set {set} must match exactly one node, matched {matches:?}")]
    AmbiguousNode { set: String, matches: Vec<usize> },

    #[error("Element {element} has unmapped element type {shape}")]
    UnmappedElementType { element: usize, shape: String },

    #[error("Element {element} has no material assigned")]
    UnassignedMaterial { element: usize },

    #[error("Input error: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardnessError {
    pub fn invalid(parameter: &'static str, constraint: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter,
            constraint: constraint.into(),
        }
    }
}
