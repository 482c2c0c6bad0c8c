use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use crate::error::{HardnessError, Result};

pub const ALL_NODES: &str = "ALL_NODES";
pub const ALL_ELEMENTS: &str = "ALL_ELEMENTS";
pub const SURFACE: &str = "SURFACE";
pub const BOTTOM: &str = "BOTTOM";
pub const AXIS: &str = "AXIS";
pub const TIP_NODE: &str = "TIP_NODE";
pub const REF_NODE: &str = "REF_NODE";
pub const RIGID_NODES: &str = "RIGID_NODES";

/// Boundary regions every raw mesh must carry as element sets
pub const BOUNDARY_REGIONS: [&str; 3] = [SURFACE, BOTTOM, AXIS];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Vertex {
        Vertex { x, y, z: 0.0 }
    }
}

/// Coordinate system a node's coordinates are given in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CoordinateSystem {
    Rectangular,
    Cylindrical,
    Spherical,
}

impl CoordinateSystem {
    /// Solver keyword code
    pub fn code(&self) -> &'static str {
        match self {
            CoordinateSystem::Rectangular => "R",
            CoordinateSystem::Cylindrical => "C",
            CoordinateSystem::Spherical => "S",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: usize,
    pub vertex: Vertex,
    pub sets: BTreeSet<String>,
    /// `None` is the global rectangular frame
    pub frame: Option<CoordinateSystem>,
}

impl Node {
    pub fn new(id: usize, vertex: Vertex) -> Node {
        Node {
            id,
            vertex,
            sets: BTreeSet::new(),
            frame: None,
        }
    }

    pub fn in_set(&self, name: &str) -> bool {
        self.sets.contains(name)
    }
}

/// Generic element shapes, as produced by the mesher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementShape {
    Point1,
    Line2,
    Line3,
    Tri3,
    Tri6,
    Quad4,
    Quad8,
    Quad9,
}

const TRI_EDGES: [(usize, usize); 3] = [(0, 1), (1, 2), (2, 0)];
const QUAD_EDGES: [(usize, usize); 4] = [(0, 1), (1, 2), (2, 3), (3, 0)];

impl ElementShape {
    /// Maps a gmsh element type number onto a shape
    pub fn from_gmsh(type_id: usize) -> Option<ElementShape> {
        match type_id {
            1 => Some(ElementShape::Line2),
            2 => Some(ElementShape::Tri3),
            3 => Some(ElementShape::Quad4),
            8 => Some(ElementShape::Line3),
            9 => Some(ElementShape::Tri6),
            10 => Some(ElementShape::Quad9),
            15 => Some(ElementShape::Point1),
            16 => Some(ElementShape::Quad8),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ElementShape::Point1 => "point1",
            ElementShape::Line2 => "line2",
            ElementShape::Line3 => "line3",
            ElementShape::Tri3 => "tri3",
            ElementShape::Tri6 => "tri6",
            ElementShape::Quad4 => "quad4",
            ElementShape::Quad8 => "quad8",
            ElementShape::Quad9 => "quad9",
        }
    }

    /// Topological dimension of the shape
    pub fn dimension(&self) -> usize {
        match self {
            ElementShape::Point1 => 0,
            ElementShape::Line2 | ElementShape::Line3 => 1,
            _ => 2,
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            ElementShape::Point1 => 1,
            ElementShape::Line2 => 2,
            ElementShape::Line3 => 3,
            ElementShape::Tri3 => 3,
            ElementShape::Tri6 => 6,
            ElementShape::Quad4 => 4,
            ElementShape::Quad8 => 8,
            ElementShape::Quad9 => 9,
        }
    }

    /// Local edges of a 2D shape as pairs of corner node positions.
    ///
    /// Corner nodes come first in the connectivity of every shape, so
    /// quadratic shapes share the edges of their linear counterpart.
    /// Edge `i` is face `S{i+1}` of the solver.
    pub fn faces(&self) -> &'static [(usize, usize)] {
        match self {
            ElementShape::Tri3 | ElementShape::Tri6 => &TRI_EDGES,
            ElementShape::Quad4 | ElementShape::Quad8 | ElementShape::Quad9 => &QUAD_EDGES,
            _ => &[],
        }
    }
}

impl Display for ElementShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: usize,
    pub shape: ElementShape,
    pub nodes: Vec<usize>,
    pub sets: BTreeSet<String>,
    pub material: Option<String>,
    pub solver_type: Option<String>,
}

impl Element {
    pub fn new(id: usize, shape: ElementShape, nodes: Vec<usize>) -> Element {
        Element {
            id,
            shape,
            nodes,
            sets: BTreeSet::new(),
            material: None,
            solver_type: None,
        }
    }

    pub fn in_set(&self, name: &str) -> bool {
        self.sets.contains(name)
    }

    /// Corner node ids of local face `face` (0-based)
    pub fn face_nodes(&self, face: usize) -> Option<(usize, usize)> {
        let (a, b) = *self.shape.faces().get(face)?;
        Some((*self.nodes.get(a)?, *self.nodes.get(b)?))
    }
}

/// One element face on a named surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFace {
    pub element: usize,
    /// 1-based local face number
    pub face: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub nodes: BTreeMap<usize, Node>,
    pub elements: BTreeMap<usize, Element>,
    /// Ordered face contours, by surface name
    pub surfaces: BTreeMap<String, Vec<SurfaceFace>>,
}

impl Mesh {
    pub fn new() -> Mesh {
        Mesh::default()
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    pub fn add_element(&mut self, element: Element) {
        self.elements.insert(element.id, element);
    }

    /// Checks that every element only references existing nodes
    pub fn validate(&self) -> Result<()> {
        for element in self.elements.values() {
            if let Some(node) = element
                .nodes
                .iter()
                .find(|n| !self.nodes.contains_key(*n))
            {
                return Err(HardnessError::DanglingNode {
                    element: element.id,
                    node: *node,
                });
            }
        }
        Ok(())
    }

    /// Ids of the nodes in a named set, ascending
    pub fn node_set(&self, name: &str) -> Vec<usize> {
        self.nodes
            .values()
            .filter(|n| n.in_set(name))
            .map(|n| n.id)
            .collect()
    }

    /// Ids of the elements in a named set, ascending
    pub fn element_set(&self, name: &str) -> Vec<usize> {
        self.elements
            .values()
            .filter(|e| e.in_set(name))
            .map(|e| e.id)
            .collect()
    }

    pub fn node_set_names(&self) -> BTreeSet<&str> {
        self.nodes
            .values()
            .flat_map(|n| n.sets.iter().map(|s| s.as_str()))
            .collect()
    }

    pub fn element_set_names(&self) -> BTreeSet<&str> {
        self.elements
            .values()
            .flat_map(|e| e.sets.iter().map(|s| s.as_str()))
            .collect()
    }

    /// Keeps only the elements of topological dimension `dim`
    pub fn retain_dimension(&mut self, dim: usize) {
        self.elements.retain(|_, e| e.shape.dimension() == dim);
    }
}
