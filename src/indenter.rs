use log::info;

use crate::{
    datatypes::{Mesh, ALL_NODES, BOTTOM, REF_NODE, RIGID_NODES, TIP_NODE},
    error::{HardnessError, Result},
    processing::{process_2d_mesh, ElementMap, MaterialMap},
};

/// Which part of the indenter is tied to the reference node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidityMode {
    /// The whole indenter moves as one rigid body
    Rigid,
    /// Only the BOTTOM boundary is rigid, the body deforms
    RigidBase,
}

impl RigidityMode {
    pub fn from_rigid(rigid: bool) -> RigidityMode {
        if rigid {
            RigidityMode::Rigid
        } else {
            RigidityMode::RigidBase
        }
    }

    /// Node set whose members become rigid
    fn source_set(&self) -> &'static str {
        match self {
            RigidityMode::Rigid => ALL_NODES,
            RigidityMode::RigidBase => BOTTOM,
        }
    }
}

/// Tags the single node matching `predicate` with `set`
fn tag_unique_node(mesh: &mut Mesh, set: &str, predicate: impl Fn(f64, f64) -> bool) -> Result<()> {
    let matches: Vec<usize> = mesh
        .nodes
        .values()
        .filter(|n| predicate(n.vertex.x, n.vertex.y))
        .map(|n| n.id)
        .collect();

    if matches.len() != 1 {
        return Err(HardnessError::AmbiguousNode {
            set: set.to_owned(),
            matches,
        });
    }

    if let Some(node) = mesh.nodes.get_mut(&matches[0]) {
        node.sets.insert(set.to_owned());
    }
    Ok(())
}

/// Adds the indenter node sets to a processed mesh.
///
/// TIP_NODE is the node at the origin and REF_NODE the highest node on the
/// axis; both are matched on exact coordinates. RIGID_NODES follows `mode`.
/// Nodes and elements are never removed or renumbered.
pub fn specialize(mut mesh: Mesh, mode: RigidityMode) -> Result<Mesh> {
    tag_unique_node(&mut mesh, TIP_NODE, |x, y| x == 0.0 && y == 0.0)?;

    let y_max = mesh
        .nodes
        .values()
        .map(|n| n.vertex.y)
        .fold(f64::NEG_INFINITY, f64::max);
    tag_unique_node(&mut mesh, REF_NODE, |x, y| x == 0.0 && y == y_max)?;

    let source = mode.source_set();
    for node in mesh.nodes.values_mut() {
        if node.in_set(source) {
            node.sets.insert(RIGID_NODES.to_owned());
        }
    }

    info!(
        "indenter mesh: {:?}, {} rigid nodes",
        mode,
        mesh.node_set(RIGID_NODES).len()
    );

    Ok(mesh)
}

/// Processes a raw indenter mesh and adds the indenter node sets
pub fn process_2d_indenter(
    mesh: Mesh,
    mode: RigidityMode,
    element_map: &ElementMap,
    material_map: &MaterialMap,
) -> Result<Mesh> {
    let mesh = process_2d_mesh(mesh, element_map, material_map)?;
    specialize(mesh, mode)
}
