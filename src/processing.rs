use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info};

use crate::{
    datatypes::{
        ElementShape, Mesh, SurfaceFace, ALL_ELEMENTS, ALL_NODES, BOUNDARY_REGIONS, SURFACE,
    },
    error::{HardnessError, Result},
};

/// Maps generic element shapes onto solver element type codes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementMap {
    codes: BTreeMap<String, String>,
}

impl ElementMap {
    pub fn new() -> ElementMap {
        ElementMap::default()
    }

    /// Axisymmetric continuum elements
    pub fn axisymmetric() -> ElementMap {
        ElementMap::new()
            .with("tri3", "CAX3")
            .with("quad4", "CAX4")
            .with("tri6", "CAX6")
            .with("quad8", "CAX8")
    }

    pub fn with(mut self, shape: impl Into<String>, code: impl Into<String>) -> ElementMap {
        self.codes.insert(shape.into(), code.into());
        self
    }

    pub fn resolve(&self, shape: ElementShape) -> Option<&str> {
        self.codes.get(shape.tag()).map(|c| c.as_str())
    }
}

/// Assigns material labels to elements by element set.
///
/// Rules are checked in insertion order; the first set an element belongs
/// to decides its material. Elements matching no rule take the default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialMap {
    rules: Vec<(String, String)>,
    default: Option<String>,
}

impl MaterialMap {
    pub fn new() -> MaterialMap {
        MaterialMap::default()
    }

    /// Every element gets `material`
    pub fn uniform(material: impl Into<String>) -> MaterialMap {
        MaterialMap::new().with_default(material)
    }

    pub fn with_rule(mut self, set: impl Into<String>, material: impl Into<String>) -> MaterialMap {
        self.rules.push((set.into(), material.into()));
        self
    }

    pub fn with_default(mut self, material: impl Into<String>) -> MaterialMap {
        self.default = Some(material.into());
        self
    }

    pub fn material_for(&self, sets: &BTreeSet<String>) -> Option<&str> {
        self.rules
            .iter()
            .find(|(set, _)| sets.contains(set))
            .map(|(_, material)| material.as_str())
            .or(self.default.as_deref())
    }
}

/// Turns a raw mesher output into a solver ready 2D mesh.
///
/// Boundary regions carried by line elements become node sets, everything
/// but 2D elements is dropped, the free surface is extracted and the
/// element and material maps are applied. Running it again on its own
/// output changes nothing.
///
/// # Arguments
/// * `mesh` - The raw mesh, with SURFACE, BOTTOM and AXIS element sets
/// * `element_map` - Solver type code for every element shape in the mesh
/// * `material_map` - Material assignment of the 2D elements
pub fn process_2d_mesh(
    mut mesh: Mesh,
    element_map: &ElementMap,
    material_map: &MaterialMap,
) -> Result<Mesh> {
    mesh.validate()?;

    for element in mesh.elements.values_mut() {
        element.sets.insert(ALL_ELEMENTS.to_owned());
    }
    for node in mesh.nodes.values_mut() {
        node.sets.insert(ALL_NODES.to_owned());
    }

    for region in BOUNDARY_REGIONS {
        element_set_to_node_set(&mut mesh, region)?;
    }
    for element in mesh.elements.values_mut() {
        for region in BOUNDARY_REGIONS {
            element.sets.remove(region);
        }
    }

    let raw_count = mesh.elements.len();
    mesh.retain_dimension(2);
    debug!(
        "dropped {} elements of dimension other than 2",
        raw_count - mesh.elements.len()
    );

    let surface = node_set_to_surface(&mesh, SURFACE);
    mesh.surfaces.insert(SURFACE.to_owned(), surface);

    apply_element_map(&mut mesh, element_map)?;
    apply_material_map(&mut mesh, material_map)?;

    info!(
        "processed mesh: {} nodes, {} elements, {} surface faces",
        mesh.nodes.len(),
        mesh.elements.len(),
        mesh.surfaces[SURFACE].len()
    );

    Ok(mesh)
}

/// Tags every node of the elements in set `tag` with the same name.
///
/// A mesh whose elements no longer carry the set keeps its existing node
/// set; a mesh with neither is missing the region.
fn element_set_to_node_set(mesh: &mut Mesh, tag: &str) -> Result<()> {
    let members: BTreeSet<usize> = mesh
        .elements
        .values()
        .filter(|e| e.in_set(tag))
        .flat_map(|e| e.nodes.iter().copied())
        .collect();

    if members.is_empty() {
        if mesh.nodes.values().any(|n| n.in_set(tag)) {
            debug!("keeping existing node set {tag}");
            return Ok(());
        }
        return Err(HardnessError::MissingRegion {
            region: tag.to_owned(),
        });
    }

    for id in &members {
        if let Some(node) = mesh.nodes.get_mut(id) {
            node.sets.insert(tag.to_owned());
        }
    }
    debug!("node set {tag} has {} nodes", members.len());

    Ok(())
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Extracts the ordered contour of free element faces lying on node set `tag`.
///
/// A face qualifies when it belongs to a single element and both of its
/// corner nodes are in the set. Faces are chained through shared nodes;
/// open chains start at their end node of smallest `(x, y)`.
pub fn node_set_to_surface(mesh: &Mesh, tag: &str) -> Vec<SurfaceFace> {
    let mut edge_use: HashMap<(usize, usize), usize> = HashMap::new();
    for element in mesh.elements.values() {
        for face in 0..element.shape.faces().len() {
            if let Some((a, b)) = element.face_nodes(face) {
                *edge_use.entry(edge_key(a, b)).or_insert(0) += 1;
            }
        }
    }

    let on_set = |id: &usize| mesh.nodes.get(id).is_some_and(|n| n.in_set(tag));

    // (face, corner nodes)
    let mut candidates: Vec<(SurfaceFace, (usize, usize))> = Vec::new();
    for element in mesh.elements.values() {
        for face in 0..element.shape.faces().len() {
            let Some((a, b)) = element.face_nodes(face) else {
                continue;
            };
            if edge_use[&edge_key(a, b)] == 1 && on_set(&a) && on_set(&b) {
                candidates.push((
                    SurfaceFace {
                        element: element.id,
                        face: face + 1,
                    },
                    (a, b),
                ));
            }
        }
    }

    let mut incident: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, (_, (a, b))) in candidates.iter().enumerate() {
        incident.entry(*a).or_default().push(index);
        incident.entry(*b).or_default().push(index);
    }

    let mut ends: Vec<usize> = incident
        .iter()
        .filter(|(_, faces)| faces.len() == 1)
        .map(|(node, _)| *node)
        .collect();
    ends.sort_by(|a, b| {
        let (va, vb) = (mesh.nodes[a].vertex, mesh.nodes[b].vertex);
        va.x.total_cmp(&vb.x).then(va.y.total_cmp(&vb.y))
    });

    let mut visited = vec![false; candidates.len()];
    let mut surface = Vec::with_capacity(candidates.len());

    let walk = |start: usize, visited: &mut [bool], surface: &mut Vec<SurfaceFace>| {
        let mut current = start;
        while let Some(&next) = incident[&current].iter().find(|&&f| !visited[f]) {
            visited[next] = true;
            let (face, (a, b)) = candidates[next];
            surface.push(face);
            current = if a == current { b } else { a };
        }
    };

    for end in ends {
        walk(end, &mut visited, &mut surface);
    }
    // closed contours
    while let Some(index) = visited.iter().position(|v| !v) {
        let start = candidates[index].1 .0;
        walk(start, &mut visited, &mut surface);
    }

    surface
}

fn apply_element_map(mesh: &mut Mesh, element_map: &ElementMap) -> Result<()> {
    for element in mesh.elements.values_mut() {
        match element_map.resolve(element.shape) {
            Some(code) => element.solver_type = Some(code.to_owned()),
            None => {
                return Err(HardnessError::UnmappedElementType {
                    element: element.id,
                    shape: element.shape.tag().to_owned(),
                })
            }
        }
    }
    Ok(())
}

fn apply_material_map(mesh: &mut Mesh, material_map: &MaterialMap) -> Result<()> {
    for element in mesh.elements.values_mut() {
        match material_map.material_for(&element.sets) {
            Some(material) => element.material = Some(material.to_owned()),
            None => return Err(HardnessError::UnassignedMaterial { element: element.id }),
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::datatypes::{Element, Node, Vertex, AXIS, BOTTOM};
    use crate::mesher::{parse_msh, tests::TWO_QUADS};

    /// Three triangles plus one line element carrying every boundary region
    pub(crate) fn three_triangles(shape: ElementShape) -> Mesh {
        let mut mesh = Mesh::new();
        for (id, x, y) in [
            (1, 0.0, 0.0),
            (2, 1.0, 0.0),
            (3, 0.0, -1.0),
            (4, 1.0, -1.0),
            (5, 2.0, 0.0),
        ] {
            mesh.add_node(Node::new(id, Vertex::new(x, y)));
        }

        let mut line = Element::new(10, ElementShape::Line2, vec![1, 2]);
        for region in BOUNDARY_REGIONS {
            line.sets.insert(region.to_owned());
        }
        mesh.add_element(line);

        for (id, nodes) in [(1, [1, 3, 2]), (2, [2, 3, 4]), (3, [2, 4, 5])] {
            mesh.add_element(Element::new(id, shape, nodes.to_vec()));
        }
        mesh
    }

    fn maps() -> (ElementMap, MaterialMap) {
        (
            ElementMap::new().with("tri3", "CAX3").with("quad4", "CAX4"),
            MaterialMap::uniform("SAMPLE_MAT"),
        )
    }

    #[test]
    fn processes_two_quads() {
        let (element_map, material_map) = maps();
        let mesh = process_2d_mesh(parse_msh(TWO_QUADS).unwrap(), &element_map, &material_map)
            .unwrap();

        assert_eq!(mesh.elements.keys().copied().collect::<Vec<_>>(), vec![6, 7]);
        assert_eq!(mesh.node_set(ALL_NODES), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(mesh.element_set(ALL_ELEMENTS), vec![6, 7]);
        assert_eq!(mesh.node_set(SURFACE), vec![1, 2, 3]);
        assert_eq!(mesh.node_set(BOTTOM), vec![4, 5, 6]);
        assert_eq!(mesh.node_set(AXIS), vec![1, 4]);

        for region in BOUNDARY_REGIONS {
            assert!(mesh.element_set(region).is_empty());
        }

        assert_eq!(
            mesh.surfaces[SURFACE],
            vec![
                SurfaceFace { element: 6, face: 4 },
                SurfaceFace { element: 7, face: 4 },
            ]
        );

        for element in mesh.elements.values() {
            assert_eq!(element.solver_type.as_deref(), Some("CAX4"));
            assert_eq!(element.material.as_deref(), Some("SAMPLE_MAT"));
        }
    }

    #[test]
    fn drops_elements_that_are_not_2d() {
        let (element_map, material_map) = maps();
        let mesh = process_2d_mesh(
            three_triangles(ElementShape::Tri3),
            &element_map,
            &material_map,
        )
        .unwrap();

        assert_eq!(mesh.elements.len(), 3);
        assert!(!mesh.elements.contains_key(&10));
        for name in mesh.element_set_names() {
            assert!(!mesh.element_set(name).contains(&10));
        }
        assert!(mesh.surfaces[SURFACE]
            .iter()
            .all(|face| face.element != 10));

        // the line carried all three regions onto its nodes
        for region in BOUNDARY_REGIONS {
            assert_eq!(mesh.node_set(region), vec![1, 2]);
        }
        assert_eq!(
            mesh.surfaces[SURFACE],
            vec![SurfaceFace { element: 1, face: 3 }]
        );
    }

    #[test]
    fn processing_is_idempotent() {
        let (element_map, material_map) = maps();
        let once = process_2d_mesh(parse_msh(TWO_QUADS).unwrap(), &element_map, &material_map)
            .unwrap();
        let twice = process_2d_mesh(once.clone(), &element_map, &material_map).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn unmapped_element_type_is_an_error() {
        let (element_map, material_map) = maps();
        match process_2d_mesh(
            three_triangles(ElementShape::Tri6),
            &element_map,
            &material_map,
        ) {
            Err(HardnessError::UnmappedElementType { element, shape }) => {
                assert_eq!(element, 1);
                assert_eq!(shape, "tri6");
            }
            other => panic!("expected unmapped element type, got {other:?}"),
        }
    }

    #[test]
    fn unassigned_material_is_an_error() {
        let (element_map, _) = maps();
        let material_map = MaterialMap::new().with_rule("INDENTER", "DIAMOND");

        assert!(matches!(
            process_2d_mesh(
                three_triangles(ElementShape::Tri3),
                &element_map,
                &material_map
            ),
            Err(HardnessError::UnassignedMaterial { element: 1 })
        ));
    }

    #[test]
    fn missing_region_is_an_error() {
        let (element_map, material_map) = maps();
        let mut mesh = parse_msh(TWO_QUADS).unwrap();
        mesh.elements.remove(&5);

        match process_2d_mesh(mesh, &element_map, &material_map) {
            Err(HardnessError::MissingRegion { region }) => assert_eq!(region, AXIS),
            other => panic!("expected missing region, got {other:?}"),
        }
    }

    #[test]
    fn material_rules_take_precedence_over_default() {
        let map = MaterialMap::new()
            .with_rule("INDENTER", "DIAMOND")
            .with_rule("SAMPLE", "STEEL")
            .with_default("VOID");

        let sets = |names: &[&str]| -> BTreeSet<String> { names.iter().map(|s| s.to_string()).collect() };
        assert_eq!(map.material_for(&sets(&["SAMPLE", "INDENTER"])), Some("DIAMOND"));
        assert_eq!(map.material_for(&sets(&["SAMPLE"])), Some("STEEL"));
        assert_eq!(map.material_for(&sets(&[])), Some("VOID"));
        assert_eq!(MaterialMap::new().material_for(&sets(&["SAMPLE"])), None);
    }

    #[test]
    fn surface_follows_contour_from_axis() {
        let mut mesh = Mesh::new();
        // strip of quads listed right to left
        for i in 0..4 {
            let x = i as f64;
            let mut top = Node::new(i + 1, Vertex::new(x, 0.0));
            top.sets.insert(SURFACE.to_owned());
            mesh.add_node(top);
            mesh.add_node(Node::new(i + 11, Vertex::new(x, -1.0)));
        }
        for (id, i) in [(1, 2), (2, 1), (3, 0)] {
            mesh.add_element(Element::new(
                id,
                ElementShape::Quad4,
                vec![i + 1, i + 11, i + 12, i + 2],
            ));
        }

        let surface = node_set_to_surface(&mesh, SURFACE);
        let elements: Vec<usize> = surface.iter().map(|f| f.element).collect();
        assert_eq!(elements, vec![3, 2, 1]);
        assert!(surface.iter().all(|f| f.face == 4));
    }

    #[test]
    fn dangling_node_is_rejected_before_processing() {
        let (element_map, material_map) = maps();
        let mut mesh = three_triangles(ElementShape::Tri3);
        mesh.add_element(Element::new(4, ElementShape::Tri3, vec![1, 3, 99]));

        match process_2d_mesh(mesh, &element_map, &material_map) {
            Err(HardnessError::DanglingNode { element, node }) => {
                assert_eq!((element, node), (4, 99));
            }
            other => panic!("expected dangling node, got {other:?}"),
        }
    }

    /// Two quads side by side, nodes 1..3 along y = 0 and 4..6 along y = 1
    fn quad_pair(xs: [f64; 3], surface_nodes: &[usize]) -> Mesh {
        let mut mesh = Mesh::new();
        for (i, x) in xs.iter().enumerate() {
            for (id, y) in [(i + 1, 0.0), (i + 4, 1.0)] {
                let mut node = Node::new(id, Vertex::new(*x, y));
                if surface_nodes.contains(&id) {
                    node.sets.insert(SURFACE.to_owned());
                }
                mesh.add_node(node);
            }
        }
        mesh.add_element(Element::new(6, ElementShape::Quad4, vec![1, 2, 5, 4]));
        mesh.add_element(Element::new(7, ElementShape::Quad4, vec![2, 3, 6, 5]));
        mesh
    }

    #[test]
    fn closed_surface_starts_at_lowest_element() {
        let mesh = quad_pair([0.0, 1.0, 2.0], &[1, 2, 3, 4, 5, 6]);

        let face = |element, face| SurfaceFace { element, face };
        assert_eq!(
            node_set_to_surface(&mesh, SURFACE),
            vec![
                face(6, 1),
                face(7, 1),
                face(7, 2),
                face(7, 3),
                face(6, 3),
                face(6, 4),
            ]
        );
    }

    #[test]
    fn disjoint_contours_follow_their_start() {
        // mirrored, so element 7 holds the leftmost contour
        let mesh = quad_pair([2.0, 1.0, 0.0], &[1, 4, 3, 6]);

        assert_eq!(
            node_set_to_surface(&mesh, SURFACE),
            vec![
                SurfaceFace { element: 7, face: 2 },
                SurfaceFace { element: 6, face: 4 },
            ]
        );
    }
}
