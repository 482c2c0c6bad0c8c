use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::ProgressBar;
use log::{debug, info, warn};

use crate::{
    datatypes::{Element, ElementShape, Mesh, Node, Vertex},
    error::{HardnessError, Result},
};

pub const DEFAULT_ALGORITHM: &str = "delquad";

enum MeshParseState {
    Format,
    PhysicalNames,
    Nodes,
    Elements,
    Skipped,
    Limbo,
}

/// Runs gmsh on generated geometry descriptions
#[derive(Debug, Clone)]
pub struct GmshMesher {
    pub gmsh_path: String,
    pub workdir: PathBuf,
    pub algorithm: String,
}

impl GmshMesher {
    pub fn new(gmsh_path: impl Into<String>, workdir: impl Into<PathBuf>) -> GmshMesher {
        GmshMesher {
            gmsh_path: gmsh_path.into(),
            workdir: workdir.into(),
            algorithm: DEFAULT_ALGORITHM.to_owned(),
        }
    }

    /// Meshes a geometry description and loads the result
    ///
    /// # Arguments
    /// * `name` - Stem of the `.geo` and `.msh` files written in the work directory
    /// * `geo_source` - The gmsh geometry description
    ///
    /// # Returns
    /// The raw, untagged mesh produced by gmsh
    pub fn mesh(&self, name: &str, geo_source: &str) -> Result<Mesh> {
        let geo_file = format!("{name}.geo");
        let msh_path = self.workdir.join(format!("{name}.msh"));

        std::fs::write(self.workdir.join(&geo_file), geo_source)?;

        // a stale mesh would hide a failed run
        if msh_path.exists() {
            std::fs::remove_file(&msh_path)?;
        }

        info!(
            "running {} on {} with algorithm {}",
            self.gmsh_path, geo_file, self.algorithm
        );
        let spinner = ProgressBar::new_spinner();
        spinner.set_message(format!("meshing {geo_file}"));
        spinner.enable_steady_tick(Duration::from_millis(100));

        let output = std::process::Command::new(&self.gmsh_path)
            .arg("-2")
            .arg("-algo")
            .arg(&self.algorithm)
            .arg(&geo_file)
            .current_dir(&self.workdir)
            .output();

        spinner.finish_and_clear();

        let output = match output {
            Ok(out) => out,
            Err(err) => {
                return Err(HardnessError::Mesher(format!(
                    "failed to run {}: {err}",
                    self.gmsh_path
                )))
            }
        };

        if !output.status.success() {
            return Err(HardnessError::Mesher(format!(
                "{} exited with {}: {}",
                self.gmsh_path,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!("gmsh output: {}", String::from_utf8_lossy(&output.stdout));

        if !msh_path.exists() {
            return Err(HardnessError::Mesher(format!(
                "{} did not produce {}",
                self.gmsh_path,
                msh_path.display()
            )));
        }

        read_msh(&msh_path)
    }
}

/// Reads a gmsh 2.2 ASCII mesh file
pub fn read_msh(path: &Path) -> Result<Mesh> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(err) => {
            return Err(HardnessError::Mesher(format!(
                "Unable to open mesh file {}: {err}",
                path.display()
            )))
        }
    };
    let mesh = parse_msh(&contents)?;

    info!(
        "loaded {} nodes and {} elements from {}",
        mesh.nodes.len(),
        mesh.elements.len(),
        path.display()
    );

    Ok(mesh)
}

fn format_error(line: usize, message: impl Into<String>) -> HardnessError {
    HardnessError::MeshFormat {
        line,
        message: message.into(),
    }
}

fn parse_fields<'a, T: std::str::FromStr>(
    line_number: usize,
    fields: impl Iterator<Item = &'a str>,
) -> Result<Vec<T>> {
    fields
        .map(|field| {
            field
                .parse()
                .map_err(|_| format_error(line_number, format!("unexpected value '{field}'")))
        })
        .collect()
}

/// Parses the contents of a gmsh 2.2 ASCII mesh.
///
/// Each element joins the element set named after its physical group.
/// Groups without a name are ignored.
pub fn parse_msh(contents: &str) -> Result<Mesh> {
    let mut mesh = Mesh::new();
    let mut physical_names: HashMap<(usize, usize), String> = HashMap::new();
    let mut parser_state = MeshParseState::Limbo;
    let mut parsed_section_metadata = false;

    for (index, line) in contents.lines().enumerate() {
        let line_number = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("$End") {
            parser_state = MeshParseState::Limbo;
            continue;
        }

        match parser_state {
            MeshParseState::Limbo => {
                parsed_section_metadata = false;

                if line == "$MeshFormat" {
                    parser_state = MeshParseState::Format;
                } else if line == "$PhysicalNames" {
                    parser_state = MeshParseState::PhysicalNames;
                } else if line == "$Nodes" {
                    parser_state = MeshParseState::Nodes;
                } else if line == "$Elements" {
                    parser_state = MeshParseState::Elements;
                } else {
                    debug!("skipping mesh section {line}");
                    parser_state = MeshParseState::Skipped;
                }
            }
            MeshParseState::Format => {
                if !line.starts_with("2.") {
                    return Err(format_error(
                        line_number,
                        format!("only the 2.2 mesh format is supported, found {line}"),
                    ));
                }
            }
            MeshParseState::Skipped => continue,
            MeshParseState::PhysicalNames => {
                // leading line holds the entry count
                if !parsed_section_metadata {
                    parsed_section_metadata = true;
                    continue;
                }

                let mut fields = line.splitn(3, char::is_whitespace);
                let dim: usize = match fields.next().map(str::parse) {
                    Some(Ok(dim)) => dim,
                    _ => return Err(format_error(line_number, "bad physical group dimension")),
                };
                let tag: usize = match fields.next().map(str::parse) {
                    Some(Ok(tag)) => tag,
                    _ => return Err(format_error(line_number, "bad physical group tag")),
                };
                let name = match fields.next() {
                    Some(name) => name.trim().trim_matches('"').to_owned(),
                    None => return Err(format_error(line_number, "missing physical name")),
                };
                physical_names.insert((dim, tag), name);
            }
            MeshParseState::Nodes => {
                if !parsed_section_metadata {
                    parsed_section_metadata = true;
                    continue;
                }

                let mut fields = line.split_whitespace();
                let id: usize = match fields.next().map(str::parse) {
                    Some(Ok(id)) => id,
                    _ => return Err(format_error(line_number, "bad node id")),
                };
                let coords: Vec<f64> = parse_fields(line_number, fields)?;
                if coords.len() != 3 {
                    return Err(format_error(line_number, "expected 'id x y z'"));
                }

                mesh.add_node(Node::new(
                    id,
                    Vertex {
                        x: coords[0],
                        y: coords[1],
                        z: coords[2],
                    },
                ));
            }
            MeshParseState::Elements => {
                if !parsed_section_metadata {
                    parsed_section_metadata = true;
                    continue;
                }

                let element_data: Vec<usize> = parse_fields(line_number, line.split_whitespace())?;
                if element_data.len() < 3 {
                    return Err(format_error(line_number, "truncated element"));
                }

                let (id, type_id, num_tags) = (element_data[0], element_data[1], element_data[2]);
                let shape = match ElementShape::from_gmsh(type_id) {
                    Some(shape) => shape,
                    None => {
                        return Err(format_error(
                            line_number,
                            format!("unsupported gmsh element type {type_id}"),
                        ))
                    }
                };

                let Some(tags_end) = 3usize.checked_add(num_tags) else {
                    return Err(format_error(line_number, "bad tag count"));
                };
                let tags = element_data.get(3..tags_end).unwrap_or(&[]);
                let nodes = element_data.get(tags_end..).unwrap_or(&[]);
                if tags.len() != num_tags || nodes.len() != shape.node_count() {
                    return Err(format_error(
                        line_number,
                        format!("element {id} does not match its {shape} layout"),
                    ));
                }

                let mut element = Element::new(id, shape, nodes.to_vec());
                if let Some(physical) = tags.first() {
                    match physical_names.get(&(shape.dimension(), *physical)) {
                        Some(name) => {
                            element.sets.insert(name.clone());
                        }
                        None if *physical != 0 => {
                            warn!("element {id} belongs to unnamed physical group {physical}")
                        }
                        None => {}
                    }
                }
                mesh.add_element(element);
            }
        }
    }

    mesh.validate()?;

    Ok(mesh)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::datatypes::{AXIS, BOTTOM, SURFACE};

    /// Two quads side by side with a line on each boundary region
    pub(crate) const TWO_QUADS: &str = "$MeshFormat
2.2 0 8
$EndMeshFormat
$PhysicalNames
4
1 1 \"SURFACE\"
1 2 \"BOTTOM\"
1 3 \"AXIS\"
2 4 \"SAMPLE\"
$EndPhysicalNames
$Nodes
6
1 0 0 0
2 1 0 0
3 2 0 0
4 0 -1 0
5 1 -1 0
6 2 -1 0
$EndNodes
$Elements
7
1 1 2 1 1 1 2
2 1 2 1 1 2 3
3 1 2 2 2 4 5
4 1 2 2 2 5 6
5 1 2 3 3 4 1
6 3 2 4 1 1 4 5 2
7 3 2 4 1 2 5 6 3
$EndElements
";

    #[test]
    fn parses_nodes_elements_and_groups() {
        let mesh = parse_msh(TWO_QUADS).unwrap();

        assert_eq!(mesh.nodes.len(), 6);
        assert_eq!(mesh.elements.len(), 7);
        assert_eq!(mesh.nodes[&3].vertex, Vertex::new(2.0, 0.0));
        assert_eq!(mesh.nodes[&5].vertex.y, -1.0);

        assert_eq!(mesh.element_set(SURFACE), vec![1, 2]);
        assert_eq!(mesh.element_set(BOTTOM), vec![3, 4]);
        assert_eq!(mesh.element_set(AXIS), vec![5]);
        assert_eq!(mesh.element_set("SAMPLE"), vec![6, 7]);

        let quad = &mesh.elements[&6];
        assert_eq!(quad.shape, ElementShape::Quad4);
        assert_eq!(quad.nodes, vec![1, 4, 5, 2]);
    }

    #[test]
    fn rejects_unknown_element_types() {
        let contents = TWO_QUADS.replace("7 3 2 4 1 2 5 6 3", "7 5 2 4 1 2 5 6 3 1 2 3 4");
        match parse_msh(&contents) {
            Err(HardnessError::MeshFormat { line, message }) => {
                assert_eq!(line, 28);
                assert!(message.contains("type 5"));
            }
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_overflowing_tag_count() {
        let contents = TWO_QUADS.replace(
            "7 3 2 4 1 2 5 6 3",
            &format!("7 3 {} 4 1 2 5 6 3", usize::MAX),
        );
        match parse_msh(&contents) {
            Err(HardnessError::MeshFormat { line, message }) => {
                assert_eq!(line, 28);
                assert_eq!(message, "bad tag count");
            }
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_dangling_node_references() {
        let contents = TWO_QUADS.replace("7 3 2 4 1 2 5 6 3", "7 3 2 4 1 2 5 6 9");
        assert!(matches!(
            parse_msh(&contents),
            Err(HardnessError::DanglingNode { element: 7, node: 9 })
        ));
    }

    #[test]
    fn rejects_msh4() {
        let contents = "$MeshFormat\n4.1 0 8\n$EndMeshFormat\n";
        assert!(matches!(
            parse_msh(contents),
            Err(HardnessError::MeshFormat { line: 2, .. })
        ));
    }

    #[test]
    fn reads_mesh_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.msh");
        std::fs::write(&path, TWO_QUADS).unwrap();

        let mesh = read_msh(&path).unwrap();
        assert_eq!(mesh.elements.len(), 7);

        assert!(matches!(
            read_msh(&dir.path().join("missing.msh")),
            Err(HardnessError::Mesher(_))
        ));
    }

    #[test]
    fn failing_mesher_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mesher = GmshMesher::new("false", dir.path());

        match mesher.mesh("indenter", "// empty") {
            Err(HardnessError::Mesher(message)) => assert!(message.contains("exited")),
            other => panic!("expected mesher error, got {other:?}"),
        }
        assert!(dir.path().join("indenter.geo").exists());
    }

    #[test]
    fn missing_mesh_output_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mesher = GmshMesher::new("true", dir.path());

        match mesher.mesh("indenter", "// empty") {
            Err(HardnessError::Mesher(message)) => assert!(message.contains("did not produce")),
            other => panic!("expected mesher error, got {other:?}"),
        }
    }

    #[test]
    fn missing_mesher_binary_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mesher = GmshMesher::new("no-such-gmsh-binary", dir.path());
        assert!(matches!(
            mesher.mesh("sample", "// empty"),
            Err(HardnessError::Mesher(_))
        ));
    }
}
