use std::collections::BTreeMap;

use crate::{
    datatypes::{CoordinateSystem, Mesh, Node, AXIS, BOTTOM, REF_NODE, RIGID_NODES, SURFACE},
    error::{HardnessError, Result},
};

/// Ids per data line in set definitions
const IDS_PER_LINE: usize = 16;

pub const SAMPLE_INSTANCE: &str = "I_SAMPLE";
pub const INDENTER_INSTANCE: &str = "I_INDENTER";

fn id_table(ids: &[usize]) -> String {
    ids.chunks(IDS_PER_LINE)
        .map(|chunk| {
            chunk
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Mesh {
    /// Serializes the mesh as the body of a solver part.
    ///
    /// Every element must carry a solver type code and a material.
    pub fn write_inp(&self) -> Result<String> {
        let mut out = String::new();

        let mut by_frame: BTreeMap<Option<CoordinateSystem>, Vec<&Node>> = BTreeMap::new();
        for node in self.nodes.values() {
            by_frame.entry(node.frame).or_default().push(node);
        }
        for (frame, nodes) in &by_frame {
            match frame {
                Some(system) => out.push_str(&format!("*NODE, SYSTEM={}\n", system.code())),
                None => out.push_str("*NODE\n"),
            }
            for node in nodes {
                let v = node.vertex;
                out.push_str(&format!("{}, {:?}, {:?}\n", node.id, v.x, v.y));
            }
        }

        let mut by_type: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        let mut by_material: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for element in self.elements.values() {
            let solver_type = match element.solver_type.as_deref() {
                Some(t) => t,
                None => {
                    return Err(HardnessError::UnmappedElementType {
                        element: element.id,
                        shape: element.shape.tag().to_owned(),
                    })
                }
            };
            let material = match element.material.as_deref() {
                Some(m) => m,
                None => return Err(HardnessError::UnassignedMaterial { element: element.id }),
            };
            by_type.entry(solver_type).or_default().push(element.id);
            by_material.entry(material).or_default().push(element.id);
        }

        for (solver_type, ids) in &by_type {
            out.push_str(&format!("*ELEMENT, TYPE={solver_type}\n"));
            for id in ids {
                let nodes: Vec<String> = self.elements[id]
                    .nodes
                    .iter()
                    .map(|n| n.to_string())
                    .collect();
                out.push_str(&format!("{id}, {}\n", nodes.join(", ")));
            }
        }

        for name in self.node_set_names() {
            out.push_str(&format!("*NSET, NSET={name}\n{}\n", id_table(&self.node_set(name))));
        }
        for name in self.element_set_names() {
            out.push_str(&format!("*ELSET, ELSET={name}\n{}\n", id_table(&self.element_set(name))));
        }

        for (name, faces) in &self.surfaces {
            out.push_str(&format!("*SURFACE, TYPE=ELEMENT, NAME={name}\n"));
            for face in faces {
                out.push_str(&format!("{}, S{}\n", face.element, face.face));
            }
        }

        for (material, ids) in &by_material {
            out.push_str(&format!(
                "*ELSET, ELSET={material}_ELEMENTS\n{}\n\
                *SOLID SECTION, ELSET={material}_ELEMENTS, MATERIAL={material}\n,\n",
                id_table(ids)
            ));
        }

        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Elastic {
        label: String,
        young_modulus: f64,
        poisson_ratio: f64,
    },
    ElasticPerfectlyPlastic {
        label: String,
        young_modulus: f64,
        poisson_ratio: f64,
        yield_stress: f64,
    },
}

impl Material {
    pub fn label(&self) -> &str {
        match self {
            Material::Elastic { label, .. } => label,
            Material::ElasticPerfectlyPlastic { label, .. } => label,
        }
    }

    pub fn write_inp(&self) -> String {
        match self {
            Material::Elastic {
                label,
                young_modulus,
                poisson_ratio,
            } => format!(
                "*MATERIAL, NAME={label}\n\
                *ELASTIC\n\
                {young_modulus:?}, {poisson_ratio:?}\n"
            ),
            Material::ElasticPerfectlyPlastic {
                label,
                young_modulus,
                poisson_ratio,
                yield_stress,
            } => format!(
                "*MATERIAL, NAME={label}\n\
                *ELASTIC\n\
                {young_modulus:?}, {poisson_ratio:?}\n\
                *PLASTIC\n\
                {yield_stress:?}, 0.0\n"
            ),
        }
    }
}

/// What the indenter reference node is driven by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    Displacement,
    Force,
}

/// Time incrementation of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Fixed,
    Adaptive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub control: ControlType,
    pub kind: StepKind,
    pub duration: f64,
    pub nframes: usize,
    /// Imposed vertical displacement or force on the reference node
    pub controlled_value: f64,
    pub min_frame_duration: f64,
}

impl Step {
    pub fn new(name: impl Into<String>, control: ControlType, controlled_value: f64) -> Step {
        Step {
            name: name.into(),
            control,
            kind: StepKind::Fixed,
            duration: 1.0,
            nframes: 100,
            controlled_value,
            min_frame_duration: 1.0e-8,
        }
    }

    pub fn frame_duration(&self) -> f64 {
        self.duration / self.nframes as f64
    }

    pub fn write_inp(&self) -> Result<String> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(HardnessError::invalid("duration", "> 0"));
        }
        if self.nframes == 0 {
            return Err(HardnessError::invalid("nframes", ">= 1"));
        }
        if !self.min_frame_duration.is_finite()
            || (self.kind == StepKind::Adaptive
                && (self.min_frame_duration <= 0.0
                    || self.min_frame_duration > self.frame_duration()))
        {
            return Err(HardnessError::invalid(
                "min_frame_duration",
                format!("0 < min_frame_duration <= {:?}", self.frame_duration()),
            ));
        }

        let frame = self.frame_duration();
        let incrementation = match self.kind {
            StepKind::Fixed => format!("*STATIC, DIRECT\n{frame:?}, {:?}", self.duration),
            StepKind::Adaptive => format!(
                "*STATIC\n{frame:?}, {:?}, {:?}, {frame:?}",
                self.duration, self.min_frame_duration
            ),
        };
        let loading = match self.control {
            ControlType::Displacement => format!(
                "*BOUNDARY\n{INDENTER_INSTANCE}.{REF_NODE}, 2, 2, {:?}",
                self.controlled_value
            ),
            ControlType::Force => format!(
                "*CLOAD\n{INDENTER_INSTANCE}.{REF_NODE}, 2, {:?}",
                self.controlled_value
            ),
        };

        Ok(format!(
            "*STEP, NAME={name}, NLGEOM=YES, INC=1000000\n\
            {incrementation}\n\
            {loading}\n\
            *OUTPUT, FIELD, FREQUENCY=1\n\
            *NODE OUTPUT\n\
            U, RF\n\
            *ELEMENT OUTPUT, ELSET={SAMPLE_INSTANCE}.ALL_ELEMENTS\n\
            S, LE, PE, PEEQ\n\
            *OUTPUT, HISTORY\n\
            *NODE OUTPUT, NSET={INDENTER_INSTANCE}.{REF_NODE}\n\
            U2, RF2\n\
            *END STEP\n",
            name = self.name,
        ))
    }
}

fn require_set(mesh: &Mesh, name: &str) -> Result<()> {
    if mesh.node_set(name).is_empty() {
        return Err(HardnessError::MissingRegion {
            region: name.to_owned(),
        });
    }
    Ok(())
}

/// Assembles the complete indentation input deck
///
/// # Arguments
/// * `sample` - The processed sample mesh
/// * `indenter` - The processed and specialized indenter mesh
/// * `steps` - Loading steps, in order
/// * `materials` - Every material referenced by the two meshes
pub fn indentation_2d_input(
    sample: &Mesh,
    indenter: &Mesh,
    steps: &[Step],
    materials: &[Material],
) -> Result<String> {
    for set in [AXIS, BOTTOM] {
        require_set(sample, set)?;
    }
    for set in [REF_NODE, RIGID_NODES] {
        require_set(indenter, set)?;
    }
    for (mesh, instance) in [(sample, SAMPLE_INSTANCE), (indenter, INDENTER_INSTANCE)] {
        if mesh.surfaces.get(SURFACE).map_or(true, |s| s.is_empty()) {
            return Err(HardnessError::MissingRegion {
                region: format!("{instance}.{SURFACE}"),
            });
        }
        for element in mesh.elements.values() {
            let known = element
                .material
                .as_deref()
                .is_some_and(|m| materials.iter().any(|mat| mat.label() == m));
            if !known {
                return Err(HardnessError::UnassignedMaterial { element: element.id });
            }
        }
    }

    let steps: Vec<String> = steps.iter().map(Step::write_inp).collect::<Result<_>>()?;
    let materials: Vec<String> = materials.iter().map(Material::write_inp).collect();

    Ok(format!(
        "*HEADING\n\
        Axisymmetric indentation\n\
        *PART, NAME=SAMPLE\n\
        {sample_mesh}\
        *END PART\n\
        *PART, NAME=INDENTER\n\
        {indenter_mesh}\
        *END PART\n\
        *ASSEMBLY, NAME=ASSEMBLY\n\
        *INSTANCE, NAME={SAMPLE_INSTANCE}, PART=SAMPLE\n\
        *END INSTANCE\n\
        *INSTANCE, NAME={INDENTER_INSTANCE}, PART=INDENTER\n\
        *END INSTANCE\n\
        *RIGID BODY, REF NODE={INDENTER_INSTANCE}.{REF_NODE}, PIN NSET={INDENTER_INSTANCE}.{RIGID_NODES}\n\
        *END ASSEMBLY\n\
        {materials}\
        *SURFACE INTERACTION, NAME=SURF_INTER\n\
        1.,\n\
        *CONTACT PAIR, INTERACTION=SURF_INTER\n\
        {SAMPLE_INSTANCE}.{SURFACE}, {INDENTER_INSTANCE}.{SURFACE}\n\
        *BOUNDARY\n\
        {SAMPLE_INSTANCE}.{AXIS}, 1, 1\n\
        {SAMPLE_INSTANCE}.{BOTTOM}, 2, 2\n\
        {INDENTER_INSTANCE}.{REF_NODE}, 1, 1\n\
        {INDENTER_INSTANCE}.{REF_NODE}, 6, 6\n\
        {steps}",
        sample_mesh = sample.write_inp()?,
        indenter_mesh = indenter.write_inp()?,
        materials = materials.join(""),
        steps = steps.join(""),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::TIP_NODE;
    use crate::indenter::{specialize, RigidityMode};
    use crate::mesher::{parse_msh, tests::TWO_QUADS};
    use crate::processing::{process_2d_mesh, ElementMap, MaterialMap};

    fn sample() -> Mesh {
        process_2d_mesh(
            parse_msh(TWO_QUADS).unwrap(),
            &ElementMap::axisymmetric(),
            &MaterialMap::uniform("SAMPLE_MAT"),
        )
        .unwrap()
    }

    fn indenter() -> Mesh {
        let mut raw = parse_msh(TWO_QUADS).unwrap();
        for node in raw.nodes.values_mut() {
            node.vertex.y = -node.vertex.y;
        }
        let mesh = process_2d_mesh(
            raw,
            &ElementMap::axisymmetric(),
            &MaterialMap::uniform("INDENTER_MAT"),
        )
        .unwrap();
        specialize(mesh, RigidityMode::Rigid).unwrap()
    }

    fn materials() -> Vec<Material> {
        vec![
            Material::ElasticPerfectlyPlastic {
                label: "SAMPLE_MAT".to_owned(),
                young_modulus: 1.0,
                poisson_ratio: 0.3,
                yield_stress: 0.01,
            },
            Material::Elastic {
                label: "INDENTER_MAT".to_owned(),
                young_modulus: 1000.0,
                poisson_ratio: 0.2,
            },
        ]
    }

    #[test]
    fn mesh_lists_every_node_and_element() {
        let inp = sample().write_inp().unwrap();

        assert!(inp.starts_with("*NODE\n1, 0.0, 0.0\n2, 1.0, 0.0\n"));
        assert!(inp.contains("*ELEMENT, TYPE=CAX4\n6, 1, 4, 5, 2\n7, 2, 5, 6, 3\n"));
        assert!(inp.contains("*NSET, NSET=SURFACE\n1, 2, 3\n"));
        assert!(inp.contains("*NSET, NSET=AXIS\n1, 4\n"));
        assert!(inp.contains("*SURFACE, TYPE=ELEMENT, NAME=SURFACE\n6, S4\n7, S4\n"));
        assert!(inp.contains("*SOLID SECTION, ELSET=SAMPLE_MAT_ELEMENTS, MATERIAL=SAMPLE_MAT\n"));
        assert_eq!(inp.matches("*NODE\n").count(), 1);
    }

    #[test]
    fn nodes_in_other_frames_get_their_own_table() {
        let mut mesh = sample();
        if let Some(node) = mesh.nodes.get_mut(&5) {
            node.frame = Some(CoordinateSystem::Cylindrical);
        }
        let inp = mesh.write_inp().unwrap();

        assert!(inp.starts_with("*NODE\n1, 0.0, 0.0\n2, 1.0, 0.0\n3, 2.0, 0.0\n4, 0.0, -1.0\n6, "));
        assert!(inp.contains("*NODE, SYSTEM=C\n5, 1.0, -1.0\n*ELEMENT"));
    }

    #[test]
    fn unprocessed_mesh_cannot_be_written() {
        let raw = parse_msh(TWO_QUADS).unwrap();
        assert!(matches!(
            raw.write_inp(),
            Err(HardnessError::UnmappedElementType { element: 1, .. })
        ));
    }

    #[test]
    fn long_sets_wrap() {
        let ids: Vec<usize> = (1..=20).collect();
        let table = id_table(&ids);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("16"));
        assert_eq!(lines[1], "17, 18, 19, 20");
    }

    #[test]
    fn steps_follow_control_and_kind() {
        let mut step = Step::new("LOADING", ControlType::Displacement, -0.1);
        let inp = step.write_inp().unwrap();
        assert!(inp.contains("*STATIC, DIRECT\n0.01, 1.0\n"));
        assert!(inp.contains("*BOUNDARY\nI_INDENTER.REF_NODE, 2, 2, -0.1\n"));

        step.control = ControlType::Force;
        step.kind = StepKind::Adaptive;
        let inp = step.write_inp().unwrap();
        assert!(inp.contains("*STATIC\n0.01, 1.0, 1e-8, 0.01\n"));
        assert!(inp.contains("*CLOAD\nI_INDENTER.REF_NODE, 2, -0.1\n"));

        step.nframes = 0;
        assert!(step.write_inp().is_err());
    }

    #[test]
    fn non_finite_min_frame_duration_is_rejected() {
        let mut step = Step::new("LOADING", ControlType::Displacement, -0.1);
        step.kind = StepKind::Adaptive;

        for value in [f64::NAN, f64::INFINITY] {
            step.min_frame_duration = value;
            assert!(matches!(
                step.write_inp(),
                Err(HardnessError::InvalidParameter {
                    parameter: "min_frame_duration",
                    ..
                })
            ));
        }
    }

    #[test]
    fn materials_write_their_laws() {
        let materials = materials();
        assert_eq!(
            materials[0].write_inp(),
            "*MATERIAL, NAME=SAMPLE_MAT\n*ELASTIC\n1.0, 0.3\n*PLASTIC\n0.01, 0.0\n"
        );
        assert!(!materials[1].write_inp().contains("*PLASTIC"));
    }

    #[test]
    fn full_deck_has_both_parts() {
        let steps = vec![
            Step::new("LOADING", ControlType::Displacement, -0.1),
            Step::new("UNLOADING", ControlType::Displacement, 0.0),
        ];
        let deck = indentation_2d_input(&sample(), &indenter(), &steps, &materials()).unwrap();

        assert!(deck.contains("*PART, NAME=SAMPLE\n*NODE\n"));
        assert!(deck.contains("*PART, NAME=INDENTER\n*NODE\n"));
        assert!(deck.contains(
            "*RIGID BODY, REF NODE=I_INDENTER.REF_NODE, PIN NSET=I_INDENTER.RIGID_NODES\n"
        ));
        assert!(deck.contains("I_SAMPLE.SURFACE, I_INDENTER.SURFACE\n"));
        assert!(deck.contains(&format!("*NSET, NSET={TIP_NODE}\n1\n")));
        assert_eq!(deck.matches("*STEP").count(), 2);
        assert!(deck.ends_with("*END STEP\n"));
    }

    #[test]
    fn deck_needs_known_materials() {
        let steps = vec![Step::new("LOADING", ControlType::Force, -1.0)];
        let materials = &materials()[..1];
        assert!(matches!(
            indentation_2d_input(&sample(), &indenter(), &steps, materials),
            Err(HardnessError::UnassignedMaterial { .. })
        ));
    }

    #[test]
    fn deck_needs_specialized_indenter() {
        let steps = vec![Step::new("LOADING", ControlType::Force, -1.0)];
        match indentation_2d_input(&sample(), &sample(), &steps, &materials()) {
            Err(HardnessError::MissingRegion { region }) => assert_eq!(region, REF_NODE),
            other => panic!("expected missing region, got {other:?}"),
        }
    }
}
