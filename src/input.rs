use json::JsonValue;
use log::info;

use crate::{
    deck::{ControlType, Material, Step, StepKind},
    error::{HardnessError, Result},
    geometry::{ConicalIndenter, SampleMesh, SpheroconicalIndenter},
    indenter::RigidityMode,
    mesher::DEFAULT_ALGORITHM,
    processing::{ElementMap, MaterialMap},
};

#[derive(Debug, Clone, PartialEq)]
pub enum IndenterShape {
    Conical(ConicalIndenter),
    Spheroconical(SpheroconicalIndenter),
}

/// Everything needed to build an indentation model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub label: String,
    pub gmsh_path: String,
    pub algorithm: String,
    pub sample: SampleMesh,
    pub indenter: IndenterShape,
    pub rigidity: RigidityMode,
    pub element_map: ElementMap,
    pub material_map: MaterialMap,
    pub materials: Vec<Material>,
    pub steps: Vec<Step>,
}

fn get_f64(section: &JsonValue, name: &str, key: &str, default: Option<f64>) -> Result<f64> {
    let value = &section[key];
    if value.is_null() {
        return default.ok_or_else(|| {
            HardnessError::Input(format!("Input json missing {key} field in {name} section"))
        });
    }
    value
        .as_f64()
        .ok_or_else(|| HardnessError::Input(format!("Bad value for {key} in {name} section")))
}

fn get_usize(section: &JsonValue, name: &str, key: &str, default: usize) -> Result<usize> {
    let value = &section[key];
    if value.is_null() {
        return Ok(default);
    }
    value
        .as_usize()
        .ok_or_else(|| HardnessError::Input(format!("Bad value for {key} in {name} section")))
}

fn get_str<'a>(section: &'a JsonValue, name: &str, key: &str, default: &'a str) -> Result<&'a str> {
    let value = &section[key];
    if value.is_null() {
        return Ok(default);
    }
    value
        .as_str()
        .ok_or_else(|| HardnessError::Input(format!("Bad value for {key} in {name} section")))
}

/// Loads and parses the input json file
///
/// # Arguments
/// * `input_file` - The path to the input file
pub fn load_input_file(input_file: &str) -> Result<ModelInput> {
    let file_string = match std::fs::read_to_string(input_file) {
        Ok(f) => f,
        Err(err) => {
            return Err(HardnessError::Input(format!(
                "Unable to open input file {input_file}: {err}"
            )))
        }
    };

    let input = parse_input(&file_string)?;
    info!(
        "loaded model {} with {} materials and {} steps from {}",
        input.label,
        input.materials.len(),
        input.steps.len(),
        input_file
    );
    Ok(input)
}

pub fn parse_input(contents: &str) -> Result<ModelInput> {
    let input_json = match json::parse(contents) {
        Ok(j) => j,
        Err(err) => return Err(HardnessError::Input(format!("Error in input file json: {err}"))),
    };

    for key in ["indenter", "materials", "steps"] {
        if !input_json.has_key(key) {
            return Err(HardnessError::Input(format!("Input json missing {key} field")));
        }
    }

    let mesher = &input_json["mesher"];
    let (rigidity, indenter) = parse_indenter(&input_json["indenter"])?;
    let (materials, material_map) = parse_materials(&input_json["materials"])?;

    Ok(ModelInput {
        label: get_str(&input_json, "root", "label", "indentation")?.to_owned(),
        gmsh_path: get_str(mesher, "mesher", "gmsh_path", "gmsh")?.to_owned(),
        algorithm: get_str(mesher, "mesher", "algorithm", DEFAULT_ALGORITHM)?.to_owned(),
        sample: parse_sample(&input_json["sample"])?,
        indenter,
        rigidity,
        element_map: parse_element_map(&input_json["element_map"])?,
        material_map,
        materials,
        steps: parse_steps(&input_json["steps"])?,
    })
}

fn parse_sample(section: &JsonValue) -> Result<SampleMesh> {
    let defaults = SampleMesh::default();
    let name = "sample";
    Ok(SampleMesh {
        lx: get_f64(section, name, "lx", Some(defaults.lx))?,
        ly: get_f64(section, name, "ly", Some(defaults.ly))?,
        r1: get_f64(section, name, "r1", Some(defaults.r1))?,
        r2: get_f64(section, name, "r2", Some(defaults.r2))?,
        nx: get_usize(section, name, "nx", defaults.nx)?,
        ny: get_usize(section, name, "ny", defaults.ny)?,
        nr: get_usize(section, name, "nr", defaults.nr)?,
        nt: get_usize(section, name, "nt", defaults.nt)?,
    })
}

fn parse_indenter(section: &JsonValue) -> Result<(RigidityMode, IndenterShape)> {
    let name = "indenter";
    let rigid = match &section["rigid"] {
        JsonValue::Null => true,
        value => value
            .as_bool()
            .ok_or_else(|| HardnessError::Input("Bad value for rigid in indenter section".into()))?,
    };

    let shape = match get_str(section, name, "kind", "conical")? {
        "conical" => {
            let d = ConicalIndenter::default();
            IndenterShape::Conical(ConicalIndenter {
                psi: get_f64(section, name, "psi", Some(d.psi))?,
                r1: get_f64(section, name, "r1", Some(d.r1))?,
                r2: get_f64(section, name, "r2", Some(d.r2))?,
                r3: get_f64(section, name, "r3", Some(d.r3))?,
                lc1: get_f64(section, name, "lc1", Some(d.lc1))?,
                lc2: get_f64(section, name, "lc2", Some(d.lc2))?,
            })
        }
        "spheroconical" => {
            let d = SpheroconicalIndenter::default();
            IndenterShape::Spheroconical(SpheroconicalIndenter {
                psi: get_f64(section, name, "psi", Some(d.psi))?,
                r_tip: get_f64(section, name, "r_tip", Some(d.r_tip))?,
                r1: get_f64(section, name, "r1", Some(d.r1))?,
                r2: get_f64(section, name, "r2", Some(d.r2))?,
                r3: get_f64(section, name, "r3", Some(d.r3))?,
                lc1: get_f64(section, name, "lc1", Some(d.lc1))?,
                lc2: get_f64(section, name, "lc2", Some(d.lc2))?,
            })
        }
        other => {
            return Err(HardnessError::Input(format!(
                "Unknown indenter kind {other}. Supports conical and spheroconical"
            )))
        }
    };

    Ok((RigidityMode::from_rigid(rigid), shape))
}

fn parse_element_map(section: &JsonValue) -> Result<ElementMap> {
    if section.is_null() {
        return Ok(ElementMap::axisymmetric());
    }
    if !section.is_object() {
        return Err(HardnessError::Input("element_map must be an object".to_owned()));
    }

    let mut element_map = ElementMap::new();
    for (shape, code) in section.entries() {
        let code = code.as_str().ok_or_else(|| {
            HardnessError::Input(format!("Bad solver type for {shape} in element_map"))
        })?;
        element_map = element_map.with(shape, code);
    }
    Ok(element_map)
}

/// Parses the materials and the element sets they are assigned to.
///
/// A material without `elset` becomes the default for unmatched elements;
/// at most one may omit it.
fn parse_materials(section: &JsonValue) -> Result<(Vec<Material>, MaterialMap)> {
    if !section.is_array() || section.is_empty() {
        return Err(HardnessError::Input(
            "materials must be a non empty array".to_owned(),
        ));
    }

    let mut materials = Vec::new();
    let mut material_map = MaterialMap::new();
    let mut has_default = false;

    for (i, entry) in section.members().enumerate() {
        let name = format!("materials[{i}]");
        let label = match entry["label"].as_str() {
            Some(l) => l.to_owned(),
            None => {
                return Err(HardnessError::Input(format!(
                    "Input json missing label field in {name} section"
                )))
            }
        };
        let young_modulus = get_f64(entry, &name, "young_modulus", None)?;
        let poisson_ratio = get_f64(entry, &name, "poisson_ratio", None)?;

        if young_modulus <= 0.0 {
            return Err(HardnessError::Input(format!(
                "Material '{label}' has a non positive young_modulus"
            )));
        }
        if !(-1.0..0.5).contains(&poisson_ratio) {
            return Err(HardnessError::Input(format!(
                "Material '{label}' has poisson_ratio outside of [-1, 0.5)"
            )));
        }

        match entry["elset"].as_str() {
            Some(elset) => material_map = material_map.with_rule(elset, label.as_str()),
            None if has_default => {
                return Err(HardnessError::Input(format!(
                    "Material '{label}' has no elset, but a default material is already defined"
                )))
            }
            None => {
                has_default = true;
                material_map = material_map.with_default(label.as_str());
            }
        }

        let material = if entry.has_key("yield_stress") {
            Material::ElasticPerfectlyPlastic {
                label,
                young_modulus,
                poisson_ratio,
                yield_stress: get_f64(entry, &name, "yield_stress", None)?,
            }
        } else {
            Material::Elastic {
                label,
                young_modulus,
                poisson_ratio,
            }
        };
        materials.push(material);
    }

    Ok((materials, material_map))
}

fn parse_steps(section: &JsonValue) -> Result<Vec<Step>> {
    if !section.is_array() || section.is_empty() {
        return Err(HardnessError::Input("steps must be a non empty array".to_owned()));
    }

    let mut steps = Vec::new();
    for (i, entry) in section.members().enumerate() {
        let name = format!("steps[{i}]");

        let control = match get_str(entry, &name, "control", "disp")? {
            "disp" => ControlType::Displacement,
            "force" => ControlType::Force,
            other => {
                return Err(HardnessError::Input(format!(
                    "Unknown control {other} in {name}. Supports disp and force"
                )))
            }
        };
        let kind = match get_str(entry, &name, "kind", "fixed")? {
            "fixed" => StepKind::Fixed,
            "adaptive" => StepKind::Adaptive,
            other => {
                return Err(HardnessError::Input(format!(
                    "Unknown kind {other} in {name}. Supports fixed and adaptive"
                )))
            }
        };

        let defaults = Step::new("STEP", control, 0.1);
        steps.push(Step {
            name: get_str(entry, &name, "name", &defaults.name)?.to_owned(),
            control,
            kind,
            duration: get_f64(entry, &name, "duration", Some(defaults.duration))?,
            nframes: get_usize(entry, &name, "nframes", defaults.nframes)?,
            controlled_value: get_f64(
                entry,
                &name,
                "controlled_value",
                Some(defaults.controlled_value),
            )?,
            min_frame_duration: get_f64(
                entry,
                &name,
                "min_frame_duration",
                Some(defaults.min_frame_duration),
            )?,
        });
    }

    Ok(steps)
}
