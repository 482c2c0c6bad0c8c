use std::path::PathBuf;

use log::info;

use crate::{
    datatypes::Mesh,
    deck::{indentation_2d_input, Material, Step},
    error::Result,
    geometry::SampleMesh,
    indenter::{process_2d_indenter, RigidityMode},
    input::{IndenterShape, ModelInput},
    mesher::GmshMesher,
    processing::{process_2d_mesh, ElementMap, MaterialMap},
};

/// 2D axisymmetric indentation of a sample by an indenter
#[derive(Debug, Clone)]
pub struct Indentation2D {
    pub label: String,
    pub mesher: GmshMesher,
    pub sample: SampleMesh,
    pub indenter: IndenterShape,
    pub rigidity: RigidityMode,
    pub element_map: ElementMap,
    pub material_map: MaterialMap,
    pub materials: Vec<Material>,
    pub steps: Vec<Step>,
}

impl Indentation2D {
    pub fn from_input(input: ModelInput, workdir: impl Into<PathBuf>) -> Indentation2D {
        let mut mesher = GmshMesher::new(input.gmsh_path, workdir);
        mesher.algorithm = input.algorithm;

        Indentation2D {
            label: input.label,
            mesher,
            sample: input.sample,
            indenter: input.indenter,
            rigidity: input.rigidity,
            element_map: input.element_map,
            material_map: input.material_map,
            materials: input.materials,
            steps: input.steps,
        }
    }

    pub fn sample_mesh(&self) -> Result<Mesh> {
        let geo = self.sample.geo_source()?;
        let raw = self.mesher.mesh("sample_mesh_2D", &geo)?;
        process_2d_mesh(raw, &self.element_map, &self.material_map)
    }

    /// Both indenter shapes go through the same mesh, read, process path
    pub fn indenter_mesh(&self) -> Result<Mesh> {
        let (name, geo) = match &self.indenter {
            IndenterShape::Conical(cone) => ("conical_indenter_2D", cone.geo_source()?),
            IndenterShape::Spheroconical(cone) => ("spheroconical_indenter_2D", cone.geo_source()?),
        };
        let raw = self.mesher.mesh(name, &geo)?;
        process_2d_indenter(raw, self.rigidity, &self.element_map, &self.material_map)
    }

    /// Builds both meshes and writes `<label>.inp` in the work directory
    ///
    /// # Returns
    /// The path of the written input deck
    pub fn write_input(&self) -> Result<PathBuf> {
        // parameters are checked before gmsh runs on anything
        self.sample.radial_progression()?;
        match &self.indenter {
            IndenterShape::Conical(cone) => cone.control_points().map(|_| ())?,
            IndenterShape::Spheroconical(cone) => cone.control_points().map(|_| ())?,
        }

        let sample = self.sample_mesh()?;
        let indenter = self.indenter_mesh()?;
        let deck = indentation_2d_input(&sample, &indenter, &self.steps, &self.materials)?;

        let path = self.mesher.workdir.join(format!("{}.inp", self.label));
        std::fs::write(&path, deck)?;
        info!("wrote input deck to {}", path.display());

        Ok(path)
    }
}
