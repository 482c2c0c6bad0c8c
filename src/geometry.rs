use nalgebra::Point2;

use crate::error::{HardnessError, Result};

pub const DEFAULT_PSI: f64 = 70.29;

fn check_finite(parameter: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(HardnessError::invalid(parameter, "a finite value"));
    }
    Ok(())
}

fn check_positive(parameter: &'static str, value: f64) -> Result<()> {
    check_finite(parameter, value)?;
    if value <= 0.0 {
        return Err(HardnessError::invalid(parameter, format!("> 0, got {value}")));
    }
    Ok(())
}

/// Validates a cone half-angle in degrees and returns it in radians
fn half_angle(psi: f64) -> Result<f64> {
    check_finite("psi", psi)?;
    if psi <= 0.0 || psi >= 90.0 {
        return Err(HardnessError::invalid(
            "psi",
            format!("0 < psi < 90 degrees, got {psi}"),
        ));
    }
    Ok(psi.to_radians())
}

/// Validates the refinement radii 0 < r1 < r2 < r3
fn check_radii(r1: f64, r2: f64, r3: f64) -> Result<()> {
    check_positive("r1", r1)?;
    check_positive("r2", r2)?;
    check_positive("r3", r3)?;
    if r1 >= r2 {
        return Err(HardnessError::invalid("r2", format!("r2 > r1 = {r1}, got {r2}")));
    }
    if r2 >= r3 {
        return Err(HardnessError::invalid("r3", format!("r3 > r2 = {r2}, got {r3}")));
    }
    Ok(())
}

/// Conical indenter outline: tip at the origin, flank at `psi` from the
/// axis, closed by an arc of radius `r3` around the tip.
///
/// `r1` and `r2` bound the refinement zone where the element size grows
/// from `lc1` to `lc2`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConicalIndenter {
    pub psi: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub lc1: f64,
    pub lc2: f64,
}

impl Default for ConicalIndenter {
    fn default() -> Self {
        ConicalIndenter {
            psi: DEFAULT_PSI,
            r1: 1.0,
            r2: 10.0,
            r3: 100.0,
            lc1: 0.1,
            lc2: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConicalPoints {
    /// End of the flank, `(x2, y2)`
    pub shoulder: Point2<f64>,
    /// Top of the axis, `(0, y3)`
    pub top: Point2<f64>,
}

impl ConicalIndenter {
    fn validate(&self) -> Result<f64> {
        let psi = half_angle(self.psi)?;
        check_radii(self.r1, self.r2, self.r3)?;
        check_positive("lc1", self.lc1)?;
        check_positive("lc2", self.lc2)?;
        Ok(psi)
    }

    pub fn control_points(&self) -> Result<ConicalPoints> {
        let psi = self.validate()?;
        Ok(ConicalPoints {
            shoulder: Point2::new(self.r3 * psi.sin(), self.r3 * psi.cos()),
            top: Point2::new(0.0, self.r3),
        })
    }

    /// Builds the gmsh geometry description of the indenter
    pub fn geo_source(&self) -> Result<String> {
        let points = self.control_points()?;
        Ok(format!(
            "// Conical indenter\n\
            Mesh.MshFileVersion = 2.2;\n\
            lc1 = {lc1};\n\
            lc2 = {lc2};\n\
            Point(1) = {{0, 0, 0, lc1}};\n\
            Point(2) = {{{x2}, {y2}, 0, lc2}};\n\
            Point(3) = {{0, {y3}, 0, lc2}};\n\
            Line(1) = {{1, 2}};\n\
            Circle(2) = {{2, 1, 3}};\n\
            Line(3) = {{3, 1}};\n\
            Line Loop(1) = {{1, 2, 3}};\n\
            Plane Surface(1) = {{1}};\n\
            {refinement}\
            Mesh.RecombineAll = 1;\n\
            Physical Line(\"SURFACE\") = {{1}};\n\
            Physical Line(\"BOTTOM\") = {{2}};\n\
            Physical Line(\"AXIS\") = {{3}};\n\
            Physical Surface(\"INDENTER\") = {{1}};\n",
            lc1 = self.lc1,
            lc2 = self.lc2,
            x2 = points.shoulder.x,
            y2 = points.shoulder.y,
            y3 = points.top.y,
            refinement = tip_refinement(self.r1, self.r2),
        ))
    }
}

/// Spherical-conical indenter: a cone of half-angle `psi` whose apex is
/// replaced by a sphere of radius `r_tip` tangent to the flank. The tip
/// of the sphere sits at the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct SpheroconicalIndenter {
    pub psi: f64,
    pub r_tip: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub lc1: f64,
    pub lc2: f64,
}

impl Default for SpheroconicalIndenter {
    fn default() -> Self {
        SpheroconicalIndenter {
            psi: DEFAULT_PSI,
            r_tip: 1.0,
            r1: 1.0,
            r2: 10.0,
            r3: 100.0,
            lc1: 0.1,
            lc2: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpheroconicalPoints {
    /// Where the flank meets the sphere, `(x2, y2)`
    pub tangency: Point2<f64>,
    /// End of the flank, `(x3, y3)`
    pub shoulder: Point2<f64>,
    /// Top of the axis, `(0, y4)`
    pub top: Point2<f64>,
    /// Centre of the tip sphere, `(0, y5)`
    pub sphere_center: Point2<f64>,
    /// Apex of the truncated cone, `(0, y6)`
    pub apex: Point2<f64>,
    /// Distance from the sphere tip down to the cone apex
    pub dh: f64,
}

impl SpheroconicalIndenter {
    fn validate(&self) -> Result<f64> {
        let psi = half_angle(self.psi)?;
        check_positive("r_tip", self.r_tip)?;
        check_radii(self.r1, self.r2, self.r3)?;
        check_positive("lc1", self.lc1)?;
        check_positive("lc2", self.lc2)?;

        // distance from the apex to the tangency point along the flank
        let flank_start = self.r_tip / psi.tan();
        if self.r3 <= flank_start {
            return Err(HardnessError::invalid(
                "r3",
                format!("r3 > r_tip / tan(psi) = {flank_start}, got {}", self.r3),
            ));
        }
        Ok(psi)
    }

    pub fn control_points(&self) -> Result<SpheroconicalPoints> {
        let psi = self.validate()?;
        let r = self.r_tip;
        let dh = r * (1.0 / psi.sin() - 1.0);

        Ok(SpheroconicalPoints {
            tangency: Point2::new(r * psi.cos(), r * (1.0 - psi.sin())),
            shoulder: Point2::new(self.r3 * psi.sin(), self.r3 * psi.cos() - dh),
            top: Point2::new(0.0, self.r3 - dh),
            sphere_center: Point2::new(0.0, r),
            apex: Point2::new(0.0, -dh),
            dh,
        })
    }

    pub fn geo_source(&self) -> Result<String> {
        let points = self.control_points()?;
        Ok(format!(
            "// Spheroconical indenter\n\
            Mesh.MshFileVersion = 2.2;\n\
            lc1 = {lc1};\n\
            lc2 = {lc2};\n\
            Point(1) = {{0, 0, 0, lc1}};\n\
            Point(2) = {{{x2}, {y2}, 0, lc1}};\n\
            Point(3) = {{{x3}, {y3}, 0, lc2}};\n\
            Point(4) = {{0, {y4}, 0, lc2}};\n\
            Point(5) = {{0, {y5}, 0, lc1}};\n\
            Point(6) = {{0, {y6}, 0, lc2}};\n\
            Circle(1) = {{1, 5, 2}};\n\
            Line(2) = {{2, 3}};\n\
            Circle(3) = {{3, 6, 4}};\n\
            Line(4) = {{4, 1}};\n\
            Line Loop(1) = {{1, 2, 3, 4}};\n\
            Plane Surface(1) = {{1}};\n\
            {refinement}\
            Mesh.RecombineAll = 1;\n\
            Physical Line(\"SURFACE\") = {{1, 2}};\n\
            Physical Line(\"BOTTOM\") = {{3}};\n\
            Physical Line(\"AXIS\") = {{4}};\n\
            Physical Surface(\"INDENTER\") = {{1}};\n",
            lc1 = self.lc1,
            lc2 = self.lc2,
            x2 = points.tangency.x,
            y2 = points.tangency.y,
            x3 = points.shoulder.x,
            y3 = points.shoulder.y,
            y4 = points.top.y,
            y5 = points.sphere_center.y,
            y6 = points.apex.y,
            refinement = tip_refinement(self.r1, self.r2),
        ))
    }
}

/// Size field growing from `lc1` within `r1` of the tip to `lc2` past `r2`
fn tip_refinement(r1: f64, r2: f64) -> String {
    format!(
        "Field[1] = Distance;\n\
        Field[1].PointsList = {{1}};\n\
        Field[2] = Threshold;\n\
        Field[2].InField = 1;\n\
        Field[2].SizeMin = lc1;\n\
        Field[2].SizeMax = lc2;\n\
        Field[2].DistMin = {r1};\n\
        Field[2].DistMax = {r2};\n\
        Background Field = 2;\n"
    )
}

/// Axisymmetric sample: a structured `lx` x `ly` box under the contact
/// zone, an unstructured transition out to radius `r1` and a structured
/// far field ring out to `r2`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMesh {
    pub lx: f64,
    pub ly: f64,
    pub r1: f64,
    pub r2: f64,
    pub nx: usize,
    pub ny: usize,
    pub nr: usize,
    pub nt: usize,
}

impl Default for SampleMesh {
    fn default() -> Self {
        SampleMesh {
            lx: 1.0,
            ly: 1.0,
            r1: 2.0,
            r2: 1000.0,
            nx: 32,
            ny: 32,
            nr: 16,
            nt: 8,
        }
    }
}

impl SampleMesh {
    fn validate(&self) -> Result<()> {
        check_positive("lx", self.lx)?;
        check_positive("ly", self.ly)?;
        check_positive("r1", self.r1)?;
        check_positive("r2", self.r2)?;

        let core_radius = self.lx.max(self.ly) * std::f64::consts::SQRT_2;
        if self.r1 <= core_radius {
            return Err(HardnessError::invalid(
                "r1",
                format!("r1 > max(lx, ly) * sqrt(2) = {core_radius}, got {}", self.r1),
            ));
        }
        if self.r2 <= self.r1 {
            return Err(HardnessError::invalid(
                "r2",
                format!("r2 > r1 = {}, got {}", self.r1, self.r2),
            ));
        }

        for (parameter, count) in [
            ("nx", self.nx),
            ("ny", self.ny),
            ("nr", self.nr),
            ("nt", self.nt),
        ] {
            if count == 0 {
                return Err(HardnessError::invalid(parameter, ">= 1"));
            }
        }
        Ok(())
    }

    /// Geometric progression of the radial element sizes in the far field
    pub fn radial_progression(&self) -> Result<f64> {
        self.validate()?;
        Ok((self.r2 / self.r1).powf(1.0 / self.nr as f64))
    }

    pub fn geo_source(&self) -> Result<String> {
        let q1 = self.radial_progression()?;
        Ok(format!(
            "// Indentation sample\n\
            Mesh.MshFileVersion = 2.2;\n\
            lx = {lx};\n\
            ly = {ly};\n\
            r1 = {r1};\n\
            r2 = {r2};\n\
            Nx = {nx};\n\
            Ny = {ny};\n\
            Nr = {nr};\n\
            Nt = {nt};\n\
            q1 = {q1};\n\
            lc1 = lx / Nx;\n\
            lc2 = r1 * Pi / (2 * Nt);\n\
            Point(1) = {{0, 0, 0, lc1}};\n\
            Point(2) = {{lx, 0, 0, lc1}};\n\
            Point(3) = {{lx, -ly, 0, lc1}};\n\
            Point(4) = {{0, -ly, 0, lc1}};\n\
            Point(5) = {{r1, 0, 0, lc2}};\n\
            Point(6) = {{0, -r1, 0, lc2}};\n\
            Point(7) = {{r2, 0, 0, lc2}};\n\
            Point(8) = {{0, -r2, 0, lc2}};\n\
            Line(1) = {{1, 2}};\n\
            Line(2) = {{2, 3}};\n\
            Line(3) = {{3, 4}};\n\
            Line(4) = {{4, 1}};\n\
            Line(5) = {{2, 5}};\n\
            Circle(6) = {{5, 1, 6}};\n\
            Line(7) = {{6, 4}};\n\
            Line(8) = {{5, 7}};\n\
            Circle(9) = {{7, 1, 8}};\n\
            Line(10) = {{8, 6}};\n\
            Line Loop(1) = {{-4, -3, -2, -1}};\n\
            Line Loop(2) = {{2, 3, -7, -6, -5}};\n\
            Line Loop(3) = {{6, -10, -9, -8}};\n\
            Plane Surface(1) = {{1}};\n\
            Plane Surface(2) = {{2}};\n\
            Plane Surface(3) = {{3}};\n\
            Transfinite Line{{1, 3}} = Nx + 1;\n\
            Transfinite Line{{2, 4}} = Ny + 1;\n\
            Transfinite Line{{8, -10}} = Nr + 1 Using Progression q1;\n\
            Transfinite Line{{6, 9}} = Nt + 1;\n\
            Transfinite Surface{{1}};\n\
            Transfinite Surface{{3}};\n\
            Recombine Surface{{1, 2, 3}};\n\
            Physical Line(\"SURFACE\") = {{1, 5, 8}};\n\
            Physical Line(\"BOTTOM\") = {{9}};\n\
            Physical Line(\"AXIS\") = {{4, 7, 10}};\n\
            Physical Surface(\"SAMPLE\") = {{1, 2, 3}};\n",
            lx = self.lx,
            ly = self.ly,
            r1 = self.r1,
            r2 = self.r2,
            nx = self.nx,
            ny = self.ny,
            nr = self.nr,
            nt = self.nt,
        ))
    }
}
