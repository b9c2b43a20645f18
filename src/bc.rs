//! Boundary Condition Module
//!
//! This module handles all boundary condition logic for the nodal operator:
//! - BC type definitions (displacement, traction, Neumann)
//! - The per-face, per-component BC matrix
//! - Resolution of the boundary row at edge and corner nodes
//! - Tension-test presets and right-hand-side initialization
//!
//! A node on several faces collects one term per face, independently per
//! component. If any of those faces prescribes a displacement for component
//! `p`, row `p` is a Dirichlet row and the other terms are ignored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ElasticError, NodeIndex, Result};
use crate::grid::{Geometry, NodeField};

/// Boundary condition types
///
/// Each (face, component) pair of a non-periodic boundary carries exactly one
/// of these, with a prescribed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BcType {
    /// Prescribed displacement: row reads `u_p = value`
    Displacement,

    /// Prescribed traction: row reads `sigma n = value`
    Traction,

    /// Prescribed normal derivative: row reads `grad u n = value`
    Neumann,
}

impl BcType {
    /// Parse BC type from string (from config file)
    ///
    /// # Arguments
    /// * `s` - String identifier from config
    ///
    /// # Returns
    /// Result with BcType or error message
    pub fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "displacement" | "disp" => Ok(BcType::Displacement),
            "traction" | "trac" => Ok(BcType::Traction),
            "neumann" => Ok(BcType::Neumann),
            _ => Err(format!("Unknown boundary condition type: '{}'", s)),
        }
    }

    /// Get list of all valid BC type strings (for validation)
    pub fn valid_types() -> &'static [&'static str] {
        &["displacement", "traction", "neumann"]
    }
}

/// Low or high side of a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Lo,
    Hi,
}

/// A domain face: direction plus side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Face {
    pub dir: usize,
    pub side: Side,
}

impl Face {
    pub fn lo(dir: usize) -> Self {
        Face { dir, side: Side::Lo }
    }

    pub fn hi(dir: usize) -> Self {
        Face { dir, side: Side::Hi }
    }

    /// All 2*dim faces, ordered xlo, xhi, ylo, yhi, zlo, zhi.
    pub fn all(dim: usize) -> Vec<Face> {
        (0..dim).flat_map(|d| [Face::lo(d), Face::hi(d)]).collect()
    }

    fn slot(&self) -> usize {
        2 * self.dir
            + match self.side {
                Side::Lo => 0,
                Side::Hi => 1,
            }
    }

    /// Outward normal component along `dir`.
    pub fn sign(&self) -> f64 {
        match self.side {
            Side::Lo => -1.0,
            Side::Hi => 1.0,
        }
    }

    pub fn label(&self) -> String {
        let axis = ["x", "y", "z"][self.dir];
        match self.side {
            Side::Lo => format!("{}lo", axis),
            Side::Hi => format!("{}hi", axis),
        }
    }

    /// Parse labels such as `"xlo"` or `"zhi"`.
    pub fn from_label(s: &str) -> std::result::Result<Self, String> {
        let dir = match s.chars().next() {
            Some('x') => 0,
            Some('y') => 1,
            Some('z') => 2,
            _ => return Err(format!("Unknown face: '{}'", s)),
        };
        match &s[1..] {
            "lo" => Ok(Face::lo(dir)),
            "hi" => Ok(Face::hi(dir)),
            _ => Err(format!("Unknown face: '{}'", s)),
        }
    }

    /// True if `m` lies on this face, which must be non-periodic.
    pub fn contains(&self, geom: &Geometry, m: NodeIndex) -> bool {
        match self.side {
            Side::Lo => geom.on_low_face(m, self.dir),
            Side::Hi => geom.on_high_face(m, self.dir),
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One face contribution to a flux row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceTerm {
    pub face: Face,
    pub kind: BcType,
}

/// Resolved equation for one component at one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryRow {
    /// Not on a non-periodic face: the PDE row
    Interior,
    /// `u_p = value`
    Displacement { value: f64 },
    /// Sum of traction/Neumann terms, at most one per direction
    Flux {
        terms: [Option<FaceTerm>; 3],
        value: f64,
    },
}

/// BC type and value for every face and component.
#[derive(Debug, Clone, PartialEq)]
pub struct BcMatrix {
    dim: usize,
    types: [[Option<BcType>; 3]; 6],
    values: [[f64; 3]; 6],
}

impl BcMatrix {
    /// Matrix with every entry unset. `validate` fails until all
    /// non-periodic faces are assigned.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            types: [[None; 3]; 6],
            values: [[0.0; 3]; 6],
        }
    }

    /// Same type with zero value on every face and component.
    pub fn uniform(dim: usize, ty: BcType) -> Self {
        let mut bc = Self::new(dim);
        for face in Face::all(dim) {
            bc.set_face(face, ty, [0.0; 3]);
        }
        bc
    }

    /// Homogeneous displacement on every face.
    pub fn all_displacement(dim: usize) -> Self {
        Self::uniform(dim, BcType::Displacement)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn set(&mut self, face: Face, component: usize, ty: BcType, value: f64) -> &mut Self {
        self.types[face.slot()][component] = Some(ty);
        self.values[face.slot()][component] = value;
        self
    }

    pub fn set_face(&mut self, face: Face, ty: BcType, values: [f64; 3]) -> &mut Self {
        for c in 0..self.dim {
            self.set(face, c, ty, values[c]);
        }
        self
    }

    pub fn bc_type(&self, face: Face, component: usize) -> Option<BcType> {
        self.types[face.slot()][component]
    }

    pub fn value(&self, face: Face, component: usize) -> f64 {
        self.values[face.slot()][component]
    }

    /// Copy with every prescribed value set to zero.
    pub fn homogeneous(&self) -> Self {
        Self {
            dim: self.dim,
            types: self.types,
            values: [[0.0; 3]; 6],
        }
    }

    /// Check that every non-periodic face has a type for every component.
    ///
    /// # Errors
    /// `InvalidBc` naming the lowest node of the face.
    pub fn validate(&self, geom: &Geometry) -> Result<()> {
        if geom.dim != self.dim {
            return Err(ElasticError::Config(format!(
                "BC matrix is {}D but geometry is {}D",
                self.dim, geom.dim
            )));
        }
        for face in Face::all(self.dim) {
            if geom.periodic[face.dir] {
                continue;
            }
            for c in 0..self.dim {
                if self.bc_type(face, c).is_none() {
                    let mut node = geom.domain.lo;
                    if face.side == Side::Hi {
                        node[face.dir] = geom.domain.hi[face.dir];
                    }
                    return Err(ElasticError::InvalidBc {
                        node,
                        face: face.label(),
                        component: c,
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve the equation for component `p` at node `m`.
    ///
    /// # Errors
    /// `InvalidBc` if `m` lies on a face with no type for `p`.
    pub fn row(&self, geom: &Geometry, m: NodeIndex, p: usize) -> Result<BoundaryRow> {
        let mut terms = [None; 3];
        let mut value = 0.0;
        let mut on_face = false;
        for face in Face::all(self.dim) {
            if !face.contains(geom, m) {
                continue;
            }
            on_face = true;
            let kind = self.bc_type(face, p).ok_or_else(|| ElasticError::InvalidBc {
                node: m,
                face: face.label(),
                component: p,
            })?;
            if kind == BcType::Displacement {
                return Ok(BoundaryRow::Displacement {
                    value: self.value(face, p),
                });
            }
            terms[face.dir] = Some(FaceTerm { face, kind });
            value += self.value(face, p);
        }
        if on_face {
            Ok(BoundaryRow::Flux { terms, value })
        } else {
            Ok(BoundaryRow::Interior)
        }
    }

    /// True if component `p` at `m` has a prescribed displacement.
    pub fn is_dirichlet(&self, geom: &Geometry, m: NodeIndex, p: usize) -> Result<bool> {
        Ok(matches!(self.row(geom, m, p)?, BoundaryRow::Displacement { .. }))
    }

    /// Tension test: clamped at xlo, pulled by `disp` in x at xhi, lateral
    /// faces traction free.
    pub fn uniaxial_stress_clamp(dim: usize, disp: f64) -> Self {
        let mut bc = Self::all_displacement(dim);
        bc.set(Face::hi(0), 0, BcType::Displacement, disp);
        for d in 1..dim {
            bc.set_face(Face::lo(d), BcType::Traction, [0.0; 3]);
            bc.set_face(Face::hi(d), BcType::Traction, [0.0; 3]);
        }
        bc
    }

    /// Tension test with minimal constraints: u_x fixed at both x faces,
    /// u_d fixed on the low face of d, everything else traction free.
    pub fn uniaxial_stress(dim: usize, disp: f64) -> Self {
        let mut bc = Self::uniform(dim, BcType::Traction);
        bc.set(Face::lo(0), 0, BcType::Displacement, 0.0);
        bc.set(Face::hi(0), 0, BcType::Displacement, disp);
        for d in 1..dim {
            bc.set(Face::lo(d), d, BcType::Displacement, 0.0);
        }
        bc
    }

    /// Cantilever bar loaded by a body force: clamped at xlo, free at xhi.
    ///
    /// With `rollers` the lateral faces fix only their normal displacement;
    /// otherwise they are traction free.
    pub fn clamped_bar(dim: usize, rollers: bool) -> Self {
        let mut bc = Self::uniform(dim, BcType::Traction);
        bc.set_face(Face::lo(0), BcType::Displacement, [0.0; 3]);
        if rollers {
            for d in 1..dim {
                bc.set(Face::lo(d), d, BcType::Displacement, 0.0);
                bc.set(Face::hi(d), d, BcType::Displacement, 0.0);
            }
        }
        bc
    }

    /// Build a named preset.
    pub fn from_preset(name: &str, dim: usize, disp: f64) -> std::result::Result<Self, String> {
        match name {
            "uniaxial_stress_clamp" => Ok(Self::uniaxial_stress_clamp(dim, disp)),
            "uniaxial_stress" => Ok(Self::uniaxial_stress(dim, disp)),
            "all_displacement" => Ok(Self::all_displacement(dim)),
            "clamped_bar" => Ok(Self::clamped_bar(dim, false)),
            "clamped_bar_rollers" => Ok(Self::clamped_bar(dim, true)),
            _ => Err(format!("Unknown BC preset: '{}'", name)),
        }
    }

    pub fn valid_presets() -> &'static [&'static str] {
        &[
            "uniaxial_stress_clamp",
            "uniaxial_stress",
            "all_displacement",
            "clamped_bar",
            "clamped_bar_rollers",
        ]
    }
}

/// Fill a right-hand side: body force on interior rows, prescribed values on
/// boundary rows.
///
/// # Arguments
/// * `bc` - Boundary condition matrix
/// * `geom` - Level geometry
/// * `rhs` - Field with `dim` components, overwritten on valid nodes
/// * `body_force` - Constant body force vector
pub fn init_rhs(
    bc: &BcMatrix,
    geom: &Geometry,
    rhs: &mut NodeField<f64>,
    body_force: [f64; 3],
) -> Result<()> {
    let dim = geom.dim;
    for fab in rhs.fabs_mut() {
        for m in fab.valid_box().iter() {
            for p in 0..dim {
                fab[(m, p)] = match bc.row(geom, m, p)? {
                    BoundaryRow::Interior => body_force[p],
                    BoundaryRow::Displacement { value } => value,
                    BoundaryRow::Flux { value, .. } => value,
                };
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::BoxLayout;

    fn geom(periodic: [bool; 3]) -> Geometry {
        Geometry::new(2, [4, 4, 0], [0.0; 3], [4.0, 4.0, 0.0], periodic).unwrap()
    }

    #[test]
    fn test_bc_type_from_str() {
        assert_eq!(BcType::from_str("traction"), Ok(BcType::Traction));
        assert_eq!(BcType::from_str("disp"), Ok(BcType::Displacement));
        assert!(BcType::from_str("robin").is_err());
        for s in BcType::valid_types() {
            assert!(BcType::from_str(s).is_ok());
        }
    }

    #[test]
    fn test_face_labels() {
        assert_eq!(Face::from_label("yhi"), Ok(Face::hi(1)));
        assert_eq!(Face::lo(2).label(), "zlo");
        assert!(Face::from_label("wlo").is_err());
        assert!(Face::from_label("xmid").is_err());
        assert_eq!(Face::all(3).len(), 6);
    }

    #[test]
    fn test_validate_reports_missing_face() {
        let g = geom([false; 3]);
        let mut bc = BcMatrix::all_displacement(2);
        assert!(bc.validate(&g).is_ok());
        bc.types[Face::hi(1).slot()][1] = None;
        match bc.validate(&g) {
            Err(ElasticError::InvalidBc { node, face, component }) => {
                assert_eq!(node, [0, 4, 0]);
                assert_eq!(face, "yhi");
                assert_eq!(component, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        // the same face is never visited when y is periodic
        assert!(bc.validate(&geom([false, true, false])).is_ok());
    }

    #[test]
    fn test_displacement_takes_precedence_at_corner() {
        let g = geom([false; 3]);
        let bc = BcMatrix::uniaxial_stress_clamp(2, 0.5);
        // xhi/ylo corner: x face prescribes u_x = 0.5, y face is traction free
        assert_eq!(
            bc.row(&g, [4, 0, 0], 0).unwrap(),
            BoundaryRow::Displacement { value: 0.5 }
        );
        assert!(bc.is_dirichlet(&g, [4, 0, 0], 1).unwrap());
        assert_eq!(bc.row(&g, [2, 2, 0], 0).unwrap(), BoundaryRow::Interior);
    }

    #[test]
    fn test_flux_terms_accumulate() {
        let g = geom([false; 3]);
        let mut bc = BcMatrix::uniform(2, BcType::Traction);
        bc.set(Face::hi(0), 1, BcType::Neumann, 2.0);
        bc.set(Face::hi(1), 1, BcType::Traction, 3.0);
        match bc.row(&g, [4, 4, 0], 1).unwrap() {
            BoundaryRow::Flux { terms, value } => {
                assert_eq!(terms[0].unwrap().kind, BcType::Neumann);
                assert_eq!(terms[1].unwrap().face, Face::hi(1));
                assert!(terms[2].is_none());
                assert_eq!(value, 5.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_periodic_face_is_interior() {
        let g = geom([true, false, false]);
        let bc = BcMatrix::all_displacement(2);
        assert_eq!(bc.row(&g, [0, 2, 0], 0).unwrap(), BoundaryRow::Interior);
    }

    #[test]
    fn test_presets() {
        let g = geom([false; 3]);
        let bc = BcMatrix::uniaxial_stress(2, 1.0);
        assert!(bc.is_dirichlet(&g, [0, 2, 0], 0).unwrap());
        assert!(!bc.is_dirichlet(&g, [0, 2, 0], 1).unwrap());
        assert!(bc.is_dirichlet(&g, [2, 0, 0], 1).unwrap());
        assert!(!bc.is_dirichlet(&g, [2, 4, 0], 1).unwrap());

        let rollers = BcMatrix::clamped_bar(2, true);
        assert!(rollers.is_dirichlet(&g, [2, 4, 0], 1).unwrap());
        assert!(!rollers.is_dirichlet(&g, [2, 4, 0], 0).unwrap());
        assert!(!rollers.is_dirichlet(&g, [4, 2, 0], 0).unwrap());

        assert!(BcMatrix::from_preset("clamped_bar", 2, 0.0).is_ok());
        assert!(BcMatrix::from_preset("shear", 2, 0.0).is_err());
        assert_eq!(BcMatrix::uniaxial_stress(2, 1.0).homogeneous().value(Face::hi(0), 0), 0.0);
    }

    #[test]
    fn test_init_rhs() {
        let g = geom([false; 3]);
        let layout = BoxLayout::chop(&g, 2, 1).unwrap();
        let mut rhs = NodeField::new(&layout, 2, 0, f64::NAN);
        let bc = BcMatrix::uniaxial_stress_clamp(2, 0.25);
        init_rhs(&bc, &g, &mut rhs, [1.0, -1.0, 0.0]).unwrap();
        assert_eq!(*rhs.get([2, 2, 0], 0).unwrap(), 1.0);
        assert_eq!(*rhs.get([2, 2, 0], 1).unwrap(), -1.0);
        assert_eq!(*rhs.get([4, 2, 0], 0).unwrap(), 0.25);
        assert_eq!(*rhs.get([2, 4, 0], 1).unwrap(), 0.0);
        assert!(rhs.find_non_finite().is_none());
    }
}
