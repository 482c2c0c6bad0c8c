//! Axisymmetric indentation meshes for finite element solvers.
//!
//! Indenter and sample outlines are derived from a few shape parameters,
//! meshed with gmsh, tagged with the node and element sets the solver needs
//! and written out as an input deck.

pub mod datatypes;
pub mod deck;
pub mod error;
pub mod geometry;
pub mod indenter;
pub mod input;
pub mod mesher;
pub mod model;
pub mod processing;
