//! Molecular structural analysis for synthesis-plan safety review.
//!
//! This crate owns the structural half of the review pipeline:
//!
//! - decode a SMILES string into an in-memory molecular graph ([`Mol`]),
//! - match a fixed library of hazardous substructure patterns against it,
//! - derive safety metrics (multi-nitro rule, (C+O)/N stability ratio,
//!   oxygen balance for CHNO(F,Cl) molecules),
//! - render a plain-text summary and an optional raster depiction.
//!
//! Invalid notation is a normal, expected input: [`analyzer::analyze`]
//! returns a `valid = false` result with a human-readable error rather than
//! failing, and no partial graph ever escapes the decoder.

pub mod analyzer;
pub mod depict;
pub mod element;
pub mod mol;
pub mod smarts;
pub mod smiles;
pub mod substruct;

pub use analyzer::{analyze, validate, AnalysisResult, DetailValue, HazardPattern};
pub use depict::depict;
pub use element::Element;
pub use mol::{Atom, Bond, BondOrder, Mol};
pub use smiles::SmilesError;
