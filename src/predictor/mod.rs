//! Structure predictors invoked by the job runner.
//!
//! A predictor turns an amino-acid sequence into a [`RawStructure`]. The
//! runner does not care whether that means a call to a remote folding
//! service ([`EsmAtlasPredictor`]) or a local PSI-BLAST + model pipeline
//! ([`LocalPredictor`]).

pub mod error;
pub mod esm_atlas;
pub mod local;
pub mod psiblast;

use async_trait::async_trait;
use serde::Deserialize;

use crate::jobs::PredictionKind;

pub use error::PredictorError;
pub use esm_atlas::EsmAtlasPredictor;
pub use local::{LocalPredictor, ModelCommand};
pub use psiblast::PsiBlast;

/// One backbone atom as emitted by a coordinate model: `[x, y, z, occupancy, b_factor]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f32; 5]")]
pub struct BackboneAtom {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub occupancy: f32,
    pub b_factor: f32,
}

impl From<[f32; 5]> for BackboneAtom {
    fn from([x, y, z, occupancy, b_factor]: [f32; 5]) -> Self {
        Self {
            x,
            y,
            z,
            occupancy,
            b_factor,
        }
    }
}

/// Unprocessed predictor output, before an artifact writer persists it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawStructure {
    /// PDB text as returned by a folding service.
    Pdb(String),
    /// Backbone atoms, four per residue in `N, CA, C, O` order.
    Backbone(Vec<BackboneAtom>),
    /// Square residue-residue distance matrix in Ångström.
    DistanceMap(Vec<Vec<f32>>),
}

impl RawStructure {
    /// The kind of job this output can complete.
    pub fn kind(&self) -> PredictionKind {
        match self {
            RawStructure::Pdb(_) | RawStructure::Backbone(_) => PredictionKind::Structure,
            RawStructure::DistanceMap(_) => PredictionKind::Contacts,
        }
    }
}

/// Something that can predict a structure for a sequence.
///
/// Implementations report every failure through [`PredictorError`]; the
/// runner additionally guards against panics, but a predictor should never
/// rely on that.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn predict(&self, sequence: &str) -> Result<RawStructure, PredictorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backbone_atom_deserializes_from_array() {
        let atom: BackboneAtom = serde_json::from_str("[1.5, -2.0, 3.25, 1.0, 0.5]").unwrap();
        assert_eq!(
            atom,
            BackboneAtom {
                x: 1.5,
                y: -2.0,
                z: 3.25,
                occupancy: 1.0,
                b_factor: 0.5,
            }
        );
    }

    #[test]
    fn backbone_atom_rejects_short_rows() {
        assert!(serde_json::from_str::<BackboneAtom>("[1.0, 2.0, 3.0]").is_err());
    }
}
