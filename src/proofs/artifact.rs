use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::proofs::helper::decimals_to_hex;

/// Groth16 point shapes: a and c are G1 points, b is a G2 point.
const G1_COORDS: usize = 2;
const G2_COORDS: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPoints {
    pub a: Vec<String>,
    pub b: Vec<Vec<String>>,
    pub c: Vec<String>,
}

/// Prover output. Values are decimal strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    pub proof: ProofPoints,
    pub inputs: Vec<String>,
}

impl ProofArtifact {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::ProverFailure(format!("missing proof artifact {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::ProverFailure(format!("unreadable proof artifact: {e}")))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPayload {
    pub a: Vec<String>,
    pub b: Vec<Vec<String>>,
    pub c: Vec<String>,
    pub inputs: Vec<String>,
}

/// What the verifier contract receives for one batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub start: u64,
    pub end: u64,
    pub proof: ProofPayload,
}

fn check_shape(artifact: &ProofArtifact, scheme: &str) -> Result<()> {
    if let Some(declared) = &artifact.scheme {
        if declared != scheme {
            return Err(Error::ProverFailure(format!(
                "artifact scheme {declared:?} does not match {scheme:?}"
            )));
        }
    }

    let points = &artifact.proof;
    let b_ok = points.b.len() == G2_COORDS && points.b.iter().all(|pair| pair.len() == 2);
    if points.a.len() != G1_COORDS || !b_ok || points.c.len() != G1_COORDS {
        return Err(Error::ProverFailure(format!(
            "unexpected proof shape: a={} b={:?} c={}",
            points.a.len(),
            points.b.iter().map(|p| p.len()).collect::<Vec<_>>(),
            points.c.len()
        )));
    }
    if artifact.inputs.is_empty() {
        return Err(Error::ProverFailure("artifact has no inputs".to_string()));
    }
    Ok(())
}

/// Convert every value to fixed-width hex, keeping b's pairs intact.
pub fn reshape(
    artifact: &ProofArtifact,
    start: u64,
    end: u64,
    scheme: &str,
) -> Result<SubmissionPayload> {
    check_shape(artifact, scheme)?;

    let points = &artifact.proof;
    let proof = ProofPayload {
        a: decimals_to_hex(&points.a)?,
        b: points
            .b
            .iter()
            .map(|pair| decimals_to_hex(pair))
            .collect::<Result<Vec<_>>>()?,
        c: decimals_to_hex(&points.c)?,
        inputs: decimals_to_hex(&artifact.inputs)?,
    };

    Ok(SubmissionPayload { start, end, proof })
}
