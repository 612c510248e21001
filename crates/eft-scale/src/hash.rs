use eft_core::errors::EftError;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::accumulator::BinAccumulator;
use crate::model::ScalingModel;
use crate::serde::to_canonical_json_bytes;

/// Computes a stable SHA256 hash for the provided serializable value.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, EftError> {
    let bytes = to_canonical_json_bytes(value)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

#[derive(Serialize)]
struct ModelDigest<'a> {
    nbins: usize,
    sm_vals: &'a [f64],
    terms: Vec<(&'a [String], &'a [f64], &'a [f64])>,
}

/// Digest of a model's numeric content; edges and labels are ignored.
pub fn model_digest(model: &ScalingModel) -> Result<String, EftError> {
    stable_hash_string(&ModelDigest {
        nbins: model.nbins(),
        sm_vals: model.nominal(),
        terms: model
            .terms()
            .iter()
            .map(|t| (t.params(), t.values(), t.uncertainties()))
            .collect(),
    })
}

/// Digest of the raw sums held by an accumulator.
pub fn accumulator_digest(acc: &BinAccumulator) -> Result<String, EftError> {
    stable_hash_string(&acc.to_nested())
}
