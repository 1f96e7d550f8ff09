//! Decoding registry leaf payloads into worker descriptors.

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::load_balancer::WorkerDescriptor;

/// JSON shape of a registration entry's value.
#[derive(Debug, Deserialize)]
struct WorkerSpec {
    url: String,

    #[serde(default)]
    public: bool,

    #[serde(default)]
    auth: String,
}

/// Why a registration entry could not be decoded. Never fatal to callers;
/// the entry is logged and skipped.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid worker payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invalid worker url: {0}")]
    Url(#[from] url::ParseError),
}

/// Decode a leaf value into a worker descriptor keyed by its registry path.
pub fn decode_worker(key: &str, raw: &str) -> Result<WorkerDescriptor, DecodeError> {
    let spec: WorkerSpec = serde_json::from_str(raw)?;
    let url = Url::parse(&spec.url)?;
    Ok(WorkerDescriptor::new(key, url, spec.public, spec.auth))
}
