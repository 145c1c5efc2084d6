use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{ENCODING_BYTES, ENCODING_DIMENSIONS};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("invalid encoding: expected {expected} values, got {actual}")]
    InvalidEncoding { expected: usize, actual: usize },
    #[error("invalid encoding bytes: expected {expected} bytes, got {actual}")]
    InvalidByteLength { expected: usize, actual: usize },
}

/// A 128-dimensional face feature vector.
///
/// The length is checked on construction, so every `FaceEncoding` in the
/// system can be compared against any other without further validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FaceEncoding {
    values: Vec<f64>,
}

impl FaceEncoding {
    pub fn new(values: Vec<f64>) -> Result<Self, EncodingError> {
        if values.len() != ENCODING_DIMENSIONS {
            return Err(EncodingError::InvalidEncoding {
                expected: ENCODING_DIMENSIONS,
                actual: values.len(),
            });
        }
        Ok(Self { values })
    }

    pub fn from_slice(values: &[f64]) -> Result<Self, EncodingError> {
        Self::new(values.to_vec())
    }

    /// Decodes 128 consecutive little-endian `f64`s.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        if bytes.len() != ENCODING_BYTES {
            return Err(EncodingError::InvalidByteLength {
                expected: ENCODING_BYTES,
                actual: bytes.len(),
            });
        }
        let values = bytes
            .chunks_exact(std::mem::size_of::<f64>())
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect();
        Ok(Self { values })
    }

    /// Encodes as 128 consecutive little-endian `f64`s (1024 bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ENCODING_BYTES);
        for value in &self.values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Euclidean distance in feature space.
    pub fn distance(&self, other: &FaceEncoding) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl TryFrom<Vec<f64>> for FaceEncoding {
    type Error = EncodingError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<FaceEncoding> for Vec<f64> {
    fn from(encoding: FaceEncoding) -> Self {
        encoding.values
    }
}
