//! Stored artifact encoding
//!
//! Layout: one format byte followed by the bincode encoding of
//! [`MatrixProfile`]. Decoding re-checks the profile's shape so a corrupted
//! payload never reaches the engine.

use thiserror::Error;

use mps_profile::{MatrixProfile, ProfileError};

const FORMAT_VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty payload")]
    Empty,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("decoded profile is inconsistent: {0}")]
    Inconsistent(#[from] ProfileError),
}

pub fn encode(artifact: &MatrixProfile) -> Result<Vec<u8>, CodecError> {
    let mut buf = vec![FORMAT_VERSION];
    bincode::serialize_into(&mut buf, artifact)?;
    Ok(buf)
}

pub fn decode(bytes: &[u8]) -> Result<MatrixProfile, CodecError> {
    match bytes.split_first() {
        None => Err(CodecError::Empty),
        Some((&FORMAT_VERSION, body)) => {
            let artifact: MatrixProfile = bincode::deserialize(body)?;
            artifact.validate()?;
            Ok(artifact)
        }
        Some((&other, _)) => Err(CodecError::UnsupportedVersion(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mps_profile::{AnnotationKind, ProfileEngine};

    fn artifact() -> MatrixProfile {
        let series: Vec<f64> = (0..200).map(|i| (i as f64 / 7.0).sin() + (i % 13) as f64 * 0.01).collect();
        ProfileEngine::new(1)
            .unwrap()
            .compute(&series, 16)
            .unwrap()
            .with_annotation(AnnotationKind::MeanStd)
    }

    #[test]
    fn test_round_trip_is_exact() {
        let mp = artifact();
        let bytes = encode(&mp).unwrap();
        assert_eq!(bytes[0], FORMAT_VERSION);
        assert_eq!(decode(&bytes).unwrap(), mp);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut bytes = encode(&artifact()).unwrap();
        bytes[0] = 99;
        assert!(matches!(decode(&bytes), Err(CodecError::UnsupportedVersion(99))));
    }

    #[test]
    fn test_rejects_truncated_payload() {
        let bytes = encode(&artifact()).unwrap();
        assert!(matches!(decode(&bytes[..bytes.len() / 2]), Err(CodecError::Bincode(_))));
        assert!(matches!(decode(&[]), Err(CodecError::Empty)));
    }
}
