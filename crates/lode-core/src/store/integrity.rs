//! Subresource-integrity (`sha512-<base64>`) verification of tarballs.

use super::StoreError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

/// Hash algorithms understood in integrity strings, strongest first.
const ALGORITHMS: [&str; 3] = ["sha512", "sha256", "sha1"];

/// Compute the integrity string of `bytes` for `algorithm`.
///
/// # Errors
/// Returns an error for an unsupported algorithm.
pub fn compute(algorithm: &str, bytes: &[u8]) -> Result<String, StoreError> {
    let digest = match algorithm {
        "sha512" => Sha512::digest(bytes).to_vec(),
        "sha256" => Sha256::digest(bytes).to_vec(),
        "sha1" => Sha1::digest(bytes).to_vec(),
        other => return Err(StoreError::InvalidIntegrity(other.to_string())),
    };
    Ok(format!("{algorithm}-{}", STANDARD.encode(digest)))
}

/// Check `bytes` against an integrity string.
///
/// The string may list several space-separated hashes; the strongest
/// supported algorithm present decides, and any of its hashes may match.
///
/// # Errors
/// Returns [`StoreError::InvalidIntegrity`] when no supported hash is
/// listed, [`StoreError::IntegrityMismatch`] when none matches.
pub fn verify(bytes: &[u8], integrity: &str) -> Result<(), StoreError> {
    let entries: Vec<(&str, &str)> = integrity
        .split_whitespace()
        .filter_map(|entry| entry.split_once('-'))
        .collect();

    let algorithm = ALGORITHMS
        .iter()
        .find(|alg| entries.iter().any(|(a, _)| a == *alg))
        .ok_or_else(|| StoreError::InvalidIntegrity(integrity.to_string()))?;

    let actual = compute(algorithm, bytes)?;
    let matches = entries
        .iter()
        .filter(|(a, _)| a == algorithm)
        .any(|(a, digest)| {
            // Options (`?foo`) trail the digest
            let digest = digest.split_once('?').map_or(*digest, |(d, _)| d);
            actual == format!("{a}-{digest}")
        });

    if matches {
        Ok(())
    } else {
        Err(StoreError::IntegrityMismatch {
            expected: integrity.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_known_sha512() {
        // echo -n "hello" | openssl dgst -sha512 -binary | base64
        assert_eq!(
            compute("sha512", b"hello").unwrap(),
            "sha512-m3HSJL1i83hdltRq0+o9czGb+8KJDKra4t/3JRlnPKcjI8PZm6XBHXx6zG4UuMXaDEZjR1wuXDre9G9zvN7AQw=="
        );
    }

    #[test]
    fn test_verify_roundtrip_each_algorithm() {
        for alg in ALGORITHMS {
            let integrity = compute(alg, b"content").unwrap();
            verify(b"content", &integrity).unwrap();
        }
    }

    #[test]
    fn test_verify_mismatch() {
        let integrity = compute("sha512", b"expected").unwrap();
        let err = verify(b"tampered", &integrity).unwrap_err();
        assert!(matches!(err, StoreError::IntegrityMismatch { .. }));
    }

    #[test]
    fn test_strongest_algorithm_decides() {
        let integrity = format!(
            "{} {}",
            compute("sha1", b"content").unwrap(),
            compute("sha512", b"other").unwrap()
        );
        assert!(verify(b"content", &integrity).is_err());
    }

    #[test]
    fn test_unsupported_algorithm() {
        let err = verify(b"x", "md5-abc").unwrap_err();
        assert!(matches!(err, StoreError::InvalidIntegrity(_)));
    }
}
