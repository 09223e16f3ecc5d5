// file: src/utils/crypto.rs
// version: 2.1.0
// guid: a158863e-89b5-496f-b0d3-d49a74a166fc

use crate::Result;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::path::Path;
use tokio::io::AsyncReadExt;

const READ_CHUNK: usize = 64 * 1024;

/// Digest algorithms that appear in OVF manifests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Spelling used in manifest lines, e.g. `SHA256(disk.vmdk)= ...`
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = crate::error::OvaDeployError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SHA1" => Ok(HashAlgorithm::Sha1),
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA512" => Ok(HashAlgorithm::Sha512),
            _ => Err(crate::error::OvaDeployError::manifest(format!(
                "Unsupported digest algorithm: {}",
                s
            ))),
        }
    }
}

/// Checksum helpers
pub struct CryptoUtils;

impl CryptoUtils {
    /// Calculate a file checksum as lowercase hex
    pub async fn calculate_file_checksum(path: &Path, algorithm: HashAlgorithm) -> Result<String> {
        let mut file = tokio::fs::File::open(path).await.map_err(|e| {
            crate::error::OvaDeployError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to open {} for checksum: {}", path.display(), e),
            ))
        })?;

        match algorithm {
            HashAlgorithm::Sha1 => hash_stream::<Sha1>(&mut file).await,
            HashAlgorithm::Sha256 => hash_stream::<Sha256>(&mut file).await,
            HashAlgorithm::Sha512 => hash_stream::<Sha512>(&mut file).await,
        }
    }

    /// Calculate a checksum of in-memory content as lowercase hex
    pub fn calculate_checksum(content: &[u8], algorithm: HashAlgorithm) -> String {
        match algorithm {
            HashAlgorithm::Sha1 => hex::encode(Sha1::digest(content)),
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(content)),
            HashAlgorithm::Sha512 => hex::encode(Sha512::digest(content)),
        }
    }

    /// Verify file integrity
    pub async fn verify_file_integrity(
        path: &Path,
        expected_checksum: &str,
        algorithm: HashAlgorithm,
    ) -> Result<bool> {
        let actual_checksum = Self::calculate_file_checksum(path, algorithm).await?;
        Ok(actual_checksum.eq_ignore_ascii_case(expected_checksum))
    }
}

async fn hash_stream<D: Digest>(file: &mut tokio::fs::File) -> Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
