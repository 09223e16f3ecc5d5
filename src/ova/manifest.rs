// file: src/ova/manifest.rs
// version: 1.1.0
// guid: 87eb1574-c38b-4666-9b57-d8dcd61f215c

//! OVF manifest (`.mf`) parsing and digest repair

use crate::error::OvaDeployError;
use crate::utils::{CryptoUtils, HashAlgorithm};
use crate::Result;
use regex::Regex;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// One `ALG(file)= digest` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub algorithm: HashAlgorithm,
    pub file: String,
    pub digest: String,
    /// Original line text, kept until the entry is modified
    raw: Option<String>,
}

impl ManifestEntry {
    pub fn new(
        algorithm: HashAlgorithm,
        file: impl Into<String>,
        digest: impl Into<String>,
    ) -> Self {
        Self {
            algorithm,
            file: file.into(),
            digest: digest.into(),
            raw: None,
        }
    }

    fn render(&self) -> String {
        match &self.raw {
            Some(raw) => raw.clone(),
            None => format!("{}({})= {}", self.algorithm.as_str(), self.file, self.digest),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self> {
        let re = Regex::new(r"^\s*([A-Za-z0-9]+)\((.+)\)\s*=\s*([0-9A-Fa-f]+)\s*$")
            .map_err(|e| OvaDeployError::manifest(format!("Invalid regex pattern: {}", e)))?;

        let mut entries = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let caps = re.captures(line).ok_or_else(|| {
                OvaDeployError::manifest(format!(
                    "Malformed manifest line {}: {}",
                    number + 1,
                    line
                ))
            })?;
            entries.push(ManifestEntry {
                algorithm: caps[1].parse()?,
                file: caps[2].to_string(),
                digest: caps[3].to_string(),
                raw: Some(line.trim_end().to_string()),
            });
        }

        Ok(Self { entries })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            OvaDeployError::manifest(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render()).await?;
        Ok(())
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn entry(&self, file: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.file == file)
    }

    /// Replace the digest recorded for `file`
    pub fn set_digest(&mut self, file: &str, digest: impl Into<String>) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.file == file)
            .ok_or_else(|| OvaDeployError::manifest(format!("No manifest entry for {}", file)))?;
        entry.digest = digest.into();
        entry.raw = None;
        Ok(())
    }

    /// Append an entry, or replace the one already recorded for the same file
    pub fn upsert(&mut self, entry: ManifestEntry) {
        match self.entries.iter_mut().find(|e| e.file == entry.file) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Recompute the digest of `file` inside `dir` with the algorithm the
    /// manifest already uses for it
    pub async fn refresh(&mut self, dir: &Path, file: &str) -> Result<String> {
        let algorithm = self
            .entry(file)
            .map(|e| e.algorithm)
            .ok_or_else(|| OvaDeployError::manifest(format!("No manifest entry for {}", file)))?;
        let digest = CryptoUtils::calculate_file_checksum(&dir.join(file), algorithm).await?;
        debug!("{}({}) = {}", algorithm.as_str(), file, digest);
        self.set_digest(file, digest.clone())?;
        Ok(digest)
    }

    /// Check the recorded digest of `file` against its content in `dir`
    pub async fn verify(&self, dir: &Path, file: &str) -> Result<bool> {
        let entry = self
            .entry(file)
            .ok_or_else(|| OvaDeployError::manifest(format!("No manifest entry for {}", file)))?;
        CryptoUtils::verify_file_integrity(&dir.join(file), &entry.digest, entry.algorithm).await
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.render());
            out.push('\n');
        }
        out
    }
}
