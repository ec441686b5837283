use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::file_utils::FileManager;
use crate::language_utils::Direction;

/// Manifest stored next to an archived workbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub token: String,
    pub original_filename: String,
    pub direction: Direction,
    /// Hex SHA-256 of the archived bytes
    pub sha256: String,
    /// RFC 3339 creation time
    pub created_at: String,
}

/// Directory of workbooks archived at extraction time, keyed by token
#[derive(Debug, Clone)]
pub struct ExtractionArchive {
    dir: PathBuf,
}

impl ExtractionArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `source` into the archive under a fresh token and write its manifest
    pub fn store(&self, source: &Path, original_filename: &str, direction: Direction) -> Result<ArchiveManifest> {
        FileManager::ensure_dir(&self.dir)?;
        let token = Uuid::new_v4().simple().to_string();
        let original_filename = FileManager::sanitize_filename(original_filename);
        let archived = self.document_path(&token, &original_filename);

        FileManager::copy_file(source, &archived)?;
        let manifest = ArchiveManifest {
            sha256: FileManager::sha256_file(&archived)?,
            token,
            original_filename,
            direction,
            created_at: Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_string_pretty(&manifest).context("Failed to serialize archive manifest")?;
        FileManager::write_to_file(self.manifest_path(&manifest.token), &json)?;

        info!("Archived {} as {}", manifest.original_filename, &manifest.token[..8]);
        Ok(manifest)
    }

    /// Look up a token and verify the archived bytes still match the manifest.
    ///
    /// Returns the manifest and the path of the archived workbook.
    pub fn open(&self, token: &str) -> Result<(ArchiveManifest, PathBuf)> {
        let token = token.trim();
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            bail!("Invalid extraction token: {:?}", token);
        }
        let manifest_path = self.manifest_path(token);
        if !manifest_path.is_file() {
            return Err(anyhow!("Unknown extraction token: {}", token));
        }
        let content = FileManager::read_to_string(&manifest_path)?;
        let manifest: ArchiveManifest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse archive manifest: {:?}", manifest_path))?;

        let archived = self.document_path(&manifest.token, &manifest.original_filename);
        let actual = FileManager::sha256_file(&archived)
            .with_context(|| format!("Archived workbook missing for token {}", token))?;
        if actual != manifest.sha256 {
            bail!("Archive checksum mismatch for token {}", token);
        }
        debug!("Verified archive {} ({})", token, manifest.original_filename);
        Ok((manifest, archived))
    }

    /// Delete an archived workbook and its manifest, ignoring missing files
    pub fn remove(&self, token: &str) -> Result<()> {
        let manifest_path = self.manifest_path(token);
        if let Ok(content) = std::fs::read_to_string(&manifest_path) {
            if let Ok(manifest) = serde_json::from_str::<ArchiveManifest>(&content) {
                let _ = std::fs::remove_file(self.document_path(&manifest.token, &manifest.original_filename));
            }
        }
        match std::fs::remove_file(&manifest_path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("Failed to remove {:?}", manifest_path))
            }
            _ => Ok(()),
        }
    }

    /// Remove archives created more than `max_age` ago; returns their tokens.
    ///
    /// Manifests that cannot be read are left alone.
    pub fn sweep_expired(&self, max_age: Duration) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut removed = Vec::new();

        let entries = std::fs::read_dir(&self.dir).with_context(|| format!("Failed to list {:?}", self.dir))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let manifest = match FileManager::read_to_string(&path)
                .and_then(|content| serde_json::from_str::<ArchiveManifest>(&content).map_err(Into::into))
            {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!("Skipping unreadable archive manifest {:?}: {}", path, e);
                    continue;
                }
            };
            let created = match DateTime::parse_from_rfc3339(&manifest.created_at) {
                Ok(created) => created.with_timezone(&Utc),
                Err(e) => {
                    warn!("Archive {} has a bad creation time: {}", manifest.token, e);
                    continue;
                }
            };
            if now.signed_duration_since(created) >= max_age {
                self.remove(&manifest.token)?;
                removed.push(manifest.token);
            }
        }
        if !removed.is_empty() {
            info!("Swept {} expired extraction archive(s)", removed.len());
        }
        Ok(removed)
    }

    fn document_path(&self, token: &str, filename: &str) -> PathBuf {
        self.dir.join(format!("{}_{}", token, filename))
    }

    fn manifest_path(&self, token: &str) -> PathBuf {
        self.dir.join(format!("{}.json", token))
    }
}
