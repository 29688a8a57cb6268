//! On-disk cache storage
//!
//! Layout under the storage root:
//!
//! ```text
//! <sha256(generation)[..16]>/
//!     generation.json          name + created_at
//!     <sha256(key)>.entry      JSON header line, then the raw body
//! ```
//!
//! An entry is one file, written under a temporary name and renamed into
//! place, so a reader sees either the previous entry or the new one. A batch
//! keeps a hard link to every entry it replaces until the whole batch is in
//! place, and puts those back if any rename fails.

use super::{CacheStorage, GenerationInfo};
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::fetch::{Response, ResponseKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const GENERATION_FILE: &str = "generation.json";
const ENTRY_EXTENSION: &str = "entry";

#[derive(Debug, Serialize, Deserialize)]
struct GenerationMeta {
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    kind: ResponseKind,
    url: String,
    headers: Vec<(String, String)>,
    stored_at: DateTime<Utc>,
}

/// Entry written under a temporary name but not yet renamed into place
struct StagedEntry {
    tmp: PathBuf,
    path: PathBuf,
    /// Hard link to the entry this one replaced
    backup: Option<PathBuf>,
}

/// Cache storage persisted as plain files
pub struct DiskStorage {
    root: PathBuf,
}

fn digest(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

fn sibling(path: &Path, tag: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}-{}", tag, uuid::Uuid::new_v4().simple()));
    PathBuf::from(name)
}

fn tmp_path(path: &Path) -> PathBuf {
    sibling(path, "tmp")
}

/// Header line (compact JSON never contains a raw newline) followed by the body
fn encode_entry(meta: &EntryMeta, body: &[u8]) -> ShellcacheResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec(meta)?;
    bytes.push(b'\n');
    bytes.extend_from_slice(body);
    Ok(bytes)
}

fn decode_entry(bytes: Vec<u8>) -> Result<(EntryMeta, Vec<u8>), String> {
    let split = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| "entry has no header".to_string())?;
    let meta = serde_json::from_slice(&bytes[..split]).map_err(|e| e.to_string())?;
    Ok((meta, bytes[split + 1..].to_vec()))
}

impl DiskStorage {
    /// Create a storage rooted at `root` (created lazily)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, generation: &str) -> PathBuf {
        self.root.join(&digest(generation)[..16])
    }

    fn entry_path(&self, generation: &str, key: &str) -> PathBuf {
        self.generation_dir(generation)
            .join(format!("{}.{}", digest(key), ENTRY_EXTENSION))
    }

    async fn read_generation_meta(dir: &Path) -> ShellcacheResult<Option<GenerationMeta>> {
        let path = dir.join(GENERATION_FILE);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ShellcacheError::io(format!("reading {}", path.display()), e)),
        }
    }

    async fn generations(&self) -> ShellcacheResult<Vec<(PathBuf, GenerationMeta)>> {
        let listing = |e: std::io::Error| ShellcacheError::io(format!("listing {}", self.root.display()), e);

        let mut read_dir = match fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(listing(e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(listing)? {
            if !entry.file_type().await.map_err(listing)?.is_dir() {
                continue;
            }
            let path = entry.path();
            if let Some(meta) = Self::read_generation_meta(&path).await? {
                found.push((path, meta));
            }
        }

        found.sort_by(|(_, a), (_, b)| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(found)
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = tmp_path(path);
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }

    async fn stage(
        &self,
        generation: &str,
        key: &str,
        response: &Response,
    ) -> ShellcacheResult<StagedEntry> {
        let meta = EntryMeta {
            key: key.to_string(),
            status: response.status,
            kind: response.kind,
            url: response.url.clone(),
            headers: response.headers.clone(),
            stored_at: Utc::now(),
        };
        let bytes = encode_entry(&meta, &response.body)?;

        let path = self.entry_path(generation, key);
        let staged = StagedEntry {
            tmp: tmp_path(&path),
            path,
            backup: None,
        };

        if let Err(e) = fs::write(&staged.tmp, &bytes).await {
            let _ = fs::remove_file(&staged.tmp).await;
            return Err(ShellcacheError::cache_write(generation, e));
        }
        Ok(staged)
    }

    /// Link the current entry aside, then rename the staged one over it
    async fn replace(staged: &mut StagedEntry) -> std::io::Result<()> {
        let backup = sibling(&staged.path, "bak");
        match fs::hard_link(&staged.path, &backup).await {
            Ok(()) => staged.backup = Some(backup),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::rename(&staged.tmp, &staged.path).await
    }

    async fn put_batch(
        &self,
        generation: &str,
        entries: &[(String, Response)],
    ) -> ShellcacheResult<()> {
        let mut staged = Vec::with_capacity(entries.len());
        for (key, response) in entries {
            match self.stage(generation, key, response).await {
                Ok(entry) => staged.push(entry),
                Err(e) => {
                    for entry in &staged {
                        let _ = fs::remove_file(&entry.tmp).await;
                    }
                    return Err(e);
                }
            }
        }

        for index in 0..staged.len() {
            if let Err(e) = Self::replace(&mut staged[index]).await {
                Self::roll_back(&staged, index).await;
                return Err(ShellcacheError::cache_write(generation, e));
            }
        }

        for backup in staged.iter().filter_map(|entry| entry.backup.as_ref()) {
            let _ = fs::remove_file(backup).await;
        }
        debug!("Stored {} entries in {}", staged.len(), generation);
        Ok(())
    }

    /// Undo a batch whose rename at `failed` went wrong. Newest first, so a
    /// key staged twice ends on its original entry.
    async fn roll_back(staged: &[StagedEntry], failed: usize) {
        for (index, entry) in staged.iter().enumerate().rev() {
            let _ = fs::remove_file(&entry.tmp).await;
            if index > failed {
                continue;
            }
            let restored = match &entry.backup {
                Some(backup) => fs::rename(backup, &entry.path).await,
                // only entries this batch created are removed
                None if index < failed => fs::remove_file(&entry.path).await,
                None => Ok(()),
            };
            if let Err(e) = restored {
                warn!("Could not restore {}: {}", entry.path.display(), e);
            }
        }
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, generation: &str) -> ShellcacheResult<()> {
        let dir = self.generation_dir(generation);
        if Self::read_generation_meta(&dir).await?.is_some() {
            return Ok(());
        }

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ShellcacheError::io(format!("creating {}", dir.display()), e))?;

        let meta = GenerationMeta {
            name: generation.to_string(),
            created_at: Utc::now(),
        };
        Self::write_atomic(&dir.join(GENERATION_FILE), &serde_json::to_vec_pretty(&meta)?)
            .await
            .map_err(|e| ShellcacheError::cache_write(generation, e))?;

        debug!("Opened cache generation {} at {}", generation, dir.display());
        Ok(())
    }

    async fn has(&self, generation: &str) -> ShellcacheResult<bool> {
        Ok(Self::read_generation_meta(&self.generation_dir(generation))
            .await?
            .is_some())
    }

    async fn keys(&self) -> ShellcacheResult<Vec<String>> {
        Ok(self
            .generations()
            .await?
            .into_iter()
            .map(|(_, meta)| meta.name)
            .collect())
    }

    async fn delete(&self, generation: &str) -> ShellcacheResult<bool> {
        let dir = self.generation_dir(generation);
        if !self.has(generation).await? {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| ShellcacheError::io(format!("removing {}", dir.display()), e))?;
        debug!("Deleted cache generation {}", generation);
        Ok(true)
    }

    async fn match_in(&self, generation: &str, key: &str) -> ShellcacheResult<Option<Response>> {
        let bytes = match fs::read(self.entry_path(generation, key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ShellcacheError::cache_read(generation, e)),
        };
        let (meta, body) =
            decode_entry(bytes).map_err(|e| ShellcacheError::cache_read(generation, e))?;
        if meta.key != key {
            return Ok(None);
        }

        Ok(Some(Response {
            status: meta.status,
            kind: meta.kind,
            url: meta.url,
            headers: meta.headers,
            body,
        }))
    }

    async fn put(&self, generation: &str, key: &str, response: &Response) -> ShellcacheResult<()> {
        self.open(generation).await?;
        let staged = self.stage(generation, key, response).await?;
        if let Err(e) = fs::rename(&staged.tmp, &staged.path).await {
            let _ = fs::remove_file(&staged.tmp).await;
            return Err(ShellcacheError::cache_write(generation, e));
        }
        Ok(())
    }

    async fn put_all(
        &self,
        generation: &str,
        entries: &[(String, Response)],
    ) -> ShellcacheResult<()> {
        let created = !self.has(generation).await?;
        self.open(generation).await?;

        let result = self.put_batch(generation, entries).await;
        if result.is_err() && created {
            // nothing from this batch may remain, including the generation
            let _ = self.delete(generation).await;
        }
        result
    }

    async fn entries(&self, generation: &str) -> ShellcacheResult<Vec<String>> {
        let dir = self.generation_dir(generation);
        if !self.has(generation).await? {
            return Err(ShellcacheError::GenerationNotFound(generation.to_string()));
        }

        let mut read_dir = fs::read_dir(&dir)
            .await
            .map_err(|e| ShellcacheError::cache_read(generation, e))?;

        let mut keys = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| ShellcacheError::cache_read(generation, e))?
        {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                continue;
            }
            let bytes = fs::read(&path)
                .await
                .map_err(|e| ShellcacheError::cache_read(generation, e))?;
            let (meta, _) =
                decode_entry(bytes).map_err(|e| ShellcacheError::cache_read(generation, e))?;
            keys.push(meta.key);
        }

        keys.sort();
        Ok(keys)
    }

    async fn info(&self) -> ShellcacheResult<Vec<GenerationInfo>> {
        let mut infos = Vec::new();
        for (_, meta) in self.generations().await? {
            let entries = self.entries(&meta.name).await?.len();
            infos.push(GenerationInfo {
                name: meta.name,
                created_at: meta.created_at,
                entries,
            });
        }
        Ok(infos)
    }
}
