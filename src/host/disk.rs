//! Durable cache storage on the local filesystem
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<sha256(namespace)>/namespace.json      name, sequence, created_at
//! <root>/<sha256(namespace)>/<sha256(key)>.json  key, stored_at, response
//! ```
//!
//! Batches are written to temporary files first and renamed into place only
//! once every entry of the batch has been written. Entries replaced by a
//! batch are kept as backups until the whole batch is committed, so a failed
//! commit restores the namespace to its previous contents.
//!
//! Unreadable metadata or entry files are skipped with a warning: a namespace
//! without valid metadata is not listed, and an unreadable entry is a miss.

use crate::error::{SwCacheError, SwCacheResult};
use crate::host::storage::CacheStorage;
use crate::http::{Request, Response};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const META_FILE: &str = "namespace.json";
const TMP_SUFFIX: &str = ".tmp";
const BACKUP_SUFFIX: &str = ".bak";

/// Metadata file stored in each namespace directory
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NamespaceMeta {
    name: String,
    sequence: u64,
    created_at: DateTime<Utc>,
}

/// One stored request/response pair
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    stored_at: DateTime<Utc>,
    response: Response,
}

fn digest(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Cache storage persisted as JSON files
pub struct DiskCacheStorage {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl DiskCacheStorage {
    /// Create a storage rooted at `root`; the directory is created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Storage root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(digest(namespace))
    }

    fn entry_file(&self, namespace: &str, key: &str) -> PathBuf {
        self.namespace_dir(namespace)
            .join(format!("{}.json", digest(key)))
    }

    async fn read_meta(dir: &Path) -> SwCacheResult<Option<NamespaceMeta>> {
        let path = dir.join(META_FILE);
        match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(meta) => Ok(Some(meta)),
                Err(e) => {
                    warn!("Ignoring unreadable metadata {}: {}", path.display(), e);
                    Ok(None)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SwCacheError::io(
                format!("reading namespace metadata in {}", dir.display()),
                e,
            )),
        }
    }

    async fn list_meta(&self) -> SwCacheResult<Vec<NamespaceMeta>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SwCacheError::io(
                    format!("listing cache storage {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut metas = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| SwCacheError::io("reading cache storage entry", e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            let path = entry.path();
            match Self::read_meta(&path).await {
                Ok(Some(meta)) => metas.push(meta),
                Ok(None) => warn!("Skipping {}: no namespace metadata", path.display()),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        metas.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.name.cmp(&b.name)));
        Ok(metas)
    }

    /// Create the namespace directory if needed. Caller holds the write lock.
    async fn ensure_namespace(&self, namespace: &str) -> SwCacheResult<PathBuf> {
        let dir = self.namespace_dir(namespace);
        if Self::read_meta(&dir).await?.is_some() {
            return Ok(dir);
        }

        let sequence = self
            .list_meta()
            .await?
            .iter()
            .map(|meta| meta.sequence + 1)
            .max()
            .unwrap_or(0);

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| SwCacheError::io(format!("creating namespace {}", namespace), e))?;

        let meta = NamespaceMeta {
            name: namespace.to_string(),
            sequence,
            created_at: Utc::now(),
        };
        let path = dir.join(META_FILE);
        let tmp = dir.join(format!("{}{}", META_FILE, TMP_SUFFIX));
        fs::write(&tmp, serde_json::to_vec_pretty(&meta)?)
            .await
            .map_err(|e| SwCacheError::io(format!("writing metadata for {}", namespace), e))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            Self::discard(&[tmp]).await;
            return Err(SwCacheError::io(format!("committing metadata for {}", namespace), e));
        }

        debug!("Created namespace {} at {}", namespace, dir.display());
        Ok(dir)
    }

    /// Move `tmp` into place, keeping any replaced entry as a backup
    async fn commit_entry(tmp: &Path, path: &Path) -> SwCacheResult<Option<PathBuf>> {
        let backup = match fs::symlink_metadata(path).await {
            Ok(meta) if meta.is_file() => {
                let backup = path.with_extension(format!("json{}", BACKUP_SUFFIX));
                fs::rename(path, &backup)
                    .await
                    .map_err(|e| SwCacheError::io(format!("backing up {}", path.display()), e))?;
                Some(backup)
            }
            Ok(_) => None,
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(SwCacheError::io(format!("inspecting {}", path.display()), e)),
        };

        if let Err(e) = fs::rename(tmp, path).await {
            if let Some(backup) = &backup {
                if let Err(restore) = fs::rename(backup, path).await {
                    warn!("Failed to restore {}: {}", path.display(), restore);
                }
            }
            return Err(SwCacheError::io(format!("committing {}", path.display()), e));
        }
        Ok(backup)
    }

    /// Undo committed entries, newest first
    async fn roll_back(committed: Vec<(PathBuf, Option<PathBuf>)>) {
        for (path, backup) in committed.into_iter().rev() {
            let undone = match &backup {
                Some(backup) => fs::rename(backup, &path).await,
                None => fs::remove_file(&path).await,
            };
            if let Err(e) = undone {
                warn!("Failed to roll back {}: {}", path.display(), e);
            }
        }
    }

    async fn discard(paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = fs::remove_file(path).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, namespace: &str) -> SwCacheResult<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_namespace(namespace).await?;
        Ok(())
    }

    async fn has(&self, namespace: &str) -> SwCacheResult<bool> {
        Ok(Self::read_meta(&self.namespace_dir(namespace))
            .await?
            .is_some())
    }

    async fn put_all(
        &self,
        namespace: &str,
        entries: Vec<(Request, Response)>,
    ) -> SwCacheResult<()> {
        let stored_at = Utc::now();
        let mut batch: BTreeMap<PathBuf, StoredEntry> = BTreeMap::new();
        for (request, response) in entries {
            let key = request.cache_key().ok_or_else(|| {
                SwCacheError::storage(
                    namespace,
                    format!("cannot store {} request for {}", request.method, request.url),
                )
            })?;
            batch.insert(
                self.entry_file(namespace, &key),
                StoredEntry {
                    key,
                    stored_at,
                    response,
                },
            );
        }

        let _guard = self.write_lock.lock().await;
        self.ensure_namespace(namespace).await?;

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(batch.len());
        for (path, entry) in &batch {
            let tmp = path.with_extension(format!("json{}", TMP_SUFFIX));
            let written = match serde_json::to_vec(entry) {
                Ok(bytes) => fs::write(&tmp, bytes)
                    .await
                    .map_err(|e| SwCacheError::io(format!("writing {}", tmp.display()), e)),
                Err(e) => Err(e.into()),
            };
            if let Err(e) = written {
                let mut leftovers: Vec<PathBuf> = staged.into_iter().map(|(t, _)| t).collect();
                leftovers.push(tmp);
                Self::discard(&leftovers).await;
                return Err(e);
            }
            staged.push((tmp, path.clone()));
        }

        let mut committed: Vec<(PathBuf, Option<PathBuf>)> = Vec::with_capacity(staged.len());
        let mut pending = staged.into_iter();
        while let Some((tmp, path)) = pending.next() {
            match Self::commit_entry(&tmp, &path).await {
                Ok(backup) => committed.push((path, backup)),
                Err(e) => {
                    let mut leftovers = vec![tmp];
                    leftovers.extend(pending.map(|(t, _)| t));
                    Self::discard(&leftovers).await;
                    Self::roll_back(committed).await;
                    warn!("Rolled back batch for {}: {}", namespace, e);
                    return Err(e);
                }
            }
        }

        let backups: Vec<PathBuf> = committed.into_iter().filter_map(|(_, b)| b).collect();
        Self::discard(&backups).await;

        debug!("Stored {} entries in {}", batch.len(), namespace);
        Ok(())
    }

    async fn match_in(
        &self,
        namespace: &str,
        request: &Request,
    ) -> SwCacheResult<Option<Response>> {
        let Some(key) = request.cache_key() else {
            return Ok(None);
        };

        let path = self.entry_file(namespace, &key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SwCacheError::io(format!("reading {}", path.display()), e)),
        };

        match serde_json::from_str::<StoredEntry>(&content) {
            Ok(entry) if entry.key == key => Ok(Some(entry.response)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("Ignoring unreadable entry {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    async fn keys(&self) -> SwCacheResult<Vec<String>> {
        Ok(self
            .list_meta()
            .await?
            .into_iter()
            .map(|meta| meta.name)
            .collect())
    }

    async fn delete(&self, namespace: &str) -> SwCacheResult<bool> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_dir_all(self.namespace_dir(namespace)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SwCacheError::storage(namespace, e.to_string())),
        }
    }

    fn storage_name(&self) -> &'static str {
        "disk"
    }
}
