//! Persisted vector collection over the rule corpus.
//!
//! One collection is one CBOR file at `<dir>/<collection>.rules.cbor`
//! holding the rule units, their embedding vectors, and the embedder id
//! they were built with. Rebuild is full-replace: embed every unit, write
//! to a temp file, `rename` over the old one, then swap the in-memory
//! handle. Readers holding the previous `Arc` finish against the old
//! collection.
//!
//! Search is ANN (HNSW) followed by exact dot-product re-scoring, so the
//! returned order is deterministic for a fixed collection: similarity
//! descending, insertion id ascending on ties.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use hnsw_rs::prelude::{DistL2, Hnsw};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::corpus::RuleUnit;
use crate::embed::{dot, Embedder};

pub const COLLECTION_FILE_VERSION_V1: &str = "chemsafe_rules_v1";

#[derive(Debug, Clone, thiserror::Error)]
pub enum IndexError {
    #[error("retrieval index unavailable: no collection has been built")]
    Unavailable,
    #[error("collection {path} was built with embedder {found} but this binary uses {expected}; rebuild the index")]
    EmbedderMismatch { path: String, found: String, expected: String },
    #[error("index io error at {path}: {message}")]
    Io { path: String, message: String },
    #[error("collection {path} is not a valid collection file: {message}")]
    Codec { path: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionItemV1 {
    unit: RuleUnit,
    vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionFileV1 {
    version: String,
    embedder: String,
    dim: usize,
    built_at_unix_secs: u64,
    /// sha256 over the concatenated retrievable texts, for status reporting.
    corpus_digest: String,
    items: Vec<CollectionItemV1>,
}

/// A search hit: the rule plus its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct RetrievedRule {
    pub rule: RuleUnit,
    pub similarity: f32,
}

/// Collection metadata for status reporting.
#[derive(Debug, Clone)]
pub struct CollectionStatus {
    pub rules: usize,
    pub embedder: String,
    pub dim: usize,
    pub built_at_unix_secs: u64,
    pub corpus_digest: String,
}

struct LoadedCollection {
    units: Vec<RuleUnit>,
    // Vectors aligned with `units`; kept for exact re-scoring.
    vectors: Vec<Vec<f32>>,
    hnsw: Hnsw<'static, f32, DistL2>,
    built_at_unix_secs: u64,
    corpus_digest: String,
}

/// Handle to one named collection on disk plus its in-memory ANN index.
pub struct RuleIndex {
    embedder: Arc<dyn Embedder>,
    dir: PathBuf,
    collection: String,
    // Serializes rebuilds; searches never take it.
    rebuild_lock: Mutex<()>,
    active: RwLock<Option<Arc<LoadedCollection>>>,
}

impl RuleIndex {
    /// Open a handle. If a persisted collection exists and matches the
    /// embedder it is loaded eagerly. A missing, unreadable or corrupt file
    /// leaves the index empty — `count()` reports 0 and gates review — so
    /// storage damage degrades to "knowledge base not built" instead of
    /// making the count itself unreachable. Only an embedder mismatch is a
    /// hard error: that file is intact but belongs to a different vector
    /// space, and a rebuild must be an explicit operator decision.
    pub fn open(
        dir: impl Into<PathBuf>,
        collection: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, IndexError> {
        let index = Self {
            embedder,
            dir: dir.into(),
            collection: collection.to_string(),
            rebuild_lock: Mutex::new(()),
            active: RwLock::new(None),
        };
        match index.load_from_disk() {
            Ok(loaded) => {
                *index.active.write() = loaded.map(Arc::new);
                Ok(index)
            }
            Err(e @ IndexError::EmbedderMismatch { .. }) => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "collection unreadable; opening with an empty index");
                Ok(index)
            }
        }
    }

    /// Path of the persisted collection file.
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(format!("{}.rules.cbor", self.collection))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Number of rules in the active collection; 0 when none is loaded.
    pub fn count(&self) -> usize {
        self.active.read().as_ref().map_or(0, |c| c.units.len())
    }

    pub fn status(&self) -> Option<CollectionStatus> {
        let guard = self.active.read();
        let loaded = guard.as_ref()?;
        Some(CollectionStatus {
            rules: loaded.units.len(),
            embedder: self.embedder.id().to_string(),
            dim: self.embedder.dim(),
            built_at_unix_secs: loaded.built_at_unix_secs,
            corpus_digest: loaded.corpus_digest.clone(),
        })
    }

    /// Replace the collection with `units`: embed everything, persist
    /// atomically, rebuild the ANN structure, swap the handle. Returns the
    /// number of rules indexed.
    pub fn rebuild(&self, units: Vec<RuleUnit>) -> Result<usize, IndexError> {
        let _guard = self.rebuild_lock.lock();

        let mut digest = Sha256::new();
        let mut vectors = Vec::with_capacity(units.len());
        for unit in &units {
            let text = unit.text();
            digest.update(text.as_bytes());
            digest.update([0u8]);
            vectors.push(self.embedder.embed(&text));
        }
        let corpus_digest = format!("sha256:{:x}", digest.finalize());
        let built_at_unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let file = CollectionFileV1 {
            version: COLLECTION_FILE_VERSION_V1.to_string(),
            embedder: self.embedder.id().to_string(),
            dim: self.embedder.dim(),
            built_at_unix_secs,
            corpus_digest: corpus_digest.clone(),
            items: units
                .iter()
                .cloned()
                .zip(vectors.iter().cloned())
                .map(|(unit, vector)| CollectionItemV1 { unit, vector })
                .collect(),
        };
        self.persist(&file)?;

        let count = units.len();
        let loaded = LoadedCollection {
            hnsw: build_hnsw(&vectors),
            units,
            vectors,
            built_at_unix_secs,
            corpus_digest,
        };
        *self.active.write() = Some(Arc::new(loaded));
        tracing::info!(collection = %self.collection, rules = count, "rebuilt rule collection");
        Ok(count)
    }

    /// Top-k retrieval against the active collection.
    ///
    /// ANN over-fetches 4×k, every candidate is re-scored with the exact
    /// dot product, and ties break toward lower insertion id.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedRule>, IndexError> {
        let loaded = self.active.read().clone().ok_or(IndexError::Unavailable)?;
        if loaded.units.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let qv = self.embedder.embed(query);
        // Over-fetch for re-scoring headroom, but never below k itself:
        // the caller is owed k hits whenever the collection holds them.
        let over_k = k.max(k.saturating_mul(4).min(200));
        let ef_search = 64.max(over_k);
        let neigh = loaded.hnsw.search(&qv, over_k, ef_search);

        let mut scored: Vec<(f32, usize)> = Vec::with_capacity(neigh.len());
        for n in neigh {
            let idx = n.d_id;
            if idx >= loaded.units.len() {
                continue;
            }
            scored.push((dot(&qv, &loaded.vectors[idx]), idx));
        }
        scored.sort_by(|(sa, ia), (sb, ib)| sb.total_cmp(sa).then_with(|| ia.cmp(ib)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(similarity, idx)| RetrievedRule {
                rule: loaded.units[idx].clone(),
                similarity,
            })
            .collect())
    }

    fn persist(&self, file: &CollectionFileV1) -> Result<(), IndexError> {
        let path = self.file_path();
        let display = path.display().to_string();
        fs::create_dir_all(&self.dir).map_err(|e| IndexError::Io {
            path: display.clone(),
            message: e.to_string(),
        })?;
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(file, &mut bytes).map_err(|e| IndexError::Codec {
            path: display.clone(),
            message: e.to_string(),
        })?;
        let tmp = path.with_extension("cbor.tmp");
        fs::write(&tmp, &bytes).map_err(|e| IndexError::Io {
            path: tmp.display().to_string(),
            message: e.to_string(),
        })?;
        fs::rename(&tmp, &path).map_err(|e| IndexError::Io {
            path: display,
            message: e.to_string(),
        })
    }

    fn load_from_disk(&self) -> Result<Option<LoadedCollection>, IndexError> {
        let path = self.file_path();
        if !path.exists() {
            return Ok(None);
        }
        let file = decode_collection(&path)?;
        if file.embedder != self.embedder.id() {
            return Err(IndexError::EmbedderMismatch {
                path: path.display().to_string(),
                found: file.embedder,
                expected: self.embedder.id().to_string(),
            });
        }

        let mut units = Vec::with_capacity(file.items.len());
        let mut vectors = Vec::with_capacity(file.items.len());
        for item in file.items {
            units.push(item.unit);
            vectors.push(item.vector);
        }
        Ok(Some(LoadedCollection {
            hnsw: build_hnsw(&vectors),
            units,
            vectors,
            built_at_unix_secs: file.built_at_unix_secs,
            corpus_digest: file.corpus_digest,
        }))
    }
}

fn decode_collection(path: &Path) -> Result<CollectionFileV1, IndexError> {
    let display = path.display().to_string();
    let bytes = fs::read(path).map_err(|e| IndexError::Io {
        path: display.clone(),
        message: e.to_string(),
    })?;
    let file: CollectionFileV1 =
        ciborium::de::from_reader(bytes.as_slice()).map_err(|e| IndexError::Codec {
            path: display.clone(),
            message: e.to_string(),
        })?;
    if file.version != COLLECTION_FILE_VERSION_V1 {
        return Err(IndexError::Codec {
            path: display,
            message: format!(
                "unsupported collection version: {} (expected {COLLECTION_FILE_VERSION_V1})",
                file.version
            ),
        });
    }
    Ok(file)
}

fn build_hnsw(vectors: &[Vec<f32>]) -> Hnsw<'static, f32, DistL2> {
    // `m`: max connections per layer; `ef_construction`: build search width.
    let m: usize = 16;
    let ef_construction: usize = 200;
    let nb_elem = vectors.len().max(1);
    let max_layer = 16.min((nb_elem as f32).ln().trunc() as usize).max(1);

    let hnsw = Hnsw::<f32, DistL2>::new(m, nb_elem, max_layer, ef_construction, DistL2 {});
    for (i, v) in vectors.iter().enumerate() {
        hnsw.insert((&v[..], i));
    }
    hnsw
}
