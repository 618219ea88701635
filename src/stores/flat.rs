//! Exact nearest-neighbor index over normalized embeddings with file
//! persistence.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{SearchResult, StoredChunk, VectorStore};
use crate::types::RagError;

const INDEX_MAGIC: &[u8; 8] = b"LUMIDX01";
const HEADER_LEN: usize = 8 + 4 + 8;

const INDEX_FILE: &str = "index.bin";
const METADATA_FILE: &str = "metadata.json";

/// One indexed entry: a unit-norm vector paired with its chunk metadata.
///
/// Holding both in a single struct makes the position invariant (vector `i`
/// belongs to chunk `i`) hold by construction; there are no independently
/// resizable parallel containers to drift apart.
#[derive(Clone, Debug)]
struct IndexEntry {
    vector: Vec<f32>,
    chunk: StoredChunk,
}

/// Flat in-memory cosine index, persisted on every mutation.
///
/// Search compares the query against every stored vector (no approximation).
/// Deletion filters the surviving entries and rebuilds; the whole index lives
/// in memory and on disk as one binary vector payload plus a JSON metadata
/// sidecar whose array positions match the payload.
pub struct FlatVectorStore {
    dimension: usize,
    index_path: PathBuf,
    metadata_path: PathBuf,
    entries: RwLock<Vec<IndexEntry>>,
}

impl FlatVectorStore {
    /// Opens the store rooted at `dir`, loading any persisted state.
    ///
    /// A missing index is a normal first run. A present-but-unloadable one
    /// (corrupt payload, dimension drift, missing sidecar) is recoverable:
    /// it is logged and replaced with a fresh empty index rather than
    /// failing startup.
    pub fn open(dir: impl AsRef<Path>, dimension: usize) -> Result<Self, RagError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let store = Self {
            dimension,
            index_path: dir.join(INDEX_FILE),
            metadata_path: dir.join(METADATA_FILE),
            entries: RwLock::new(Vec::new()),
        };

        match store.load_persisted() {
            Ok(Some(entries)) => {
                tracing::info!(count = entries.len(), dimension, "loaded flat index");
                *store.entries.write() = entries;
            }
            Ok(None) => {
                tracing::info!(dimension, "no persisted index found, starting fresh");
            }
            Err(err) => {
                tracing::warn!(%err, "failed to load persisted index, starting fresh");
            }
        }

        Ok(store)
    }

    /// Fixed embedding dimension this index was built for.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn load_persisted(&self) -> Result<Option<Vec<IndexEntry>>, RagError> {
        if !self.index_path.exists() || !self.metadata_path.exists() {
            return Ok(None);
        }

        let payload = fs::read(&self.index_path)
            .map_err(|err| RagError::PersistenceLoad(err.to_string()))?;
        let vectors = decode_payload(&payload, self.dimension)?;

        let raw = fs::read_to_string(&self.metadata_path)
            .map_err(|err| RagError::PersistenceLoad(err.to_string()))?;
        let chunks: Vec<StoredChunk> =
            serde_json::from_str(&raw).map_err(|err| RagError::PersistenceLoad(err.to_string()))?;

        if chunks.len() != vectors.len() {
            return Err(RagError::PersistenceLoad(format!(
                "metadata holds {} chunks but payload holds {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        Ok(Some(
            vectors
                .into_iter()
                .zip(chunks)
                .map(|(vector, chunk)| IndexEntry { vector, chunk })
                .collect(),
        ))
    }

    /// Writes the full index state. Called with the entries lock held so
    /// observers never see a partially persisted mutation.
    fn persist(&self, entries: &[IndexEntry]) -> Result<(), RagError> {
        let payload = encode_payload(entries, self.dimension);
        write_atomic(&self.index_path, &payload)?;

        let chunks: Vec<&StoredChunk> = entries.iter().map(|entry| &entry.chunk).collect();
        let metadata = serde_json::to_vec_pretty(&chunks)
            .map_err(|err| RagError::Storage(err.to_string()))?;
        write_atomic(&self.metadata_path, &metadata)?;

        tracing::debug!(count = entries.len(), "persisted flat index");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for FlatVectorStore {
    async fn insert(
        &self,
        chunks: Vec<StoredChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), RagError> {
        if chunks.is_empty() && vectors.is_empty() {
            return Ok(());
        }
        if chunks.len() != vectors.len() {
            return Err(RagError::Storage(format!(
                "insert batch holds {} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(RagError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        let mut entries = self.entries.write();
        for (chunk, mut vector) in chunks.into_iter().zip(vectors) {
            normalize(&mut vector);
            entries.push(IndexEntry { vector, chunk });
        }
        self.persist(&entries)?;
        tracing::info!(count = entries.len(), "inserted chunk batch into flat index");
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>, RagError> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let entries = self.entries.read();
        if entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut normalized = query.to_vec();
        normalize(&mut normalized);

        let mut scored: Vec<(usize, f32)> = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, dot(&normalized, &entry.vector)))
            .collect();
        // Descending score; equal scores resolve to the earliest insertion.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_k.min(entries.len()));

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchResult {
                chunk: entries[position].chunk.clone(),
                score,
            })
            .collect())
    }

    async fn delete_by_origin(&self, origin_id: &str) -> Result<usize, RagError> {
        let mut entries = self.entries.write();
        let before = entries.len();

        // Rebuild from the retained entries; relative order is preserved.
        let retained: Vec<IndexEntry> = entries
            .iter()
            .filter(|entry| entry.chunk.origin_id != origin_id)
            .cloned()
            .collect();
        let removed = before - retained.len();
        if removed == 0 {
            return Ok(0);
        }

        *entries = retained;
        self.persist(&entries)?;
        tracing::info!(origin_id, removed, "deleted chunks by origin");
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, RagError> {
        Ok(self.entries.read().len())
    }

    async fn clear(&self) -> Result<(), RagError> {
        let mut entries = self.entries.write();
        entries.clear();
        self.persist(&entries)?;
        tracing::info!("cleared flat index");
        Ok(())
    }
}

/// L2-normalizes in place. Zero vectors stay zero, so their similarity with
/// anything is 0 and no division by zero can occur.
fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn encode_payload(entries: &[IndexEntry], dimension: usize) -> Vec<u8> {
    let mut payload = Vec::with_capacity(HEADER_LEN + entries.len() * dimension * 4);
    payload.extend_from_slice(INDEX_MAGIC);
    payload.extend_from_slice(&(dimension as u32).to_le_bytes());
    payload.extend_from_slice(&(entries.len() as u64).to_le_bytes());
    for entry in entries {
        for value in &entry.vector {
            payload.extend_from_slice(&value.to_le_bytes());
        }
    }
    payload
}

fn decode_payload(payload: &[u8], expected_dimension: usize) -> Result<Vec<Vec<f32>>, RagError> {
    if payload.len() < HEADER_LEN {
        return Err(RagError::PersistenceLoad(
            "index payload truncated".to_string(),
        ));
    }
    if &payload[..8] != INDEX_MAGIC {
        return Err(RagError::PersistenceLoad(
            "index payload has unknown format".to_string(),
        ));
    }

    let dimension = u32::from_le_bytes(payload[8..12].try_into().expect("fixed slice")) as usize;
    if dimension != expected_dimension {
        return Err(RagError::PersistenceLoad(format!(
            "persisted dimension {dimension} does not match configured {expected_dimension}"
        )));
    }

    let count = u64::from_le_bytes(payload[12..20].try_into().expect("fixed slice")) as usize;
    let body = &payload[HEADER_LEN..];
    if body.len() != count * dimension * 4 {
        return Err(RagError::PersistenceLoad(format!(
            "index payload holds {} bytes, expected {} for {count} vectors",
            body.len(),
            count * dimension * 4
        )));
    }

    let mut vectors = Vec::with_capacity(count);
    for vector_bytes in body.chunks_exact(dimension * 4) {
        let vector: Vec<f32> = vector_bytes
            .chunks_exact(4)
            .map(|raw| f32::from_le_bytes(raw.try_into().expect("fixed slice")))
            .collect();
        vectors.push(vector);
    }
    Ok(vectors)
}

/// Writes through a temp file then renames, so a crash mid-write leaves the
/// previous state intact.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RagError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|err| RagError::Storage(err.to_string()))?;
    fs::rename(&tmp, path).map_err(|err| RagError::Storage(err.to_string()))?;
    Ok(())
}
