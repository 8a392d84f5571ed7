use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"RQIX";
const FORMAT_VERSION: u8 = 1;

/// Distance metric of an index, fixed at creation and recorded in the
/// persisted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Squared Euclidean distance; smaller is closer.
    SquaredL2,
}

impl Metric {
    fn id(self) -> u8 {
        match self {
            Metric::SquaredL2 => 0,
        }
    }

    fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Metric::SquaredL2),
            other => Err(Error::Configuration(format!(
                "unknown distance metric id {other}"
            ))),
        }
    }

    fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::SquaredL2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = x - y;
                    d * d
                })
                .sum(),
        }
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    chunk_id: String,
    vector: Vec<f32>,
}

/// Flat exact nearest-neighbor index over chunk embeddings.
///
/// The index owns only numeric data and chunk ids; chunk content lives in
/// the document store. Every vector shares the dimension fixed at creation
/// time. Search is a linear scan returning the true k nearest entries in
/// ascending distance, ties broken by chunk id, so results are fully
/// deterministic. `search` takes `&self` and is safe for concurrent
/// readers once building is done.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    metric: Metric,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create a new empty index for vectors of the given dimension.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Configuration(
                "index dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            metric: Metric::SquaredL2,
            entries: Vec::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a vector for a chunk. The entry is visible to every
    /// subsequent `search`.
    pub fn insert(&mut self, chunk_id: String, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.entries.push(IndexEntry { chunk_id, vector });
        Ok(())
    }

    /// Exact k-nearest-neighbor search.
    ///
    /// Returns `(chunk_id, distance)` pairs in ascending distance order,
    /// at most `min(k, len)` of them.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(String, f32)> = self
            .entries
            .iter()
            .map(|entry| {
                (
                    entry.chunk_id.clone(),
                    self.metric.distance(query, &entry.vector),
                )
            })
            .collect();

        scored.sort_by(
            |a, b| match a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal) {
                Ordering::Equal => a.0.cmp(&b.0),
                other => other,
            },
        );
        scored.truncate(k);

        debug!(
            "search returned {} of {} entries",
            scored.len(),
            self.entries.len()
        );
        Ok(scored)
    }

    /// Persist the complete index: header (magic, version, metric,
    /// dimension, entry count) followed by `(chunk_id, vector)` records.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(MAGIC)?;
        writer.write_all(&[FORMAT_VERSION, self.metric.id()])?;
        writer.write_all(&(self.dimension as u32).to_le_bytes())?;
        writer.write_all(&(self.entries.len() as u64).to_le_bytes())?;

        for entry in &self.entries {
            let id = entry.chunk_id.as_bytes();
            writer.write_all(&(id.len() as u32).to_le_bytes())?;
            writer.write_all(id)?;
            writer.write_all(&vector_to_bytes(&entry.vector))?;
        }
        writer.flush()?;

        info!(
            "saved index ({} entries, dim={}) to {}",
            self.entries.len(),
            self.dimension,
            path.display()
        );
        Ok(())
    }

    /// Restore an index previously written by `save`.
    ///
    /// A missing file is `NotFound` (the caller decides whether to build
    /// fresh); malformed content is `Configuration` rather than silent
    /// corruption.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(format!("index file {}", path.display())));
        }

        let mut reader = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        read_exact(&mut reader, &mut magic, path, "header")?;
        if &magic != MAGIC {
            return Err(corrupt(path, "bad magic"));
        }

        let mut version_metric = [0u8; 2];
        read_exact(&mut reader, &mut version_metric, path, "header")?;
        if version_metric[0] != FORMAT_VERSION {
            return Err(corrupt(
                path,
                &format!("unsupported format version {}", version_metric[0]),
            ));
        }
        let metric = Metric::from_id(version_metric[1])?;

        let dimension = read_u32(&mut reader, path, "dimension")? as usize;
        if dimension == 0 {
            return Err(corrupt(path, "zero dimension"));
        }
        let count = read_u64(&mut reader, path, "entry count")? as usize;

        let mut entries = Vec::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            let id_len = read_u32(&mut reader, path, "chunk id length")? as usize;
            let mut id_bytes = vec![0u8; id_len];
            read_exact(&mut reader, &mut id_bytes, path, "chunk id")?;
            let chunk_id = String::from_utf8(id_bytes)
                .map_err(|_| corrupt(path, "chunk id is not valid UTF-8"))?;

            let mut vector_bytes = vec![0u8; dimension * 4];
            read_exact(&mut reader, &mut vector_bytes, path, "vector")?;
            entries.push(IndexEntry {
                chunk_id,
                vector: vector_from_bytes(&vector_bytes),
            });
        }

        info!(
            "loaded index ({} entries, dim={}) from {}",
            entries.len(),
            dimension,
            path.display()
        );
        Ok(Self {
            dimension,
            metric,
            entries,
        })
    }
}

fn corrupt(path: &Path, what: &str) -> Error {
    Error::Configuration(format!("index file {}: {}", path.display(), what))
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8], path: &Path, what: &str) -> Result<()> {
    reader
        .read_exact(buf)
        .map_err(|_| corrupt(path, &format!("truncated {what}")))
}

fn read_u32(reader: &mut impl Read, path: &Path, what: &str) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf, path, what)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read, path: &Path, what: &str) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf, path, what)?;
    Ok(u64::from_le_bytes(buf))
}

/// Serialize vector to bytes (little-endian Float32)
pub(crate) fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for &v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Deserialize vector from bytes (little-endian Float32)
pub(crate) fn vector_from_bytes(bytes: &[u8]) -> Vec<f32> {
    let mut vector = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        vector.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    vector
}
