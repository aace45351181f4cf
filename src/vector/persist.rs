use crate::vector::index::Metric;
use crate::vector::{StoreError, StoredRecord};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct CollectionLayout {
    pub dir: PathBuf,
    pub manifest_path: PathBuf,
    pub log_path: PathBuf,
}

impl CollectionLayout {
    pub fn new(base: &Path, collection: &str) -> Self {
        let dir = base.join(collection);
        Self {
            manifest_path: dir.join("manifest.json"),
            log_path: dir.join("records.log"),
            dir,
        }
    }
}

/// Collection metadata persisted next to the record log.
///
/// `dim` stays `None` until the first upsert establishes it; it is written
/// to disk before the establishing record so replay always knows the
/// dimensionality it must enforce.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub collection: String,
    pub dim: Option<usize>,
    pub metric: Metric,
    #[serde(default)]
    pub compactions: u64,
}

impl Manifest {
    pub fn new(collection: &str, metric: Metric) -> Self {
        Self {
            version: 1,
            collection: collection.to_string(),
            dim: None,
            metric,
            compactions: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogOp {
    Upsert,
    Delete,
}

#[derive(Clone, Debug)]
pub struct LogRecord {
    pub op: LogOp,
    pub id: String,
    pub vector: Option<Vec<f32>>,
    pub metadata: Option<serde_json::Value>,
    pub doc: Option<String>,
}

impl LogRecord {
    pub fn upsert(id: &str, record: &StoredRecord) -> Self {
        Self {
            op: LogOp::Upsert,
            id: id.to_string(),
            vector: Some(record.vector.clone()),
            metadata: Some(record.metadata.clone()),
            doc: Some(record.doc.clone()),
        }
    }

    pub fn delete(id: &str) -> Self {
        Self {
            op: LogOp::Delete,
            id: id.to_string(),
            vector: None,
            metadata: None,
            doc: None,
        }
    }
}

// bincode cannot round-trip serde_json::Value (deserialize_any), so metadata
// travels as raw JSON bytes inside the bincode payload.
#[derive(Serialize, Deserialize)]
struct DiskRecord {
    op: LogOp,
    id: String,
    vector: Option<Vec<f32>>,
    meta: Option<Vec<u8>>,
    doc: Option<String>,
}

pub struct LoadResult {
    pub records: HashMap<String, StoredRecord>,
    pub total_records: u64,
    pub tombstones: u64,
    pub log_bytes: u64,
}

/// Get-or-create the collection directory, manifest, and log file.
pub fn init_collection(
    layout: &CollectionLayout,
    collection: &str,
    metric: Metric,
) -> io::Result<Manifest> {
    std::fs::create_dir_all(&layout.dir)?;
    let manifest = if layout.manifest_path.exists() {
        read_manifest(layout)?
    } else {
        let manifest = Manifest::new(collection, metric);
        store_manifest(layout, &manifest)?;
        manifest
    };
    if !layout.log_path.exists() {
        let _ = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&layout.log_path)?;
    }
    Ok(manifest)
}

pub fn read_manifest(layout: &CollectionLayout) -> io::Result<Manifest> {
    let bytes = std::fs::read(&layout.manifest_path)?;
    let manifest: Manifest = serde_json::from_slice(&bytes)?;
    Ok(manifest)
}

pub fn store_manifest(layout: &CollectionLayout, manifest: &Manifest) -> io::Result<()> {
    let tmp = layout.dir.join("manifest.json.tmp");
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    serde_json::to_writer_pretty(&mut f, manifest)?;
    f.flush()?;
    f.sync_data()?;
    std::fs::rename(tmp, &layout.manifest_path)?;
    Ok(())
}

/// Append one framed record and fsync before returning. The caller treats a
/// successful return as the durability acknowledgment, so nothing may be
/// buffered past this point.
pub fn append_record(layout: &CollectionLayout, record: &LogRecord) -> io::Result<u64> {
    let payload = encode_payload(record)?;
    let mut hasher = Hasher::new();
    hasher.update(&payload);
    let header = FrameHeader::new(record.op, payload.len(), hasher.finalize());
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&layout.log_path)?;
    file.write_all(&header.encode())?;
    file.write_all(&payload)?;
    file.flush()?;
    file.sync_data()?;
    Ok((FRAME_HEADER_BYTES + payload.len()) as u64)
}

/// Replay the log in write order.
///
/// An undecodable suffix is the in-flight frame of a crash: it was never
/// acknowledged, so it is logged and truncated away. A decoded record that
/// violates the manifest dimensionality is corrupt state and fails the load.
pub fn load_records(
    layout: &CollectionLayout,
    expected_dim: Option<usize>,
) -> Result<LoadResult, StoreError> {
    let mut result = LoadResult {
        records: HashMap::new(),
        total_records: 0,
        tombstones: 0,
        log_bytes: 0,
    };
    if !layout.log_path.exists() {
        return Ok(result);
    }
    let file_len = std::fs::metadata(&layout.log_path)?.len();
    let mut reader = BufReader::new(File::open(&layout.log_path)?);
    let mut good_len = 0u64;
    loop {
        let mut header_buf = [0u8; FRAME_HEADER_BYTES];
        match reader.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        }
        let Some(header) = FrameHeader::decode(&header_buf) else {
            break;
        };
        if header.len > FRAME_MAX_PAYLOAD_BYTES {
            break;
        }
        let mut payload = vec![0u8; header.len as usize];
        match reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        }
        let mut hasher = Hasher::new();
        hasher.update(&payload);
        if hasher.finalize() != header.crc32 {
            break;
        }
        let Ok(disk) = bincode::deserialize::<DiskRecord>(&payload) else {
            break;
        };
        if disk.op != header.op() {
            return Err(StoreError::Corrupt(format!(
                "frame flags disagree with payload op for record `{}`",
                disk.id
            )));
        }
        good_len += (FRAME_HEADER_BYTES + payload.len()) as u64;
        apply_disk_record(disk, expected_dim, &mut result)?;
    }
    // anything past the last complete frame is the in-flight write of a
    // crash; it was never acknowledged, so drop it
    if good_len < file_len {
        truncate_torn_tail(layout, good_len, file_len)?;
    }
    result.log_bytes = good_len;
    Ok(result)
}

/// Rewrite the log to live records only, atomically replacing the old file.
pub fn rewrite_log(
    layout: &CollectionLayout,
    manifest: &mut Manifest,
    records: &HashMap<String, StoredRecord>,
) -> io::Result<u64> {
    let tmp = layout.dir.join("records.log.tmp");
    let mut writer = BufWriter::new(
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?,
    );
    let mut entries: Vec<(&String, &StoredRecord)> = records.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    let mut bytes = 0u64;
    for (id, record) in entries {
        let log_record = LogRecord::upsert(id, record);
        let payload = encode_payload(&log_record)?;
        let mut hasher = Hasher::new();
        hasher.update(&payload);
        let header = FrameHeader::new(log_record.op, payload.len(), hasher.finalize());
        writer.write_all(&header.encode())?;
        writer.write_all(&payload)?;
        bytes += (FRAME_HEADER_BYTES + payload.len()) as u64;
    }
    writer.flush()?;
    writer.get_ref().sync_data()?;
    std::fs::rename(&tmp, &layout.log_path)?;
    manifest.compactions = manifest.compactions.saturating_add(1);
    store_manifest(layout, manifest)?;
    Ok(bytes)
}

fn truncate_torn_tail(layout: &CollectionLayout, good_len: u64, file_len: u64) -> io::Result<()> {
    tracing::warn!(
        log = %layout.log_path.display(),
        good_len,
        file_len,
        "truncating torn log tail"
    );
    let file = OpenOptions::new().write(true).open(&layout.log_path)?;
    file.set_len(good_len)?;
    file.sync_data()?;
    Ok(())
}

fn apply_disk_record(
    disk: DiskRecord,
    expected_dim: Option<usize>,
    result: &mut LoadResult,
) -> Result<(), StoreError> {
    result.total_records = result.total_records.saturating_add(1);
    match disk.op {
        LogOp::Delete => {
            result.tombstones = result.tombstones.saturating_add(1);
            result.records.remove(&disk.id);
        }
        LogOp::Upsert => {
            let vector = disk.vector.ok_or_else(|| {
                StoreError::Corrupt(format!("upsert record `{}` has no vector", disk.id))
            })?;
            let Some(dim) = expected_dim else {
                return Err(StoreError::Corrupt(format!(
                    "record `{}` precedes established dimensionality",
                    disk.id
                )));
            };
            if vector.len() != dim {
                return Err(StoreError::Corrupt(format!(
                    "record `{}` has dimension {}, manifest says {}",
                    disk.id,
                    vector.len(),
                    dim
                )));
            }
            let metadata = match disk.meta.as_deref() {
                Some(bytes) => serde_json::from_slice(bytes).map_err(|_| {
                    StoreError::Corrupt(format!("record `{}` has unreadable metadata", disk.id))
                })?,
                None => serde_json::Value::Object(Default::default()),
            };
            result.records.insert(
                disk.id,
                StoredRecord {
                    vector,
                    metadata,
                    doc: disk.doc.unwrap_or_default(),
                },
            );
        }
    }
    Ok(())
}

fn encode_payload(record: &LogRecord) -> io::Result<Vec<u8>> {
    let meta_bytes = match &record.metadata {
        Some(meta) => Some(
            serde_json::to_vec(meta)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "meta serialize"))?,
        ),
        None => None,
    };
    let disk = DiskRecord {
        op: record.op,
        id: record.id.clone(),
        vector: record.vector.clone(),
        meta: meta_bytes,
        doc: record.doc.clone(),
    };
    bincode::serialize(&disk)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bincode serialize"))
}

const FRAME_MAGIC: u32 = 0x56534431;
const FRAME_VERSION: u16 = 1;
const FRAME_HEADER_BYTES: usize = 16;
const FRAME_MAX_PAYLOAD_BYTES: u32 = 1 << 28;

#[derive(Clone, Copy)]
struct FrameHeader {
    magic: u32,
    version: u16,
    flags: u16,
    len: u32,
    crc32: u32,
}

impl FrameHeader {
    fn new(op: LogOp, len: usize, crc32: u32) -> Self {
        let flags = match op {
            LogOp::Upsert => 0,
            LogOp::Delete => 1,
        };
        Self {
            magic: FRAME_MAGIC,
            version: FRAME_VERSION,
            flags,
            len: len as u32,
            crc32,
        }
    }

    fn encode(&self) -> [u8; FRAME_HEADER_BYTES] {
        let mut buf = [0u8; FRAME_HEADER_BYTES];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.to_le_bytes());
        buf[8..12].copy_from_slice(&self.len.to_le_bytes());
        buf[12..16].copy_from_slice(&self.crc32.to_le_bytes());
        buf
    }

    fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < FRAME_HEADER_BYTES {
            return None;
        }
        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != FRAME_MAGIC {
            return None;
        }
        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != FRAME_VERSION {
            return None;
        }
        let flags = u16::from_le_bytes([buf[6], buf[7]]);
        let len = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let crc32 = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
        Some(Self {
            magic,
            version,
            flags,
            len,
            crc32,
        })
    }

    fn op(&self) -> LogOp {
        if self.flags & 1 == 1 {
            LogOp::Delete
        } else {
            LogOp::Upsert
        }
    }
}
