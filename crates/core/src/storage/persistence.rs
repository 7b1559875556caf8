//! Disk persistence for an index using bincode serialization.
//!
//! Snapshots are a bincode payload `[format_version u32][IndexData]` followed by
//! an 8-byte footer `[magic "VDX1"][CRC32 BE]`. Writes use atomic temp-file +
//! rename to prevent corruption on crash.

use crate::config::SNAPSHOT_FORMAT_VERSION;
use crate::coordinator::IndexData;
use crate::error::{IndexError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Magic bytes written before the CRC32 footer.
const SNAPSHOT_CRC_MAGIC: &[u8; 4] = b"VDX1";

#[derive(Serialize)]
struct SnapshotRef<'a> {
    format_version: u32,
    data: &'a IndexData,
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Save an index to `path` with an atomic write.
pub fn save_index(data: &IndexData, path: &Path) -> Result<()> {
    let bytes = bincode::serialize(&SnapshotRef {
        format_version: SNAPSHOT_FORMAT_VERSION,
        data,
    })?;
    let crc = crc32fast::hash(&bytes);

    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
            }
        }
    }

    let mut output = Vec::with_capacity(bytes.len() + 8);
    output.extend_from_slice(&bytes);
    output.extend_from_slice(SNAPSHOT_CRC_MAGIC);
    output.extend_from_slice(&crc.to_be_bytes());

    let tmp = tmp_path(path);
    fs::write(&tmp, &output)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(&tmp, path)?;

    tracing::info!(
        path = %path.display(),
        vectors = data.store.len(),
        bytes = bytes.len(),
        crc = format_args!("{:#010x}", crc),
        "saved index snapshot"
    );
    Ok(())
}

/// Load an index from `path`, verifying the CRC32 footer, the format version
/// and the structural invariants.
pub fn load_index(path: &Path) -> Result<IndexData> {
    let raw = fs::read(path)?;

    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != SNAPSHOT_CRC_MAGIC {
        return Err(IndexError::IncompatiblePersistedFormat(format!(
            "{} is not an index snapshot (missing footer)",
            path.display()
        )));
    }
    let payload = &raw[..raw.len() - 8];
    let stored_crc = u32::from_be_bytes([
        raw[raw.len() - 4],
        raw[raw.len() - 3],
        raw[raw.len() - 2],
        raw[raw.len() - 1],
    ]);
    let computed_crc = crc32fast::hash(payload);
    if computed_crc != stored_crc {
        return Err(IndexError::IncompatiblePersistedFormat(format!(
            "snapshot CRC32 mismatch: expected {:#010x}, got {:#010x} ({})",
            stored_crc,
            computed_crc,
            path.display()
        )));
    }
    tracing::debug!(crc = format_args!("{:#010x}", stored_crc), "snapshot CRC32 verified");

    // Version first, so a newer layout is reported as such rather than as garbage
    let version: u32 = bincode::deserialize(payload)?;
    if version != SNAPSHOT_FORMAT_VERSION {
        return Err(IndexError::IncompatiblePersistedFormat(format!(
            "unsupported snapshot format version {} (expected {})",
            version, SNAPSHOT_FORMAT_VERSION
        )));
    }
    let (_, mut data): (u32, IndexData) = bincode::deserialize(payload)?;

    data.validate()?;
    data.graph.reseed_levels();

    tracing::info!(
        path = %path.display(),
        vectors = data.store.len(),
        tombstones = data.graph.deleted_count(),
        "loaded index snapshot"
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::hnsw::distance::DistanceMetric;
    use crate::record::Metadata;

    fn sample_data() -> IndexData {
        let mut data = IndexData::new(IndexConfig::new(3, DistanceMetric::Euclidean)).unwrap();
        for i in 0..20 {
            let v = [i as f32, (i * 2) as f32, 1.0];
            data.insert_prepared(format!("v{i}"), v.to_vec(), Metadata::new(), None)
                .unwrap();
        }
        data
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.vdx");
        let data = sample_data();
        save_index(&data, &path).unwrap();
        let loaded = load_index(&path).unwrap();
        assert_eq!(loaded.store.len(), 20);
        assert_eq!(loaded.graph.entry_point, data.graph.entry_point);
        assert_eq!(loaded.graph.neighbors, data.graph.neighbors);
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.vdx");
        save_index(&sample_data(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_crc_mismatch_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.vdx");
        save_index(&sample_data(), &path).unwrap();
        let mut raw = fs::read(&path).unwrap();
        raw[10] ^= 0xFF;
        fs::write(&path, &raw).unwrap();
        assert!(matches!(
            load_index(&path),
            Err(IndexError::IncompatiblePersistedFormat(_))
        ));
    }

    #[test]
    fn test_missing_footer_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.vdx");
        fs::write(&path, b"not a snapshot at all").unwrap();
        assert!(matches!(
            load_index(&path),
            Err(IndexError::IncompatiblePersistedFormat(_))
        ));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.vdx");
        let data = sample_data();
        let payload = bincode::serialize(&SnapshotRef {
            format_version: SNAPSHOT_FORMAT_VERSION + 1,
            data: &data,
        })
        .unwrap();
        let mut out = payload.clone();
        out.extend_from_slice(SNAPSHOT_CRC_MAGIC);
        out.extend_from_slice(&crc32fast::hash(&payload).to_be_bytes());
        fs::write(&path, out).unwrap();
        let err = load_index(&path).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_structural_corruption_is_corrupt_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.vdx");
        let mut data = sample_data();
        data.graph.entry_point = Some(999);
        save_index(&data, &path).unwrap();
        assert!(matches!(load_index(&path), Err(IndexError::CorruptIndex(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.vdx");
        save_index(&sample_data(), &path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
