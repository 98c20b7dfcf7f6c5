//! Disk persistence for shard artifacts.
//!
//! Packed vectors are stored in a `.bqv` file:
//! `[magic "BQV1"][u64 rows LE][u32 row_width LE][rows * row_width bytes][magic "BCRC"][u32 CRC32 BE]`
//! where the CRC covers everything before the footer. 2-D `uint8` NumPy `.npy`
//! files are also accepted on load. Metadata is a JSON array of objects.
//!
//! Writes use atomic temp-file + rename so a reader never sees a half-written artifact.

use crate::document::Record;
use crate::error::{EngineError, Result};
use crate::quantization::PackedMatrix;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Leading magic of a packed-vector file.
const VECTORS_MAGIC: &[u8; 4] = b"BQV1";

/// Magic bytes before the CRC32 footer.
const VECTORS_CRC_MAGIC: &[u8; 4] = b"BCRC";

/// Leading magic of a NumPy array file.
const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

const HEADER_LEN: usize = 4 + 8 + 4;
const FOOTER_LEN: usize = 8;

/// Save packed vectors with a CRC32 footer, atomically.
pub fn write_vectors(path: &Path, matrix: &PackedMatrix) -> Result<()> {
    let row_width = u32::try_from(matrix.row_width()).map_err(|_| {
        EngineError::InvalidArgument(format!("row width {} too large", matrix.row_width()))
    })?;

    let mut output = Vec::with_capacity(HEADER_LEN + matrix.as_bytes().len() + FOOTER_LEN);
    output.extend_from_slice(VECTORS_MAGIC);
    output.extend_from_slice(&(matrix.rows() as u64).to_le_bytes());
    output.extend_from_slice(&row_width.to_le_bytes());
    output.extend_from_slice(matrix.as_bytes());

    let crc = crc32fast::hash(&output);
    output.extend_from_slice(VECTORS_CRC_MAGIC);
    output.extend_from_slice(&crc.to_be_bytes());

    atomic_write(path, &output)?;
    tracing::info!(
        "Saved {} packed vectors to {:?} ({} bytes, CRC32={:#010x})",
        matrix.rows(),
        path,
        output.len(),
        crc
    );
    Ok(())
}

/// Load packed vectors from a `.bqv` or `.npy` file (detected by magic).
pub fn read_vectors(path: &Path) -> Result<PackedMatrix> {
    let raw = read_artifact(path)?;
    let matrix = if raw.starts_with(VECTORS_MAGIC) {
        decode_bqv(path, &raw)?
    } else if raw.starts_with(NPY_MAGIC) {
        decode_npy(path, raw)?
    } else {
        return Err(EngineError::corrupt(path, "unrecognized packed-vector format"));
    };
    tracing::info!(
        rows = matrix.rows(),
        row_width = matrix.row_width(),
        "Loaded packed vectors from {:?}",
        path
    );
    Ok(matrix)
}

/// Save metadata records as a JSON array, atomically.
pub fn write_metadata(path: &Path, records: &[Record]) -> Result<()> {
    let bytes = serde_json::to_vec(records)
        .map_err(|e| EngineError::InvalidArgument(format!("metadata not serializable: {e}")))?;
    atomic_write(path, &bytes)?;
    tracing::info!("Saved {} metadata records to {:?}", records.len(), path);
    Ok(())
}

/// Load metadata records from a JSON array of objects.
pub fn read_metadata(path: &Path) -> Result<Vec<Record>> {
    let raw = read_artifact(path)?;
    let records: Vec<Record> =
        serde_json::from_slice(&raw).map_err(|e| EngineError::corrupt(path, e.to_string()))?;
    tracing::debug!("Loaded {} metadata records from {:?}", records.len(), path);
    Ok(records)
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => EngineError::CorpusNotFound {
            path: path.to_path_buf(),
        },
        _ => EngineError::Io(e),
    })
}

/// Write to `<path>.tmp`, then rename over `path`.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp_path = PathBuf::from(tmp);

    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)
}

fn decode_bqv(path: &Path, raw: &[u8]) -> Result<PackedMatrix> {
    if raw.len() < HEADER_LEN + FOOTER_LEN {
        return Err(EngineError::corrupt(path, "file shorter than header and footer"));
    }
    let (body, footer) = raw.split_at(raw.len() - FOOTER_LEN);
    if &footer[..4] != VECTORS_CRC_MAGIC {
        return Err(EngineError::corrupt(path, "missing CRC32 footer"));
    }
    let stored_crc = u32::from_be_bytes([footer[4], footer[5], footer[6], footer[7]]);
    let computed_crc = crc32fast::hash(body);
    if computed_crc != stored_crc {
        return Err(EngineError::corrupt(
            path,
            format!(
                "CRC32 mismatch: expected {:#010x}, got {:#010x}",
                stored_crc, computed_crc
            ),
        ));
    }
    tracing::debug!("Packed-vector CRC32 verified: {:#010x}", stored_crc);

    let mut rows_le = [0u8; 8];
    rows_le.copy_from_slice(&body[4..12]);
    let mut width_le = [0u8; 4];
    width_le.copy_from_slice(&body[12..16]);
    let rows = usize::try_from(u64::from_le_bytes(rows_le))
        .map_err(|_| EngineError::corrupt(path, "row count does not fit in memory"))?;
    let row_width = u32::from_le_bytes(width_le) as usize;

    PackedMatrix::from_raw(body[HEADER_LEN..].to_vec(), rows, row_width)
        .map_err(|e| EngineError::corrupt(path, e.to_string()))
}

/// Parses a version 1-3 `.npy` holding a C-order 2-D `uint8` array.
fn decode_npy(path: &Path, mut raw: Vec<u8>) -> Result<PackedMatrix> {
    let corrupt = |reason: &str| EngineError::corrupt(path, format!("npy: {reason}"));
    if raw.len() < 10 {
        return Err(corrupt("truncated preamble"));
    }
    let (header_len, header_start) = match raw[6] {
        1 => (u16::from_le_bytes([raw[8], raw[9]]) as usize, 10),
        2 | 3 if raw.len() >= 12 => (
            u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]) as usize,
            12,
        ),
        v => return Err(corrupt(&format!("unsupported format version {v}"))),
    };
    let data_start = header_start + header_len;
    if raw.len() < data_start {
        return Err(corrupt("truncated header"));
    }
    let header = std::str::from_utf8(&raw[header_start..data_start])
        .map_err(|_| corrupt("header is not UTF-8"))?;

    let descr = npy_value(header, "descr")
        .and_then(|v| v.strip_prefix('\''))
        .and_then(|v| v.split('\'').next())
        .ok_or_else(|| corrupt("missing descr"))?;
    if !matches!(descr, "|u1" | "u1" | "<u1" | ">u1" | "=u1") {
        return Err(corrupt(&format!("dtype {descr} is not uint8")));
    }
    let fortran = npy_value(header, "fortran_order").ok_or_else(|| corrupt("missing fortran_order"))?;
    if !fortran.starts_with("False") {
        return Err(corrupt("Fortran-order arrays are not supported"));
    }
    let shape = npy_value(header, "shape")
        .and_then(|v| v.strip_prefix('('))
        .and_then(|v| v.split(')').next())
        .ok_or_else(|| corrupt("missing shape"))?;
    let dims: Vec<usize> = shape
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<usize>)
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| corrupt("shape is not a tuple of integers"))?;
    let &[rows, row_width] = dims.as_slice() else {
        return Err(corrupt(&format!("expected a 2-D array, got {} dimensions", dims.len())));
    };

    let data = raw.split_off(data_start);
    PackedMatrix::from_raw(data, rows, row_width).map_err(|e| corrupt(&e.to_string()))
}

/// Text following `'key':` in a NumPy header dict.
fn npy_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let quoted = format!("'{key}'");
    let at = header.find(&quoted)? + quoted.len();
    header[at..]
        .trim_start()
        .strip_prefix(':')
        .map(str::trim_start)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    /// Minimal `.npy` v1 writer, laid out the way `numpy.save` does it.
    pub(crate) fn npy_bytes(rows: usize, cols: usize, data: &[u8], descr: &str, fortran: bool) -> Vec<u8> {
        let mut header = format!(
            "{{'descr': '{descr}', 'fortran_order': {}, 'shape': ({rows}, {cols}), }}",
            if fortran { "True" } else { "False" }
        );
        while (10 + header.len() + 1) % 64 != 0 {
            header.push(' ');
        }
        header.push('\n');
        let mut out = Vec::new();
        out.extend_from_slice(NPY_MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(data);
        out
    }

    fn sample_matrix() -> PackedMatrix {
        PackedMatrix::from_raw((0u8..24).collect(), 4, 6).unwrap()
    }

    // ── .bqv ────────────────────────────────────────────────────────────

    #[test]
    fn test_vectors_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shard_0.bqv");
        let m = sample_matrix();
        write_vectors(&path, &m).unwrap();
        assert_eq!(read_vectors(&path).unwrap(), m);
        assert!(!dir.path().join("shard_0.bqv.tmp").exists());
    }

    #[test]
    fn test_empty_matrix_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.bqv");
        write_vectors(&path, &PackedMatrix::new(48)).unwrap();
        let m = read_vectors(&path).unwrap();
        assert_eq!(m.rows(), 0);
        assert_eq!(m.row_width(), 48);
    }

    #[test]
    fn test_crc_mismatch_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v.bqv");
        write_vectors(&path, &sample_matrix()).unwrap();

        let mut raw = fs::read(&path).unwrap();
        raw[HEADER_LEN + 3] ^= 0xFF;
        fs::write(&path, &raw).unwrap();

        let err = read_vectors(&path).unwrap_err();
        assert!(matches!(err, EngineError::CorpusCorrupt { .. }), "{err}");
    }

    #[test]
    fn test_truncated_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v.bqv");
        write_vectors(&path, &sample_matrix()).unwrap();
        let raw = fs::read(&path).unwrap();
        fs::write(&path, &raw[..raw.len() - 3]).unwrap();
        assert!(matches!(
            read_vectors(&path),
            Err(EngineError::CorpusCorrupt { .. })
        ));
    }

    #[test]
    fn test_unknown_format_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v.bin");
        fs::write(&path, b"definitely not vectors").unwrap();
        assert!(matches!(
            read_vectors(&path),
            Err(EngineError::CorpusCorrupt { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.bqv");
        match read_vectors(&path) {
            Err(EngineError::CorpusNotFound { path: p }) => assert_eq!(p, path),
            other => panic!("expected CorpusNotFound, got {other:?}"),
        }
    }

    // ── .npy ────────────────────────────────────────────────────────────

    #[test]
    fn test_npy_uint8_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shard_0.npy");
        let data: Vec<u8> = (0u8..24).collect();
        fs::write(&path, npy_bytes(4, 6, &data, "|u1", false)).unwrap();
        assert_eq!(read_vectors(&path).unwrap(), sample_matrix());
    }

    #[test]
    fn test_npy_rejects_wrong_dtype_and_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.npy");

        fs::write(&path, npy_bytes(1, 4, &[0; 16], "<f4", false)).unwrap();
        assert!(matches!(read_vectors(&path), Err(EngineError::CorpusCorrupt { .. })));

        fs::write(&path, npy_bytes(2, 2, &[0; 4], "|u1", true)).unwrap();
        assert!(matches!(read_vectors(&path), Err(EngineError::CorpusCorrupt { .. })));

        fs::write(&path, npy_bytes(2, 2, &[0; 3], "|u1", false)).unwrap();
        assert!(matches!(read_vectors(&path), Err(EngineError::CorpusCorrupt { .. })));
    }

    // ── Metadata ────────────────────────────────────────────────────────

    #[test]
    fn test_metadata_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.json");
        let records = vec![
            Record::from_pairs([("id", json!("a")), ("abstract", json!("first"))]),
            Record::from_pairs([("id", json!(2))]),
        ];
        write_metadata(&path, &records).unwrap();
        assert_eq!(read_metadata(&path).unwrap(), records);
    }

    #[test]
    fn test_metadata_not_array_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.json");
        fs::write(&path, br#"{"id": 1}"#).unwrap();
        assert!(matches!(
            read_metadata(&path),
            Err(EngineError::CorpusCorrupt { .. })
        ));
    }
}
