//! # Single-File Gzip Codec
//!
//! Compresses and decompresses individual files with gzip, optionally
//! removing the source afterwards. The spectrum and volume serializers use
//! this to produce `.json.gz` documents.
//!
//! Both directions stream through a named temporary file in the destination
//! directory and commit with an atomic rename: an interrupted run can leave a
//! stray temp file behind, but never a truncated output, and the source file
//! is only removed after the output has been persisted.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

use crate::schema::GZ_EXTENSION;

/// Errors that can occur in the gzip codec.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    /// Compression level outside the supported range.
    #[error("compression level must be between 0 and 9, got {0}")]
    InvalidLevel(u32),

    /// Input file does not exist.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// No output path was given and none can be derived from the input.
    #[error("cannot derive output path for {0}: expected a `.gz` extension")]
    NoOutputPath(PathBuf),

    /// I/O error while streaming or persisting.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Compress `input` into a gzip file.
///
/// When `output` is `None` the result is written next to the input with
/// `.gz` appended (`scan.json` → `scan.json.gz`). `level` is the gzip
/// compression level, 0 (store) through 9 (best). With `remove_original` the
/// input file is deleted once the compressed output has been persisted.
///
/// Returns the path of the compressed file.
pub fn compress_file(
    input: &Path,
    output: Option<&Path>,
    level: u32,
    remove_original: bool,
) -> Result<PathBuf, CompressionError> {
    if level > 9 {
        return Err(CompressionError::InvalidLevel(level));
    }
    if !input.is_file() {
        return Err(CompressionError::NotFound(input.to_path_buf()));
    }

    let output = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let mut os = input.as_os_str().to_os_string();
            os.push(".");
            os.push(GZ_EXTENSION);
            PathBuf::from(os)
        }
    };

    let mut reader = BufReader::new(File::open(input)?);
    let tmp = NamedTempFile::new_in(parent_dir(&output))?;
    let mut encoder = GzEncoder::new(BufWriter::new(tmp), Compression::new(level));
    io::copy(&mut reader, &mut encoder)?;
    let writer = encoder.finish()?;
    let tmp = writer.into_inner().map_err(|e| e.into_error())?;
    tmp.persist(&output).map_err(|e| e.error)?;
    log::debug!("compressed {} -> {}", input.display(), output.display());

    if remove_original {
        std::fs::remove_file(input)?;
        log::debug!("removed original file {}", input.display());
    }
    Ok(output)
}

/// Decompress a gzip file.
///
/// If `input` does not exist, its `.gz`-suffixed sibling is tried before
/// giving up (so callers may pass either `scan.json` or `scan.json.gz`).
/// When `output` is `None` the result is the input path with its trailing
/// `.gz` removed. With `remove_original` the compressed file is deleted once
/// the output has been persisted.
///
/// Returns the path of the decompressed file.
pub fn decompress_file(
    input: &Path,
    output: Option<&Path>,
    remove_original: bool,
) -> Result<PathBuf, CompressionError> {
    let input = if input.is_file() {
        input.to_path_buf()
    } else {
        let sibling = crate::schema::gz_sibling(input);
        if sibling.is_file() {
            sibling
        } else {
            return Err(CompressionError::NotFound(sibling));
        }
    };

    let output = match output {
        Some(path) => path.to_path_buf(),
        None => {
            if input.extension().is_some_and(|e| e == GZ_EXTENSION) {
                input.with_extension("")
            } else {
                return Err(CompressionError::NoOutputPath(input));
            }
        }
    };

    let mut decoder = GzDecoder::new(BufReader::new(File::open(&input)?));
    let mut tmp = NamedTempFile::new_in(parent_dir(&output))?;
    io::copy(&mut decoder, &mut tmp)?;
    tmp.persist(&output).map_err(|e| e.error)?;
    log::debug!("decompressed {} -> {}", input.display(), output.display());

    if remove_original {
        std::fs::remove_file(&input)?;
        log::debug!("removed compressed file {}", input.display());
    }
    Ok(output)
}

/// Directory the temp file must live in so the final rename stays on one
/// filesystem.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("data.json");
        fs::write(&plain, b"{\"raw_counts\": [1, 2, 3]}").unwrap();

        let gz = compress_file(&plain, None, 9, false).unwrap();
        assert_eq!(gz, dir.path().join("data.json.gz"));
        assert!(plain.is_file());

        let restored = dir.path().join("restored.json");
        decompress_file(&gz, Some(&restored), false).unwrap();
        assert_eq!(fs::read(&plain).unwrap(), fs::read(&restored).unwrap());
    }

    #[test]
    fn test_remove_original_after_compress() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("data.json");
        fs::write(&plain, b"payload").unwrap();

        compress_file(&plain, None, 5, true).unwrap();
        assert!(!plain.exists());
        assert!(dir.path().join("data.json.gz").is_file());
    }

    #[test]
    fn test_default_output_strips_gz() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("data.json");
        fs::write(&plain, b"payload").unwrap();
        let gz = compress_file(&plain, None, 1, true).unwrap();

        let out = decompress_file(&gz, None, true).unwrap();
        assert_eq!(out, plain);
        assert!(plain.is_file());
        assert!(!gz.exists());
        assert_eq!(fs::read(&plain).unwrap(), b"payload");
    }

    #[test]
    fn test_decompress_tries_gz_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("data.json");
        fs::write(&plain, b"payload").unwrap();
        compress_file(&plain, None, 6, true).unwrap();

        // Pass the plain path; the codec should find data.json.gz.
        let out = decompress_file(&plain, None, false).unwrap();
        assert_eq!(out, plain);
        assert_eq!(fs::read(&plain).unwrap(), b"payload");
    }

    #[test]
    fn test_invalid_level_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("data.json");
        fs::write(&plain, b"payload").unwrap();

        let err = compress_file(&plain, None, 10, false).unwrap_err();
        assert!(matches!(err, CompressionError::InvalidLevel(10)));
        assert!(plain.is_file());
    }

    #[test]
    fn test_missing_input_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");

        let err = compress_file(&missing, None, 9, false).unwrap_err();
        assert!(matches!(err, CompressionError::NotFound(_)));

        let err = decompress_file(&missing, None, false).unwrap_err();
        assert!(matches!(err, CompressionError::NotFound(_)));
    }

    #[test]
    fn test_level_zero_stores() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("data.json");
        fs::write(&plain, vec![b'x'; 4096]).unwrap();

        let gz = compress_file(&plain, None, 0, false).unwrap();
        let out = decompress_file(&gz, Some(&dir.path().join("out.json")), false).unwrap();
        assert_eq!(fs::read(out).unwrap(), vec![b'x'; 4096]);
    }
}
