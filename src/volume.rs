//! # Spatial Spectrum Aggregate
//!
//! [`TridimensionalSpectrum`] indexes many [`Spectrum`] readings by physical
//! scan position. A position may hold several spectra, typically one per
//! detector, distinguished by an integer `device_id` metadata field.
//!
//! ## Coordinate derivation
//!
//! When a spectrum is ingested from a file, its position comes from the
//! document's metadata: either a nested `position` object carrying `x`, `y`,
//! `z`, or the same three fields at the metadata's top level. A document with
//! neither is rejected.
//!
//! ## Persistence
//!
//! The aggregate document nests one list of spectrum documents per position,
//! keyed by the position rendered as `"(x, y, z)"`. Older writers stored a
//! single document per key; both shapes decode (see
//! [`crate::schema::SpectrumEntries`]). A load replaces the whole collection
//! or leaves it empty on failure, never a mix of old and new entries.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::compression::{self, CompressionError};
use crate::metadata::MetadataObject;
use crate::schema::{
    self, fields, SpectrumEntries, VolumeDocument, VersionPolicy, FORMAT_VERSION, JSON_EXTENSION,
};
use crate::spectrum::{Spectrum, SpectrumError};

/// Errors that can occur while building or (de)serializing the aggregate.
#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    /// File or directory does not exist.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// Expected a directory for folder ingestion.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Spectrum files must carry the `.json` extension.
    #[error("not a JSON file: {0}")]
    NotJson(PathBuf),

    /// Ingested document has neither a `position` object nor top-level
    /// `x`/`y`/`z` metadata fields.
    #[error("metadata is missing coordinates in {0}: expected a `position` object or top-level `x`, `y`, `z` fields")]
    MissingCoordinates(PathBuf),

    /// Coordinate metadata exists but is not usable.
    #[error("invalid coordinate metadata in {path}: {reason}")]
    InvalidCoordinates {
        /// File the document came from.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A stringified position key in an aggregate document failed to parse.
    #[error("invalid position key {0:?}: expected \"(x, y, z)\" with three numbers")]
    InvalidPositionKey(String),

    /// Document version rejected under [`VersionPolicy::Strict`].
    #[error("unsupported format version {found:?}, expected {expected:?}")]
    VersionMismatch {
        /// Version found in the document.
        found: String,
        /// Version this library writes.
        expected: String,
    },

    /// A nested per-spectrum failure.
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),

    /// Gzip codec failure during compressed save/load.
    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),

    /// I/O error reading or writing an aggregate file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON document could not be parsed or serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A physical scan position in 3D space.
///
/// Ordering and hashing go through the IEEE total order on each axis, so a
/// `Position` can key ordered and hashed maps despite holding floats. NaN
/// coordinates are never produced by the coordinate-derivation path.
#[derive(Debug, Clone, Copy)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Position {
    /// Build a position from its three coordinates.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Position {}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.x
            .total_cmp(&other.x)
            .then(self.y.total_cmp(&other.y))
            .then(self.z.total_cmp(&other.z))
    }
}

impl Hash for Position {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
        self.z.to_bits().hash(state);
    }
}

impl fmt::Display for Position {
    /// Renders the document key form, `"(x, y, z)"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl FromStr for Position {
    type Err = VolumeError;

    /// Parses the document key form: strip the parentheses, split on commas,
    /// parse three floats.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VolumeError::InvalidPositionKey(s.to_string());
        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(invalid)?;
        let parts = inner
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| invalid())?;
        match parts[..] {
            [x, y, z] => Ok(Position::new(x, y, z)),
            _ => Err(invalid()),
        }
    }
}

/// Minimum and maximum of one coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    /// Smallest coordinate on the axis.
    pub min: f64,
    /// Largest coordinate on the axis.
    pub max: f64,
}

/// Per-axis extent of the populated positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectraRange {
    /// Extent along x.
    pub x: AxisRange,
    /// Extent along y.
    pub y: AxisRange,
    /// Extent along z.
    pub z: AxisRange,
}

/// A spatially-indexed collection of spectra.
///
/// ```
/// use xrfspec::spectrum::Spectrum;
/// use xrfspec::volume::{Position, TridimensionalSpectrum};
///
/// let mut volume = TridimensionalSpectrum::new();
/// let mut spectrum = Spectrum::new();
/// spectrum.set_raw_counts(&[1, 2, 3]);
/// volume.add_new_spectrum(spectrum, Position::new(0.0, 0.0, 1.5));
/// assert_eq!(volume.get_num_spectra(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TridimensionalSpectrum {
    spectra: BTreeMap<Position, Vec<Spectrum>>,
}

impl TridimensionalSpectrum {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all spectra.
    pub fn clear(&mut self) {
        log::debug!("clearing all spectra from the collection");
        self.spectra.clear();
    }

    /// Append a spectrum at a position.
    ///
    /// Spectra at one position keep their insertion order; several detectors
    /// recorded at the same coordinates each get their own entry.
    pub fn add_new_spectrum(&mut self, spectrum: Spectrum, position: Position) {
        log::debug!("adding spectrum at {position}");
        self.spectra.entry(position).or_default().push(spectrum);
    }

    /// Load a spectrum from a JSON document file and index it at the
    /// position derived from its metadata.
    pub fn add_new_spectrum_from_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<(), VolumeError> {
        let path = path.as_ref();
        log::debug!("adding spectrum from {}", path.display());
        if !path.is_file() {
            return Err(VolumeError::NotFound(path.to_path_buf()));
        }
        if !path.extension().is_some_and(|e| e == JSON_EXTENSION) {
            return Err(VolumeError::NotJson(path.to_path_buf()));
        }
        let mut spectrum = Spectrum::new();
        spectrum.load_from_json(path)?;
        let position = position_from_metadata(spectrum.get_metadata(), path)?;
        self.add_new_spectrum(spectrum, position);
        Ok(())
    }

    /// Replace the collection with every JSON document in a directory.
    ///
    /// Not recursive; files without the `.json` extension are skipped. A
    /// failure on any file aborts the whole load and leaves the collection
    /// empty.
    pub fn load_from_folder(&mut self, folder: impl AsRef<Path>) -> Result<(), VolumeError> {
        let folder = folder.as_ref();
        log::info!("loading spectra from folder {}", folder.display());
        if !folder.exists() {
            return Err(VolumeError::NotFound(folder.to_path_buf()));
        }
        if !folder.is_dir() {
            return Err(VolumeError::NotADirectory(folder.to_path_buf()));
        }

        self.clear();
        let mut paths: Vec<PathBuf> = fs::read_dir(folder)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|e| e == JSON_EXTENSION))
            .collect();
        paths.sort();

        for (i, path) in paths.iter().enumerate() {
            log::debug!("loading spectrum {}/{}", i + 1, paths.len());
            if let Err(e) = self.add_new_spectrum_from_file(path) {
                self.clear();
                return Err(e);
            }
        }
        log::info!(
            "loaded {} spectra from folder {}",
            self.get_num_spectra(),
            folder.display()
        );
        Ok(())
    }

    /// The spectra stored at a position, in insertion order.
    pub fn get_spectra_at_position(&self, position: &Position) -> Option<&[Spectrum]> {
        self.spectra.get(position).map(Vec::as_slice)
    }

    /// Total number of stored spectra across all positions.
    pub fn get_num_spectra(&self) -> usize {
        self.spectra.values().map(Vec::len).sum()
    }

    /// Number of distinct populated positions.
    pub fn get_num_positions(&self) -> usize {
        self.spectra.len()
    }

    /// Whether the collection holds no spectra.
    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Iterate over positions and their spectra, ordered by position.
    pub fn iter(&self) -> impl Iterator<Item = (&Position, &[Spectrum])> {
        self.spectra.iter().map(|(pos, list)| (pos, list.as_slice()))
    }

    /// The populated positions, in order.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.spectra.keys()
    }

    /// Per-axis min/max of the populated positions, `None` when empty.
    pub fn get_spectra_range(&self) -> Option<SpectraRange> {
        let mut positions = self.spectra.keys();
        let first = positions.next()?;
        let mut range = SpectraRange {
            x: AxisRange { min: first.x, max: first.x },
            y: AxisRange { min: first.y, max: first.y },
            z: AxisRange { min: first.z, max: first.z },
        };
        for p in positions {
            range.x.min = range.x.min.min(p.x);
            range.x.max = range.x.max.max(p.x);
            range.y.min = range.y.min.min(p.y);
            range.y.max = range.y.max.max(p.y);
            range.z.min = range.z.min.min(p.z);
            range.z.max = range.z.max.max(p.z);
        }
        Some(range)
    }

    /// The sorted distinct integer `device_id` values found in the stored
    /// spectra's metadata. Spectra without the field are skipped.
    pub fn get_available_detector_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .spectra
            .values()
            .flatten()
            .filter_map(|s| s.get_metadata().get(fields::DEVICE_ID))
            .filter_map(|v| v.as_i64())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// A filtered copy holding only the spectra whose `device_id` equals
    /// `id`, keeping the position grouping. Positions without a matching
    /// detector are omitted.
    pub fn get_spectra_by_detector(&self, id: i64) -> TridimensionalSpectrum {
        let spectra = self
            .spectra
            .iter()
            .filter_map(|(pos, list)| {
                let matching: Vec<Spectrum> = list
                    .iter()
                    .filter(|s| {
                        s.get_metadata()
                            .get(fields::DEVICE_ID)
                            .and_then(|v| v.as_i64())
                            == Some(id)
                    })
                    .cloned()
                    .collect();
                (!matching.is_empty()).then(|| (*pos, matching))
            })
            .collect();
        TridimensionalSpectrum { spectra }
    }

    // ----- JSON document format ---------------------------------------

    /// Snapshot the collection as a [`VolumeDocument`].
    pub fn to_document(&self) -> Result<VolumeDocument, VolumeError> {
        let mut spectra = BTreeMap::new();
        for (position, list) in &self.spectra {
            let docs = list
                .iter()
                .map(Spectrum::to_document)
                .collect::<Result<Vec<_>, _>>()?;
            spectra.insert(position.to_string(), SpectrumEntries::Many(docs));
        }
        Ok(VolumeDocument {
            format_version: FORMAT_VERSION.to_string(),
            spectra,
        })
    }

    /// Replace the collection with the content of a document.
    ///
    /// The collection is cleared first; it stays empty when the document is
    /// rejected.
    pub fn apply_document(
        &mut self,
        document: VolumeDocument,
        policy: VersionPolicy,
    ) -> Result<(), VolumeError> {
        self.clear();
        if let Err(e) = self.apply_document_inner(document, policy) {
            self.clear();
            return Err(e);
        }
        Ok(())
    }

    fn apply_document_inner(
        &mut self,
        document: VolumeDocument,
        policy: VersionPolicy,
    ) -> Result<(), VolumeError> {
        if document.format_version != FORMAT_VERSION {
            match policy {
                VersionPolicy::Strict => {
                    return Err(VolumeError::VersionMismatch {
                        found: document.format_version,
                        expected: FORMAT_VERSION.to_string(),
                    });
                }
                VersionPolicy::Lenient => log::warn!(
                    "loading aggregate with format version {:?}, expected {:?}; attempting anyway",
                    document.format_version,
                    FORMAT_VERSION
                ),
            }
        }
        for (key, entries) in document.spectra {
            let position: Position = key.parse()?;
            for doc in entries.into_vec() {
                let mut spectrum = Spectrum::new();
                spectrum.apply_document(doc, policy)?;
                self.add_new_spectrum(spectrum, position);
            }
        }
        Ok(())
    }

    /// Save the collection as a JSON document. The extension is forced to
    /// `.json`.
    pub fn save_as_json(&self, path: impl AsRef<Path>) -> Result<(), VolumeError> {
        let path = schema::json_base(path.as_ref());
        let document = self.to_document()?;
        log::info!(
            "saving {} spectra to {}",
            self.get_num_spectra(),
            path.display()
        );
        fs::write(&path, serde_json::to_string_pretty(&document)?)?;
        Ok(())
    }

    /// Load the collection from a JSON document, replacing the current
    /// content.
    pub fn load_from_json(&mut self, path: impl AsRef<Path>) -> Result<(), VolumeError> {
        self.load_from_json_with_policy(path, VersionPolicy::default())
    }

    /// Load with an explicit version strictness policy.
    pub fn load_from_json_with_policy(
        &mut self,
        path: impl AsRef<Path>,
        policy: VersionPolicy,
    ) -> Result<(), VolumeError> {
        let path = schema::json_base(path.as_ref());
        if !path.is_file() {
            return Err(VolumeError::NotFound(path));
        }
        log::info!("loading spectra from {}", path.display());
        // A malformed document must never leave old entries behind.
        self.clear();
        let text = fs::read_to_string(&path)?;
        let document: VolumeDocument = serde_json::from_str(&text)?;
        self.apply_document(document, policy)?;
        log::info!(
            "loaded {} spectra from {}",
            self.get_num_spectra(),
            path.display()
        );
        Ok(())
    }

    /// Save as gzip-compressed JSON (`.json.gz`); the plain document is
    /// removed once compression has been committed.
    pub fn save_as_json_gz(&self, path: impl AsRef<Path>, level: u32) -> Result<(), VolumeError> {
        let plain = schema::json_base(path.as_ref());
        self.save_as_json(&plain)?;
        compression::compress_file(&plain, None, level, true)?;
        Ok(())
    }

    /// Load from gzip-compressed JSON, replacing the current content. The
    /// decompressed intermediate is removed afterwards; a removal failure
    /// propagates even though the data was loaded.
    pub fn load_from_json_gz(&mut self, path: impl AsRef<Path>) -> Result<(), VolumeError> {
        self.load_from_json_gz_with_policy(path, VersionPolicy::default())
    }

    /// Compressed load with an explicit version strictness policy.
    pub fn load_from_json_gz_with_policy(
        &mut self,
        path: impl AsRef<Path>,
        policy: VersionPolicy,
    ) -> Result<(), VolumeError> {
        let plain = schema::json_base(path.as_ref());
        let plain = compression::decompress_file(&plain, None, false)?;
        self.load_from_json_with_policy(&plain, policy)?;
        fs::remove_file(&plain)?;
        Ok(())
    }
}

/// Derive a position from document metadata.
///
/// A nested `position` object wins over top-level fields when both exist.
fn position_from_metadata(
    metadata: &MetadataObject,
    path: &Path,
) -> Result<Position, VolumeError> {
    if let Some(value) = metadata.get(fields::POSITION) {
        let object = value.as_object().ok_or_else(|| VolumeError::InvalidCoordinates {
            path: path.to_path_buf(),
            reason: "`position` field is not an object".to_string(),
        })?;
        let axis = |name: &str| -> Result<f64, VolumeError> {
            object
                .get(name)
                .and_then(|v| v.as_f64())
                .ok_or_else(|| VolumeError::InvalidCoordinates {
                    path: path.to_path_buf(),
                    reason: format!("`position` object is missing a numeric {name:?} field"),
                })
        };
        return Ok(Position::new(
            axis(fields::X)?,
            axis(fields::Y)?,
            axis(fields::Z)?,
        ));
    }

    match (
        metadata.get(fields::X).and_then(|v| v.as_f64()),
        metadata.get(fields::Y).and_then(|v| v.as_f64()),
        metadata.get(fields::Z).and_then(|v| v.as_f64()),
    ) {
        (Some(x), Some(y), Some(z)) => Ok(Position::new(x, y, z)),
        _ => Err(VolumeError::MissingCoordinates(path.to_path_buf())),
    }
}
