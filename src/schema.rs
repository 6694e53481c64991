//! # Persisted Document Schema
//!
//! Definitions shared by the spectrum and volume serializers: the JSON
//! document layouts, the format version tag, metadata field names with
//! reserved meaning, and the strictness policy applied when a document's
//! version does not match this library's.
//!
//! ## Spectrum document
//!
//! | Field | Type | Notes |
//! |-------|------|-------|
//! | format_version | string | currently `"1.0"` |
//! | num_channels | integer | advisory; consistency-checked, not authoritative |
//! | calibration_a | float | eV per channel (slope) |
//! | calibration_b | float | eV at channel 0 (intercept) |
//! | metadata | object | arbitrary nested JSON, key order preserved |
//! | raw_counts | array of integers | required |
//! | background_counts | array of integers or null | validated against channel count |
//!
//! ## Volume document
//!
//! ```json
//! { "format_version": "1.0",
//!   "spectra": { "(x, y, z)": [ <spectrum document>, ... ] } }
//! ```
//!
//! Older writers stored a single spectrum document per position instead of a
//! list; [`SpectrumEntries`] decodes both shapes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::metadata::MetadataObject;

/// Version tag written into every persisted document.
pub const FORMAT_VERSION: &str = "1.0";

/// File extension for JSON spectrum and volume documents.
pub const JSON_EXTENSION: &str = "json";

/// File extension for the tag-delimited counts format.
pub const MCA_EXTENSION: &str = "mca";

/// File extension appended to gzip-compressed documents.
pub const GZ_EXTENSION: &str = "gz";

/// Metadata field names with reserved meaning.
pub mod fields {
    /// Integer detector identifier distinguishing sensors at one position.
    pub const DEVICE_ID: &str = "device_id";
    /// Nested `{x, y, z}` scan position object.
    pub const POSITION: &str = "position";
    /// Top-level x coordinate (older files without a `position` object).
    pub const X: &str = "x";
    /// Top-level y coordinate.
    pub const Y: &str = "y";
    /// Top-level z coordinate.
    pub const Z: &str = "z";
}

/// How to treat a `format_version` that differs from [`FORMAT_VERSION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionPolicy {
    /// Log a warning and attempt the load anyway (default).
    #[default]
    Lenient,
    /// Reject the document with an error.
    Strict,
}

/// On-disk layout of a single spectrum document.
///
/// Counts are kept as `i64` here: clamping of negative values is the
/// responsibility of [`Spectrum::set_raw_counts`](crate::spectrum::Spectrum::set_raw_counts),
/// which every loader funnels through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumDocument {
    /// Format version tag of the writer.
    pub format_version: String,
    /// Advisory channel count.
    pub num_channels: usize,
    /// Calibration slope (eV per channel).
    pub calibration_a: f64,
    /// Calibration intercept (eV at channel 0).
    pub calibration_b: f64,
    /// Acquisition metadata, key order preserved.
    pub metadata: MetadataObject,
    /// Counts per channel.
    pub raw_counts: Vec<i64>,
    /// Background counts per channel, if a background was established.
    pub background_counts: Option<Vec<i64>>,
}

/// On-disk layout of a volume (spatial aggregate) document.
///
/// Keys of `spectra` are positions rendered as `"(x, y, z)"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeDocument {
    /// Format version tag of the writer.
    pub format_version: String,
    /// Per-position spectrum documents.
    pub spectra: std::collections::BTreeMap<String, SpectrumEntries>,
}

/// The value stored under a position key: a list of spectrum documents, or a
/// bare document written by the older single-spectrum-per-position schema.
///
/// The list shape is attempted first; the single-document fallback keeps old
/// files loadable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpectrumEntries {
    /// Current schema: one list of documents per position.
    Many(Vec<SpectrumDocument>),
    /// Legacy schema: a single document per position.
    One(Box<SpectrumDocument>),
}

impl SpectrumEntries {
    /// Normalize to the list shape.
    pub fn into_vec(self) -> Vec<SpectrumDocument> {
        match self {
            SpectrumEntries::Many(docs) => docs,
            SpectrumEntries::One(doc) => vec![*doc],
        }
    }
}

/// Force `path` to carry the `.json` extension, stripping a trailing `.gz`
/// first so `scan.json.gz` maps to `scan.json` rather than `scan.json.json`.
pub(crate) fn json_base(path: &Path) -> PathBuf {
    let path = if path.extension().is_some_and(|e| e == GZ_EXTENSION) {
        path.with_extension("")
    } else {
        path.to_path_buf()
    };
    path.with_extension(JSON_EXTENSION)
}

/// Append `.gz` to a path without disturbing its existing extension.
pub(crate) fn gz_sibling(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".");
    os.push(GZ_EXTENSION);
    PathBuf::from(os)
}
