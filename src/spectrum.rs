//! # Spectrum Entity
//!
//! A [`Spectrum`] is one detector reading: the per-channel count array, an
//! optional background count array of the same length, a linear energy
//! calibration, and free-form acquisition metadata.
//!
//! ## Invariants
//!
//! 1. Whenever raw counts exist, the background array exists and has the same
//!    length. A background of all zeros is an ordinary, common value — it is
//!    not "no background". Mutations that would break the length agreement
//!    reset the background to zeros and log a warning.
//! 2. Counts are never negative. Negative inputs are clamped to zero with a
//!    warning.
//!
//! ## Persistence
//!
//! Two formats are supported: the JSON document format (full state, see
//! [`crate::schema`]), optionally gzip-compressed, and the tag-delimited
//! counts-only text format in [`crate::mca`].

use std::fs;
use std::path::{Path, PathBuf};

use crate::compression::{self, CompressionError};
use crate::metadata::MetadataObject;
use crate::schema::{self, SpectrumDocument, VersionPolicy, FORMAT_VERSION};

/// Errors that can occur while mutating or (de)serializing a spectrum.
#[derive(Debug, thiserror::Error)]
pub enum SpectrumError {
    /// File does not exist.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// I/O error reading or writing a spectrum file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON document could not be parsed or serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Calibration constants must be finite numbers.
    #[error("calibration constants must be finite, got a={a}, b={b}")]
    InvalidCalibration {
        /// Rejected slope.
        a: f64,
        /// Rejected intercept.
        b: f64,
    },

    /// Operation requires raw counts, but none are set.
    #[error("no raw counts data available")]
    NoCounts,

    /// Caller-supplied background does not match the spectrum's channel count.
    #[error("channel count mismatch: spectrum has {expected} channels, background has {actual}")]
    ChannelMismatch {
        /// Channels in the spectrum receiving the background.
        expected: usize,
        /// Channels in the supplied background.
        actual: usize,
    },

    /// Document version rejected under [`VersionPolicy::Strict`].
    #[error("unsupported format version {found:?}, expected {expected:?}")]
    VersionMismatch {
        /// Version found in the document.
        found: String,
        /// Version this library writes.
        expected: String,
    },

    /// Gzip codec failure during compressed save/load.
    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),
}

/// One detector reading: counts, background, calibration, and metadata.
///
/// Created empty, populated through setters, persisted through the
/// `save_as_*`/`load_from_*` methods.
///
/// ```
/// use xrfspec::spectrum::Spectrum;
///
/// let mut spectrum = Spectrum::new();
/// spectrum.set_raw_counts(&[12, 40, 7]);
/// spectrum.set_calibration(0.5, 10.0).unwrap();
///
/// let (energy, counts) = spectrum.get_data(true, false).unwrap();
/// assert_eq!(energy, vec![10.0, 10.5, 11.0]);
/// assert_eq!(counts, vec![12, 40, 7]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrum {
    raw_counts: Option<Vec<u32>>,
    background_counts: Option<Vec<u32>>,
    cal_a: f64,
    cal_b: f64,
    metadata: MetadataObject,
}

impl Spectrum {
    /// Create an empty spectrum with identity calibration (a=1, b=0).
    pub fn new() -> Self {
        Self {
            raw_counts: None,
            background_counts: None,
            cal_a: 1.0,
            cal_b: 0.0,
            metadata: MetadataObject::new(),
        }
    }

    /// Reset the spectrum to its freshly-created state.
    pub fn clear(&mut self) {
        self.raw_counts = None;
        self.background_counts = None;
        self.cal_a = 1.0;
        self.cal_b = 0.0;
        self.metadata.clear();
    }

    /// Set the raw per-channel counts.
    ///
    /// The input is copied; negative values are clamped to zero with a
    /// warning. If the channel count changes (or no background exists yet)
    /// the background is reset to zeros to keep the length invariant.
    pub fn set_raw_counts(&mut self, counts: &[i64]) {
        let mut clamped = 0usize;
        let raw: Vec<u32> = counts
            .iter()
            .map(|&c| {
                if c < 0 {
                    clamped += 1;
                    0
                } else {
                    c.min(i64::from(u32::MAX)) as u32
                }
            })
            .collect();
        if clamped > 0 {
            log::warn!("raw counts contain {clamped} negative values, clamped to zero");
        }

        let num_channels = raw.len();
        self.raw_counts = Some(raw);

        match &self.background_counts {
            Some(bg) if bg.len() == num_channels => {}
            Some(_) => {
                log::warn!("channel count changed, resetting background to zeros");
                self.reset_background();
            }
            None => self.reset_background(),
        }
        log::debug!("raw counts set with {num_channels} channels");
    }

    /// Set the linear energy calibration: `energy = a * channel + b`.
    ///
    /// Both constants must be finite.
    pub fn set_calibration(&mut self, a: f64, b: f64) -> Result<(), SpectrumError> {
        if !a.is_finite() || !b.is_finite() {
            return Err(SpectrumError::InvalidCalibration { a, b });
        }
        self.cal_a = a;
        self.cal_b = b;
        log::debug!("calibration set: a={a}, b={b}");
        Ok(())
    }

    /// The calibration constants `(a, b)`.
    pub fn get_calibration(&self) -> (f64, f64) {
        (self.cal_a, self.cal_b)
    }

    /// Number of channels, 0 when no counts are set.
    pub fn get_num_channels(&self) -> usize {
        self.raw_counts.as_ref().map_or(0, Vec::len)
    }

    /// The raw counts, if set.
    pub fn raw_counts(&self) -> Option<&[u32]> {
        self.raw_counts.as_deref()
    }

    /// The background counts, if established.
    pub fn background_counts(&self) -> Option<&[u32]> {
        self.background_counts.as_deref()
    }

    /// Copy another spectrum's raw counts as this spectrum's background.
    ///
    /// Unlike the automatic zero-reset, a caller-supplied background with a
    /// mismatched channel count is a hard error, not a repair.
    pub fn set_background(&mut self, background: &Spectrum) -> Result<(), SpectrumError> {
        let expected = match &self.raw_counts {
            Some(raw) => raw.len(),
            None => return Err(SpectrumError::NoCounts),
        };
        let bg = background
            .raw_counts
            .as_ref()
            .ok_or(SpectrumError::NoCounts)?;
        if bg.len() != expected {
            return Err(SpectrumError::ChannelMismatch {
                expected,
                actual: bg.len(),
            });
        }
        self.background_counts = Some(bg.clone());
        log::debug!("background set with {} channels", bg.len());
        Ok(())
    }

    /// Reset the background to zeros matching the raw counts' length.
    ///
    /// This is the named repair transition for the length invariant; tests
    /// and callers can invoke it directly instead of relying on the setters'
    /// automatic repair.
    pub fn reset_background(&mut self) {
        match &self.raw_counts {
            Some(raw) => {
                self.background_counts = Some(vec![0; raw.len()]);
                log::debug!("background reset to zeros");
            }
            None => {
                self.background_counts = None;
            }
        }
    }

    /// The raw counts minus the background, clipped at zero per channel.
    ///
    /// Returns `None` when no raw counts are set. A missing or mismatched
    /// background (unreachable through the public API, but possible to
    /// observe mid-repair) is treated as zeros with a warning rather than
    /// subtracting garbage.
    pub fn get_counts_without_background(&self) -> Option<Vec<u32>> {
        let raw = self.raw_counts.as_ref()?;
        match &self.background_counts {
            Some(bg) if bg.len() == raw.len() => Some(
                raw.iter()
                    .zip(bg)
                    .map(|(&r, &b)| r.saturating_sub(b))
                    .collect(),
            ),
            _ => {
                log::warn!("background missing or mismatched during subtraction, treating as zeros");
                Some(raw.clone())
            }
        }
    }

    /// The calibrated energy axis, one value per channel.
    pub fn energy_axis(&self) -> Option<Vec<f64>> {
        let n = self.get_num_channels();
        if n == 0 {
            return None;
        }
        Some((0..n).map(|ch| self.cal_a * ch as f64 + self.cal_b).collect())
    }

    /// The spectrum as `(x_axis, y_counts)` for plotting or integration.
    ///
    /// `use_energy_axis` selects the calibrated energy axis over plain
    /// channel indices; `without_background` selects background-subtracted
    /// counts over raw counts. Returns `None` when no counts are set.
    pub fn get_data(
        &self,
        use_energy_axis: bool,
        without_background: bool,
    ) -> Option<(Vec<f64>, Vec<u32>)> {
        let y_counts = if without_background {
            self.get_counts_without_background()?
        } else {
            self.raw_counts.clone()?
        };
        let x_axis = if use_energy_axis {
            (0..y_counts.len())
                .map(|ch| self.cal_a * ch as f64 + self.cal_b)
                .collect()
        } else {
            (0..y_counts.len()).map(|ch| ch as f64).collect()
        };
        Some((x_axis, y_counts))
    }

    /// Merge key-value pairs into the metadata, last write wins per key.
    pub fn add_metadata(&mut self, entries: MetadataObject) {
        self.metadata.merge(entries);
    }

    /// The acquisition metadata.
    pub fn get_metadata(&self) -> &MetadataObject {
        &self.metadata
    }

    // ----- JSON document format ---------------------------------------

    /// Snapshot the in-memory state as a [`SpectrumDocument`].
    ///
    /// Fails when no counts are set; an empty spectrum has nothing to
    /// persist.
    pub fn to_document(&self) -> Result<SpectrumDocument, SpectrumError> {
        let raw = self.raw_counts.as_ref().ok_or(SpectrumError::NoCounts)?;
        Ok(SpectrumDocument {
            format_version: FORMAT_VERSION.to_string(),
            num_channels: raw.len(),
            calibration_a: self.cal_a,
            calibration_b: self.cal_b,
            metadata: self.metadata.clone(),
            raw_counts: raw.iter().map(|&c| i64::from(c)).collect(),
            background_counts: self
                .background_counts
                .as_ref()
                .map(|bg| bg.iter().map(|&c| i64::from(c)).collect()),
        })
    }

    /// Replace this spectrum's state with the content of a document.
    ///
    /// The spectrum is reset to defaults first; if the document is rejected
    /// the spectrum stays empty rather than half-updated.
    pub fn apply_document(
        &mut self,
        document: SpectrumDocument,
        policy: VersionPolicy,
    ) -> Result<(), SpectrumError> {
        self.clear();
        if let Err(e) = self.apply_document_inner(document, policy) {
            self.clear();
            return Err(e);
        }
        Ok(())
    }

    fn apply_document_inner(
        &mut self,
        document: SpectrumDocument,
        policy: VersionPolicy,
    ) -> Result<(), SpectrumError> {
        if document.format_version != FORMAT_VERSION {
            match policy {
                VersionPolicy::Strict => {
                    return Err(SpectrumError::VersionMismatch {
                        found: document.format_version,
                        expected: FORMAT_VERSION.to_string(),
                    });
                }
                VersionPolicy::Lenient => log::warn!(
                    "loading document with format version {:?}, expected {:?}; attempting anyway",
                    document.format_version,
                    FORMAT_VERSION
                ),
            }
        }

        self.set_calibration(document.calibration_a, document.calibration_b)?;
        self.add_metadata(document.metadata);
        self.set_raw_counts(&document.raw_counts);

        if let Some(bg_counts) = document.background_counts {
            let mut background = Spectrum::new();
            background.set_raw_counts(&bg_counts);
            match self.set_background(&background) {
                Ok(()) => {}
                Err(SpectrumError::ChannelMismatch { expected, actual }) => {
                    log::warn!(
                        "document background has {actual} channels, spectrum has {expected}; \
                         resetting background to zeros"
                    );
                    self.reset_background();
                }
                Err(e) => return Err(e),
            }
        }

        if document.num_channels != self.get_num_channels() {
            log::warn!(
                "document claims {} channels but raw_counts holds {}",
                document.num_channels,
                self.get_num_channels()
            );
        }
        Ok(())
    }

    /// Save the full spectrum state as a JSON document.
    ///
    /// The extension is forced to `.json`.
    pub fn save_as_json(&self, path: impl AsRef<Path>) -> Result<(), SpectrumError> {
        let path = schema::json_base(path.as_ref());
        let document = self.to_document()?;
        log::info!("saving spectrum to {}", path.display());
        fs::write(&path, serde_json::to_string_pretty(&document)?)?;
        Ok(())
    }

    /// Load spectrum state from a JSON document, replacing the current state.
    pub fn load_from_json(&mut self, path: impl AsRef<Path>) -> Result<(), SpectrumError> {
        self.load_from_json_with_policy(path, VersionPolicy::default())
    }

    /// Load from a JSON document with an explicit version strictness policy.
    pub fn load_from_json_with_policy(
        &mut self,
        path: impl AsRef<Path>,
        policy: VersionPolicy,
    ) -> Result<(), SpectrumError> {
        let path = schema::json_base(path.as_ref());
        if !path.is_file() {
            return Err(SpectrumError::NotFound(path));
        }
        log::info!("loading spectrum from {}", path.display());
        // A malformed document must never leave old state behind.
        self.clear();
        let text = fs::read_to_string(&path)?;
        let document: SpectrumDocument = serde_json::from_str(&text)?;
        self.apply_document(document, policy)?;
        log::info!(
            "spectrum loaded from {} ({} channels)",
            path.display(),
            self.get_num_channels()
        );
        Ok(())
    }

    /// Load spectrum state from an in-memory JSON string.
    pub fn load_from_json_str(
        &mut self,
        json: &str,
        policy: VersionPolicy,
    ) -> Result<(), SpectrumError> {
        self.clear();
        let document: SpectrumDocument = serde_json::from_str(json)?;
        self.apply_document(document, policy)
    }

    /// Save as gzip-compressed JSON (`.json.gz`).
    ///
    /// The plain document is written first and removed once compression has
    /// been committed; a compression failure leaves the plain file in place
    /// and propagates the error.
    pub fn save_as_json_gz(
        &self,
        path: impl AsRef<Path>,
        level: u32,
    ) -> Result<(), SpectrumError> {
        let plain = schema::json_base(path.as_ref());
        self.save_as_json(&plain)?;
        compression::compress_file(&plain, None, level, true)?;
        Ok(())
    }

    /// Load from gzip-compressed JSON (`.json.gz`), replacing current state.
    ///
    /// The document is decompressed beside the archive, parsed, and the
    /// decompressed copy removed. A failure to remove it propagates as an
    /// error even though the spectrum was loaded.
    pub fn load_from_json_gz(&mut self, path: impl AsRef<Path>) -> Result<(), SpectrumError> {
        self.load_from_json_gz_with_policy(path, VersionPolicy::default())
    }

    /// Compressed load with an explicit version strictness policy.
    pub fn load_from_json_gz_with_policy(
        &mut self,
        path: impl AsRef<Path>,
        policy: VersionPolicy,
    ) -> Result<(), SpectrumError> {
        let plain = schema::json_base(path.as_ref());
        let plain = compression::decompress_file(&plain, None, false)?;
        self.load_from_json_with_policy(&plain, policy)?;
        fs::remove_file(&plain)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataValue;
    use proptest::prelude::*;

    #[test]
    fn test_negative_counts_clamped() {
        let mut spectrum = Spectrum::new();
        spectrum.set_raw_counts(&[5, -2, 10]);
        assert_eq!(spectrum.raw_counts(), Some(&[5, 0, 10][..]));
    }

    #[test]
    fn test_background_reset_on_length_change() {
        let mut spectrum = Spectrum::new();
        spectrum.set_raw_counts(&[1, 2, 3]);

        let mut background = Spectrum::new();
        background.set_raw_counts(&[1, 1, 1]);
        spectrum.set_background(&background).unwrap();

        spectrum.set_raw_counts(&[4, 5, 6, 7]);
        assert_eq!(spectrum.background_counts(), Some(&[0, 0, 0, 0][..]));
    }

    #[test]
    fn test_background_mismatch_is_hard_error() {
        let mut spectrum = Spectrum::new();
        spectrum.set_raw_counts(&[1, 2, 3]);

        let mut background = Spectrum::new();
        background.set_raw_counts(&[1, 1]);
        let err = spectrum.set_background(&background).unwrap_err();
        assert!(matches!(
            err,
            SpectrumError::ChannelMismatch {
                expected: 3,
                actual: 2
            }
        ));
        // The attempted set must not have disturbed the zero background.
        assert_eq!(spectrum.background_counts(), Some(&[0, 0, 0][..]));
    }

    #[test]
    fn test_background_requires_counts() {
        let mut spectrum = Spectrum::new();
        let mut background = Spectrum::new();
        background.set_raw_counts(&[1]);
        assert!(matches!(
            spectrum.set_background(&background),
            Err(SpectrumError::NoCounts)
        ));

        spectrum.set_raw_counts(&[1]);
        let empty = Spectrum::new();
        assert!(matches!(
            spectrum.set_background(&empty),
            Err(SpectrumError::NoCounts)
        ));
    }

    #[test]
    fn test_subtraction_clips_at_zero() {
        let mut spectrum = Spectrum::new();
        spectrum.set_raw_counts(&[10, 3, 8]);

        let mut background = Spectrum::new();
        background.set_raw_counts(&[4, 5, 8]);
        spectrum.set_background(&background).unwrap();

        assert_eq!(
            spectrum.get_counts_without_background(),
            Some(vec![6, 0, 0])
        );
    }

    #[test]
    fn test_subtraction_with_zero_background_equals_raw() {
        let mut spectrum = Spectrum::new();
        spectrum.set_raw_counts(&[7, 0, 42]);
        assert_eq!(
            spectrum.get_counts_without_background(),
            Some(vec![7, 0, 42])
        );
    }

    #[test]
    fn test_energy_axis() {
        let mut spectrum = Spectrum::new();
        spectrum.set_raw_counts(&[1, 1, 1]);
        spectrum.set_calibration(0.5, 10.0).unwrap();
        assert_eq!(spectrum.energy_axis(), Some(vec![10.0, 10.5, 11.0]));
    }

    #[test]
    fn test_non_finite_calibration_rejected() {
        let mut spectrum = Spectrum::new();
        assert!(spectrum.set_calibration(f64::NAN, 0.0).is_err());
        assert!(spectrum.set_calibration(1.0, f64::INFINITY).is_err());
        assert_eq!(spectrum.get_calibration(), (1.0, 0.0));
    }

    #[test]
    fn test_get_data_without_counts_is_none() {
        let spectrum = Spectrum::new();
        assert!(spectrum.get_data(false, false).is_none());
        assert!(spectrum.get_data(true, true).is_none());
    }

    #[test]
    fn test_get_data_channel_axis() {
        let mut spectrum = Spectrum::new();
        spectrum.set_raw_counts(&[9, 8, 7]);
        let (x, y) = spectrum.get_data(false, false).unwrap();
        assert_eq!(x, vec![0.0, 1.0, 2.0]);
        assert_eq!(y, vec![9, 8, 7]);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spectrum.json");

        let mut original = Spectrum::new();
        original.set_raw_counts(&[3, 1, 4, 1, 5]);
        original.set_calibration(2.0, -1.5).unwrap();
        let mut meta = MetadataObject::new();
        meta.insert("sample", "basalt");
        meta.insert("device_id", 1i64);
        original.add_metadata(meta);

        let mut background = Spectrum::new();
        background.set_raw_counts(&[1, 0, 1, 0, 1]);
        original.set_background(&background).unwrap();

        original.save_as_json(&path).unwrap();

        let mut restored = Spectrum::new();
        restored.load_from_json(&path).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn test_json_load_failure_leaves_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        // raw_counts missing entirely.
        std::fs::write(&path, r#"{"format_version": "1.0"}"#).unwrap();

        let mut spectrum = Spectrum::new();
        spectrum.set_raw_counts(&[1, 2, 3]);
        assert!(spectrum.load_from_json(&path).is_err());
        assert_eq!(spectrum.get_num_channels(), 0);
        assert!(spectrum.get_metadata().is_empty());
        assert_eq!(spectrum.get_calibration(), (1.0, 0.0));
    }

    #[test]
    fn test_json_load_clamps_negative_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("negative.json");
        std::fs::write(
            &path,
            r#"{"format_version": "1.0", "num_channels": 3,
                "calibration_a": 1.0, "calibration_b": 0.0,
                "metadata": {}, "raw_counts": [5, -2, 10],
                "background_counts": null}"#,
        )
        .unwrap();

        let mut spectrum = Spectrum::new();
        spectrum.load_from_json(&path).unwrap();
        assert_eq!(spectrum.raw_counts(), Some(&[5, 0, 10][..]));
        assert_eq!(spectrum.background_counts(), Some(&[0, 0, 0][..]));
    }

    #[test]
    fn test_json_load_mismatched_background_falls_back_to_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("badbg.json");
        std::fs::write(
            &path,
            r#"{"format_version": "1.0", "num_channels": 3,
                "calibration_a": 1.0, "calibration_b": 0.0,
                "metadata": {}, "raw_counts": [5, 2, 10],
                "background_counts": [1, 1]}"#,
        )
        .unwrap();

        let mut spectrum = Spectrum::new();
        spectrum.load_from_json(&path).unwrap();
        assert_eq!(spectrum.background_counts(), Some(&[0, 0, 0][..]));
    }

    #[test]
    fn test_version_mismatch_lenient_loads_strict_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versioned.json");
        std::fs::write(
            &path,
            r#"{"format_version": "0.9", "num_channels": 1,
                "calibration_a": 1.0, "calibration_b": 0.0,
                "metadata": {}, "raw_counts": [1],
                "background_counts": null}"#,
        )
        .unwrap();

        let mut spectrum = Spectrum::new();
        spectrum
            .load_from_json_with_policy(&path, VersionPolicy::Lenient)
            .unwrap();
        assert_eq!(spectrum.get_num_channels(), 1);

        let err = spectrum
            .load_from_json_with_policy(&path, VersionPolicy::Strict)
            .unwrap_err();
        assert!(matches!(err, SpectrumError::VersionMismatch { .. }));
        // Strict rejection resets the spectrum.
        assert_eq!(spectrum.get_num_channels(), 0);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut spectrum = Spectrum::new();
        let err = spectrum
            .load_from_json(dir.path().join("absent.json"))
            .unwrap_err();
        assert!(matches!(err, SpectrumError::NotFound(_)));
    }

    #[test]
    fn test_save_empty_spectrum_fails() {
        let dir = tempfile::tempdir().unwrap();
        let spectrum = Spectrum::new();
        let err = spectrum
            .save_as_json(dir.path().join("empty.json"))
            .unwrap_err();
        assert!(matches!(err, SpectrumError::NoCounts));
    }

    #[test]
    fn test_compressed_round_trip_leaves_no_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("scan.json");

        let mut original = Spectrum::new();
        original.set_raw_counts(&[2, 4, 6, 8]);
        original.set_calibration(0.25, 5.0).unwrap();
        original.save_as_json_gz(&base, 9).unwrap();

        assert!(!base.exists());
        assert!(dir.path().join("scan.json.gz").is_file());

        let mut restored = Spectrum::new();
        restored.load_from_json_gz(&base).unwrap();
        assert_eq!(original, restored);
        // Decompressed intermediate must be gone again.
        assert!(!base.exists());
    }

    #[test]
    fn test_metadata_round_trip_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");

        let mut spectrum = Spectrum::new();
        spectrum.set_raw_counts(&[1]);
        let mut meta = MetadataObject::new();
        meta.insert("zeta", 1i64);
        meta.insert("alpha", MetadataValue::Null);
        meta.insert("omega", true);
        spectrum.add_metadata(meta);
        spectrum.save_as_json(&path).unwrap();

        let mut restored = Spectrum::new();
        restored.load_from_json(&path).unwrap();
        let keys: Vec<&str> = restored.get_metadata().keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "omega"]);
    }

    proptest! {
        #[test]
        fn prop_counts_never_negative(counts in proptest::collection::vec(-1000i64..1000, 0..64)) {
            let mut spectrum = Spectrum::new();
            spectrum.set_raw_counts(&counts);
            let stored = spectrum.raw_counts().unwrap();
            prop_assert_eq!(stored.len(), counts.len());
            for (&stored, &input) in stored.iter().zip(&counts) {
                prop_assert_eq!(i64::from(stored), input.max(0));
            }
        }

        #[test]
        fn prop_second_set_resets_background(
            first in proptest::collection::vec(0i64..100, 1..32),
            second in proptest::collection::vec(0i64..100, 1..32),
        ) {
            let mut spectrum = Spectrum::new();
            spectrum.set_raw_counts(&first);
            let mut background = Spectrum::new();
            background.set_raw_counts(&vec![1; first.len()]);
            spectrum.set_background(&background).unwrap();

            spectrum.set_raw_counts(&second);
            let bg = spectrum.background_counts().unwrap();
            prop_assert_eq!(bg.len(), second.len());
            if first.len() != second.len() {
                prop_assert!(bg.iter().all(|&c| c == 0));
            }
        }

        #[test]
        fn prop_subtraction_never_negative(
            raw in proptest::collection::vec(0i64..1000, 1..32),
            bg in proptest::collection::vec(0i64..1000, 1..32),
        ) {
            let mut spectrum = Spectrum::new();
            spectrum.set_raw_counts(&raw);
            if raw.len() == bg.len() {
                let mut background = Spectrum::new();
                background.set_raw_counts(&bg);
                spectrum.set_background(&background).unwrap();
            }
            let subtracted = spectrum.get_counts_without_background().unwrap();
            prop_assert_eq!(subtracted.len(), raw.len());
            // u32 output makes negativity unrepresentable; check clipping math.
            for (i, &s) in subtracted.iter().enumerate() {
                let expected = if raw.len() == bg.len() {
                    (raw[i] - bg[i]).max(0)
                } else {
                    raw[i]
                };
                prop_assert_eq!(i64::from(s), expected);
            }
        }
    }
}
