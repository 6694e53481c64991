//! # Tag-Delimited Counts Format
//!
//! A minimal text interchange format for spectrum counts, as emitted by
//! multichannel analyzer acquisition software: a literal `<<DATA>>` line, one
//! integer count per line in channel order, then `<<END>>`. Nothing else is
//! written — no calibration, metadata, or background.
//!
//! Loading is correspondingly partial: only the counts are replaced, and the
//! receiving spectrum keeps whatever calibration and metadata it already has.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::schema::MCA_EXTENSION;
use crate::spectrum::{Spectrum, SpectrumError};

/// Opening tag of the counts block.
const DATA_TAG: &str = "<<DATA>>";

/// Closing tag; reading stops here.
const END_TAG: &str = "<<END>>";

impl Spectrum {
    /// Save only the raw counts in the tag-delimited text format.
    ///
    /// The extension is forced to `.mca`. Fails when no counts are set.
    pub fn save_as_mca(&self, path: impl AsRef<Path>) -> Result<(), SpectrumError> {
        let raw = self.raw_counts().ok_or(SpectrumError::NoCounts)?;
        let path = path.as_ref().with_extension(MCA_EXTENSION);
        log::info!("saving spectrum counts to {}", path.display());

        let mut writer = BufWriter::new(fs::File::create(&path)?);
        writeln!(writer, "{DATA_TAG}")?;
        for count in raw {
            writeln!(writer, "{count}")?;
        }
        writeln!(writer, "{END_TAG}")?;
        writer.flush()?;
        Ok(())
    }

    /// Load raw counts from a tag-delimited text file, replacing the current
    /// counts.
    ///
    /// Only the lines between `<<DATA>>` and the next tag are read; any other
    /// tag closes the data section, and `<<END>>` stops the scan entirely.
    /// Lines that fail to parse as integers are skipped with a warning.
    /// Calibration and metadata are left untouched; the background is reset
    /// to zeros matching the new counts (or cleared when no valid data lines
    /// were found).
    pub fn load_from_mca(&mut self, path: impl AsRef<Path>) -> Result<(), SpectrumError> {
        let path = path.as_ref().with_extension(MCA_EXTENSION);
        if !path.is_file() {
            return Err(SpectrumError::NotFound(path));
        }
        log::info!("loading spectrum counts from {}", path.display());

        let text = fs::read_to_string(&path)?;
        let mut counts: Vec<i64> = Vec::new();
        let mut in_data_section = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with(DATA_TAG) {
                in_data_section = true;
                continue;
            }
            if line.starts_with("<<") {
                in_data_section = false;
                if line.starts_with(END_TAG) {
                    break;
                }
                continue;
            }
            if in_data_section {
                match line.parse::<i64>() {
                    Ok(count) => counts.push(count),
                    Err(_) => {
                        log::warn!("skipping unparseable data line {line:?} in {}", path.display());
                    }
                }
            }
        }

        if counts.is_empty() {
            log::warn!("no valid data lines found in {}", path.display());
        }
        self.set_raw_counts(&counts);
        log::info!(
            "spectrum counts loaded from {} ({} channels)",
            path.display(),
            self.get_num_channels()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataObject;

    #[test]
    fn test_round_trip_preserves_counts_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.mca");

        let mut original = Spectrum::new();
        original.set_raw_counts(&[12, 0, 7, 99]);
        original.set_calibration(0.5, 2.0).unwrap();
        original.save_as_mca(&path).unwrap();

        let mut restored = Spectrum::new();
        restored.load_from_mca(&path).unwrap();
        assert_eq!(restored.raw_counts(), Some(&[12, 0, 7, 99][..]));
        // The fresh object keeps its own defaults.
        assert_eq!(restored.get_calibration(), (1.0, 0.0));
        assert!(restored.get_metadata().is_empty());
        assert_eq!(restored.background_counts(), Some(&[0, 0, 0, 0][..]));
    }

    #[test]
    fn test_load_keeps_existing_calibration_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.mca");
        std::fs::write(&path, "<<DATA>>\n1\n2\n<<END>>\n").unwrap();

        let mut spectrum = Spectrum::new();
        spectrum.set_calibration(0.25, 5.0).unwrap();
        let mut meta = MetadataObject::new();
        meta.insert("sample", "pyrite");
        spectrum.add_metadata(meta);

        spectrum.load_from_mca(&path).unwrap();
        assert_eq!(spectrum.raw_counts(), Some(&[1, 2][..]));
        assert_eq!(spectrum.get_calibration(), (0.25, 5.0));
        assert_eq!(
            spectrum.get_metadata().get("sample").and_then(|v| v.as_str()),
            Some("pyrite")
        );
    }

    #[test]
    fn test_other_tags_close_data_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.mca");
        std::fs::write(
            &path,
            "<<PMCA SPECTRUM>>\nTAG - live_data\n<<DATA>>\n5\n6\n<<DP5 CONFIGURATION>>\n7\n<<END>>\n",
        )
        .unwrap();

        let mut spectrum = Spectrum::new();
        spectrum.load_from_mca(&path).unwrap();
        // The 7 after the configuration tag is outside the data section.
        assert_eq!(spectrum.raw_counts(), Some(&[5, 6][..]));
    }

    #[test]
    fn test_unparseable_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.mca");
        std::fs::write(&path, "<<DATA>>\n1\nnot-a-number\n3\n<<END>>\n").unwrap();

        let mut spectrum = Spectrum::new();
        spectrum.load_from_mca(&path).unwrap();
        assert_eq!(spectrum.raw_counts(), Some(&[1, 3][..]));
    }

    #[test]
    fn test_no_data_lines_yields_empty_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.mca");
        std::fs::write(&path, "<<DATA>>\n<<END>>\n").unwrap();

        let mut spectrum = Spectrum::new();
        spectrum.set_raw_counts(&[1, 2, 3]);
        spectrum.load_from_mca(&path).unwrap();
        assert_eq!(spectrum.raw_counts(), Some(&[][..]));
        assert_eq!(spectrum.get_num_channels(), 0);
    }

    #[test]
    fn test_extension_forced() {
        let dir = tempfile::tempdir().unwrap();
        let mut spectrum = Spectrum::new();
        spectrum.set_raw_counts(&[4]);
        spectrum.save_as_mca(dir.path().join("scan.txt")).unwrap();
        assert!(dir.path().join("scan.mca").is_file());

        let mut restored = Spectrum::new();
        restored.load_from_mca(dir.path().join("scan")).unwrap();
        assert_eq!(restored.raw_counts(), Some(&[4][..]));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut spectrum = Spectrum::new();
        let err = spectrum.load_from_mca(dir.path().join("absent.mca")).unwrap_err();
        assert!(matches!(err, SpectrumError::NotFound(_)));
    }

    #[test]
    fn test_save_empty_fails() {
        let dir = tempfile::tempdir().unwrap();
        let spectrum = Spectrum::new();
        assert!(matches!(
            spectrum.save_as_mca(dir.path().join("scan.mca")),
            Err(SpectrumError::NoCounts)
        ));
    }

    #[test]
    fn test_negative_counts_in_file_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.mca");
        std::fs::write(&path, "<<DATA>>\n5\n-2\n10\n<<END>>\n").unwrap();

        let mut spectrum = Spectrum::new();
        spectrum.load_from_mca(&path).unwrap();
        assert_eq!(spectrum.raw_counts(), Some(&[5, 0, 10][..]));
    }
}
