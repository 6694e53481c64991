//! # xrfspec - X-Ray Fluorescence Spectrum Storage and Reconstruction
//!
//! `xrfspec` stores, serializes, and spatially aggregates X-ray fluorescence
//! (XRF) spectra: per-channel photon counts from an energy-dispersive
//! detector, with a linear energy calibration, an optional background model,
//! and free-form acquisition metadata.
//!
//! ## Key Features
//!
//! - **Self-healing count model**: counts are never negative and the
//!   background array always matches the channel count; violating inputs are
//!   clamped or repaired with a logged warning instead of corrupting state.
//!
//! - **Two interchange formats**: a versioned JSON document carrying the full
//!   spectrum state (optionally gzip-compressed), and the tag-delimited
//!   `.mca` text format emitted by multichannel analyzer acquisition
//!   software, which carries counts only.
//!
//! - **Order-preserving metadata**: metadata keys round-trip through JSON in
//!   document order, so files diff cleanly across save/load cycles.
//!
//! - **Spatial aggregation**: a scan's many spectra are indexed by physical
//!   `(x, y, z)` position, with several detectors allowed per position and
//!   backward-compatible decoding of the older one-spectrum-per-position
//!   aggregate schema.
//!
//! - **Dense grid reconstruction**: per-voxel intensity fields for
//!   visualization, integrating counts over a channel or energy region of
//!   interest.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xrfspec::prelude::*;
//!
//! // One detector reading.
//! let mut spectrum = Spectrum::new();
//! spectrum.set_raw_counts(&[120, 340, 95, 12]);
//! spectrum.set_calibration(0.02, 0.0)?;
//! spectrum.save_as_json("reading.json")?;
//!
//! // A spatially-indexed scan.
//! let mut volume = TridimensionalSpectrum::new();
//! volume.load_from_folder("./scan_output")?;
//!
//! // Dense intensity field over an energy window.
//! let roi = Roi::new(RoiAxis::Energy, 6.2, 6.6)?;
//! if let Some(grid) = GridReconstructor::new(roi, true).reconstruct(&volume) {
//!     println!("grid shape: {:?}", grid.shape());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - [`spectrum`]: the [`Spectrum`](spectrum::Spectrum) entity and its JSON
//!   persistence
//! - [`mca`]: the tag-delimited counts-only text format
//! - [`metadata`]: the order-preserving dynamic metadata tree
//! - [`schema`]: persisted document layouts, format version, version policy
//! - [`compression`]: single-file gzip codec with atomic commit
//! - [`volume`]: the position-indexed aggregate
//! - [`grid`]: sparse-to-dense intensity reconstruction

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod compression;
pub mod grid;
pub mod mca;
pub mod metadata;
pub mod schema;
pub mod spectrum;
pub mod volume;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::compression::{compress_file, decompress_file, CompressionError};
    pub use crate::grid::{GridError, GridReconstructor, IntensityGrid, Roi, RoiAxis};
    pub use crate::metadata::{MetadataObject, MetadataValue};
    pub use crate::schema::{
        SpectrumDocument, SpectrumEntries, VersionPolicy, VolumeDocument, FORMAT_VERSION,
    };
    pub use crate::spectrum::{Spectrum, SpectrumError};
    pub use crate::volume::{
        AxisRange, Position, SpectraRange, TridimensionalSpectrum, VolumeError,
    };
}
