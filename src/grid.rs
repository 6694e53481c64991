//! # Dense Grid Reconstruction
//!
//! Turns the sparse position → spectra map of a
//! [`TridimensionalSpectrum`](crate::volume::TridimensionalSpectrum) into a
//! dense 3D intensity field for visualization. Each populated position
//! contributes one scalar: the sum of its counts over a region of interest
//! (ROI) on either the channel axis or the calibrated energy axis.
//!
//! The grid axes are the sorted distinct coordinate values per axis, so the
//! grid is as small as the scan pattern allows; positions the scan never
//! visited stay at zero intensity.
//!
//! When several detectors are stored at one position their intensities
//! accumulate into the same voxel. Callers that want per-detector fields
//! must pre-filter with
//! [`get_spectra_by_detector`](crate::volume::TridimensionalSpectrum::get_spectra_by_detector)
//! first; unfiltered multi-detector aggregation sums everything.

use ndarray::Array3;

use crate::spectrum::Spectrum;
use crate::volume::{Position, TridimensionalSpectrum};

/// Errors from grid reconstruction setup.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// ROI bounds must be finite with `min <= max`.
    #[error("invalid ROI range: min={min}, max={max}")]
    InvalidRange {
        /// Rejected lower bound.
        min: f64,
        /// Rejected upper bound.
        max: f64,
    },
}

/// Which axis the ROI window is expressed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoiAxis {
    /// Plain channel indices, `0..N-1`.
    #[default]
    Channel,
    /// The calibrated energy axis, `a * channel + b`.
    Energy,
}

/// A `[min, max]` integration window on the channel or energy axis.
///
/// Bounds are inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    axis: RoiAxis,
    min: f64,
    max: f64,
}

impl Roi {
    /// Build an ROI, rejecting non-finite or inverted bounds.
    pub fn new(axis: RoiAxis, min: f64, max: f64) -> Result<Self, GridError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(GridError::InvalidRange { min, max });
        }
        Ok(Self { axis, min, max })
    }

    /// The axis the window is expressed on.
    pub fn axis(&self) -> RoiAxis {
        self.axis
    }

    /// The inclusive bounds `(min, max)`.
    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }
}

/// Sums counts over an ROI and assembles the dense intensity grid.
#[derive(Debug, Clone, Copy)]
pub struct GridReconstructor {
    roi: Roi,
    subtract_background: bool,
}

impl GridReconstructor {
    /// Build a reconstructor for one ROI.
    ///
    /// With `subtract_background` the background-subtracted counts are
    /// integrated instead of the raw counts.
    pub fn new(roi: Roi, subtract_background: bool) -> Self {
        Self {
            roi,
            subtract_background,
        }
    }

    /// Integrated intensity of one spectrum over the ROI.
    ///
    /// A spectrum with no counts, or whose axis never intersects the window,
    /// contributes 0.
    pub fn intensity_of(&self, spectrum: &Spectrum) -> f64 {
        let use_energy_axis = self.roi.axis == RoiAxis::Energy;
        let Some((x_axis, y_counts)) = spectrum.get_data(use_energy_axis, self.subtract_background)
        else {
            return 0.0;
        };
        x_axis
            .iter()
            .zip(&y_counts)
            .filter(|(&x, _)| x >= self.roi.min && x <= self.roi.max)
            .map(|(_, &y)| f64::from(y))
            .sum()
    }

    /// Per-position intensity over the whole collection.
    ///
    /// Spectra sharing a position sum into one value.
    pub fn intensity_map(&self, volume: &TridimensionalSpectrum) -> Vec<(Position, f64)> {
        volume
            .iter()
            .map(|(position, spectra)| {
                let intensity: f64 = spectra.iter().map(|s| self.intensity_of(s)).sum();
                (*position, intensity)
            })
            .collect()
    }

    /// Assemble the dense intensity grid, `None` when the collection is
    /// empty.
    pub fn reconstruct(&self, volume: &TridimensionalSpectrum) -> Option<IntensityGrid> {
        let intensities = self.intensity_map(volume);
        if intensities.is_empty() {
            return None;
        }

        let x_coords = distinct_sorted(intensities.iter().map(|(p, _)| p.x));
        let y_coords = distinct_sorted(intensities.iter().map(|(p, _)| p.y));
        let z_coords = distinct_sorted(intensities.iter().map(|(p, _)| p.z));

        let mut values = Array3::zeros((x_coords.len(), y_coords.len(), z_coords.len()));
        for (position, intensity) in &intensities {
            let ix = axis_index(&x_coords, position.x);
            let iy = axis_index(&y_coords, position.y);
            let iz = axis_index(&z_coords, position.z);
            values[[ix, iy, iz]] = *intensity;
        }
        log::debug!(
            "reconstructed {}x{}x{} intensity grid from {} positions",
            x_coords.len(),
            y_coords.len(),
            z_coords.len(),
            intensities.len()
        );
        Some(IntensityGrid {
            values,
            x_coords,
            y_coords,
            z_coords,
        })
    }
}

/// A dense 3D intensity field with its axis coordinate values.
///
/// `values[[i, j, k]]` is the intensity at physical position
/// `(x_coords[i], y_coords[j], z_coords[k])`.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityGrid {
    /// Per-voxel intensities, shape `(|x|, |y|, |z|)`.
    pub values: Array3<f64>,
    /// Distinct sorted x coordinate values.
    pub x_coords: Vec<f64>,
    /// Distinct sorted y coordinate values.
    pub y_coords: Vec<f64>,
    /// Distinct sorted z coordinate values.
    pub z_coords: Vec<f64>,
}

impl IntensityGrid {
    /// Grid shape as `(|x|, |y|, |z|)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        let shape = self.values.shape();
        (shape[0], shape[1], shape[2])
    }

    /// Intensity at a physical position, `None` when the position is not on
    /// the grid axes.
    pub fn intensity_at(&self, position: &Position) -> Option<f64> {
        let ix = lookup(&self.x_coords, position.x)?;
        let iy = lookup(&self.y_coords, position.y)?;
        let iz = lookup(&self.z_coords, position.z)?;
        Some(self.values[[ix, iy, iz]])
    }
}

fn distinct_sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut coords: Vec<f64> = values.collect();
    coords.sort_by(f64::total_cmp);
    coords.dedup_by(|a, b| a.total_cmp(b).is_eq());
    coords
}

/// Index of `value` in a sorted distinct axis built from the same positions;
/// always present by construction.
fn axis_index(coords: &[f64], value: f64) -> usize {
    coords
        .binary_search_by(|c| c.total_cmp(&value))
        .unwrap_or_else(|i| i)
}

fn lookup(coords: &[f64], value: f64) -> Option<usize> {
    coords.binary_search_by(|c| c.total_cmp(&value)).ok()
}
