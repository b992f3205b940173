use crate::io::band_reader::read_band;
use crate::io::GeoTiffWriter;
use crate::types::{Grid, SpatialProfile, StackError, StackResult};
use ndarray::Zip;
use std::path::Path;

/// Normalized Difference Vegetation Index calculator
#[derive(Debug, Clone)]
pub struct NdviCalculator {
    /// Value written where NDVI is undefined (nir + red == 0 or non-finite input)
    fill_value: f32,
}

impl NdviCalculator {
    /// Fill undefined pixels with 0, the stack nodata sentinel
    pub fn new() -> Self {
        Self { fill_value: 0.0 }
    }

    pub fn with_fill_value(fill_value: f32) -> Self {
        Self { fill_value }
    }

    /// NDVI = (NIR - Red) / (NIR + Red), clamped to [-1, 1]
    pub fn compute(&self, nir: &Grid, red: &Grid) -> StackResult<Grid> {
        if nir.dim() != red.dim() {
            return Err(StackError::ShapeMismatch {
                expected: nir.dim(),
                actual: red.dim(),
            });
        }

        let fill_value = self.fill_value;
        let mut ndvi = Grid::zeros(nir.dim());

        Zip::from(&mut ndvi)
            .and(nir)
            .and(red)
            .par_for_each(|out, &nir, &red| {
                let sum = nir + red;
                *out = if !nir.is_finite() || !red.is_finite() || sum == 0.0 {
                    fill_value
                } else {
                    ((nir - red) / sum).clamp(-1.0, 1.0)
                };
            });

        let undefined = ndvi.iter().filter(|&&v| v == fill_value).count();
        log::debug!("NDVI computed for {:?}, {} pixels at fill value", ndvi.dim(), undefined);

        Ok(ndvi)
    }

    /// Derive an NDVI band from NIR and red rasters and write it as float32.
    ///
    /// The two inputs must share one grid; the output inherits it.
    pub fn compute_file<P, Q, R>(&self, nir_path: P, red_path: Q, output_path: R) -> StackResult<(Grid, SpatialProfile)>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        R: AsRef<Path>,
    {
        log::info!(
            "Computing NDVI from NIR {} and red {}",
            nir_path.as_ref().display(),
            red_path.as_ref().display()
        );

        let (nir, nir_profile) = read_band(nir_path.as_ref())?;
        let (red, red_profile) = read_band(red_path.as_ref())?;

        if !nir_profile.same_grid(&red_profile) {
            return Err(StackError::BandRead {
                path: red_path.as_ref().to_path_buf(),
                reason: format!("grid differs from NIR band {}", nir_path.as_ref().display()),
            });
        }

        let ndvi = self.compute(&nir, &red)?;
        let profile = SpatialProfile {
            nodata: Some(self.fill_value as f64),
            ..nir_profile
        };
        GeoTiffWriter::write_grid(output_path, &ndvi, &profile)?;

        Ok((ndvi, profile))
    }
}

impl Default for NdviCalculator {
    fn default() -> Self {
        Self::new()
    }
}
