use crate::io::GeoTiffWriter;
use crate::types::{Grid, RasterDataType, SpatialProfile, StackError, StackResult, Volume};
use ndarray::{Array3, Axis};
use std::path::Path;

/// Stacking parameters
#[derive(Debug, Clone, PartialEq)]
pub struct StackParams {
    /// Number of grids the stack must contain
    pub channel_count: usize,
    /// Nodata sentinel recorded on every output band
    pub nodata: f64,
}

impl Default for StackParams {
    fn default() -> Self {
        Self {
            channel_count: 9, // 4 bands before + 4 bands after + NDVI
            nodata: 0.0,
        }
    }
}

/// Combines per-band grids into one channel-ordered volume
pub struct StackAssembler {
    params: StackParams,
}

impl StackAssembler {
    /// Create an assembler for the reference nine-channel layout
    pub fn new() -> Self {
        Self {
            params: StackParams::default(),
        }
    }

    pub fn with_params(params: StackParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &StackParams {
        &self.params
    }

    /// Stack `grids` in the given order and derive the output profile
    pub fn assemble(
        &self,
        grids: &[Grid],
        reference: &SpatialProfile,
    ) -> StackResult<(Volume, SpatialProfile)> {
        let volume = stack_grids(grids, reference, self.params.channel_count)?;
        let profile = output_profile(reference, self.params.channel_count, self.params.nodata);
        Ok((volume, profile))
    }

    /// Stack and persist as a single multi-band raster
    pub fn assemble_to_file<P: AsRef<Path>>(
        &self,
        grids: &[Grid],
        reference: &SpatialProfile,
        output_path: P,
    ) -> StackResult<(Volume, SpatialProfile)> {
        let (volume, profile) = self.assemble(grids, reference)?;
        GeoTiffWriter::write_volume(output_path, &volume, &profile)?;
        Ok((volume, profile))
    }
}

impl Default for StackAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Stack grids along a new leading channel axis, keeping input order.
///
/// Every grid must have the reference shape (height, width).
pub fn stack_grids(
    grids: &[Grid],
    reference: &SpatialProfile,
    channel_count: usize,
) -> StackResult<Volume> {
    if grids.len() != channel_count {
        return Err(StackError::ChannelCount {
            expected: channel_count,
            actual: grids.len(),
        });
    }

    let shape = reference.shape();
    if let Some(grid) = grids.iter().find(|grid| grid.dim() != shape) {
        return Err(StackError::ShapeMismatch {
            expected: shape,
            actual: grid.dim(),
        });
    }

    let mut volume = Array3::<f32>::zeros((channel_count, shape.0, shape.1));
    for (mut channel, grid) in volume.axis_iter_mut(Axis(0)).zip(grids) {
        channel.assign(grid);
    }

    log::info!("Stacked volume shape: {:?}", volume.dim());
    Ok(volume)
}

/// Derive the stack profile: spatial fields pass through, band count,
/// data type and nodata are set for the combined raster
pub fn output_profile(reference: &SpatialProfile, channel_count: usize, nodata: f64) -> SpatialProfile {
    SpatialProfile {
        band_count: channel_count,
        data_type: RasterDataType::Float32,
        nodata: Some(nodata),
        ..reference.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;

    fn reference_profile(width: usize, height: usize) -> SpatialProfile {
        SpatialProfile {
            width,
            height,
            crs_wkt: "PROJCS[\"WGS 84 / UTM zone 22S\"]".to_string(),
            geo_transform: GeoTransform::from_gdal([300000.0, 10.0, 0.0, 9000000.0, 0.0, -10.0]),
            data_type: RasterDataType::UInt16,
            nodata: None,
            band_count: 1,
        }
    }

    #[test]
    fn test_channel_order_is_input_order() {
        // Descending constants so a sorted stack would be detectable
        let values = [9.0f32, 3.0, 7.0, 1.0];
        let grids: Vec<Grid> = values.iter().map(|&v| Grid::from_elem((2, 3), v)).collect();

        let assembler = StackAssembler::with_params(StackParams {
            channel_count: 4,
            nodata: 0.0,
        });
        let (volume, _) = assembler.assemble(&grids, &reference_profile(3, 2)).unwrap();

        assert_eq!(volume.dim(), (4, 2, 3));
        for (index, &value) in values.iter().enumerate() {
            assert!(volume.index_axis(Axis(0), index).iter().all(|&v| v == value));
        }
    }

    #[test]
    fn test_duplicate_grids_are_kept() {
        let grids = vec![Grid::from_elem((2, 2), 5.0); 3];
        let volume = stack_grids(&grids, &reference_profile(2, 2), 3).unwrap();
        assert_eq!(volume.dim(), (3, 2, 2));
    }

    #[test]
    fn test_channel_count_error() {
        let grids = vec![Grid::zeros((2, 2)); 8];
        match StackAssembler::new().assemble(&grids, &reference_profile(2, 2)) {
            Err(StackError::ChannelCount { expected, actual }) => {
                assert_eq!(expected, 9);
                assert_eq!(actual, 8);
            }
            other => panic!("expected ChannelCount, got {:?}", other),
        }
    }

    #[test]
    fn test_shape_mismatch_error() {
        let grids = vec![Grid::zeros((2, 2)), Grid::zeros((3, 2))];
        let result = stack_grids(&grids, &reference_profile(2, 2), 2);
        assert!(matches!(
            result,
            Err(StackError::ShapeMismatch { expected: (2, 2), actual: (3, 2) })
        ));
    }

    #[test]
    fn test_output_profile_overrides() {
        let reference = reference_profile(256, 256);
        let profile = output_profile(&reference, 9, 0.0);

        assert_eq!(profile.band_count, 9);
        assert_eq!(profile.data_type, RasterDataType::Float32);
        assert_eq!(profile.nodata, Some(0.0));
        assert!(profile.same_grid(&reference));
    }
}
