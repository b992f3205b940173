use crate::io::band_reader::raster_data_type;
use crate::types::{
    GeoTransform, Grid, RasterDataType, SpatialProfile, StackError, StackResult, Volume,
};
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use ndarray::{Array3, Axis};
use std::path::Path;

/// Writes f32 volumes as multi-band GeoTIFFs.
///
/// Output is written inside a temporary directory next to the target and
/// renamed into place once GDAL has closed the dataset, so a failed write
/// never leaves a file at the target path.
///
/// The block cache is flushed before the dataset is closed, and the staged
/// file is reopened and its last row read back before the rename. GDAL does
/// not report errors raised while closing a dataset, so a failure that only
/// surfaces inside `GDALClose` and still leaves a readable file is not caught.
pub struct GeoTiffWriter;

impl GeoTiffWriter {
    /// Persist `volume` (channel x height x width) with `profile`'s georeferencing
    pub fn write_volume<P: AsRef<Path>>(
        output_path: P,
        volume: &Volume,
        profile: &SpatialProfile,
    ) -> StackResult<()> {
        let output_path = output_path.as_ref();
        log::info!("Writing {}-band GeoTIFF: {}", volume.len_of(Axis(0)), output_path.display());

        let (channels, height, width) = volume.dim();
        if channels != profile.band_count || (height, width) != profile.shape() {
            return Err(persistence_error(
                output_path,
                format!(
                    "volume shape {:?} does not match profile ({}, {}, {})",
                    volume.dim(),
                    profile.band_count,
                    profile.height,
                    profile.width
                ),
            ));
        }
        if profile.data_type != RasterDataType::Float32 {
            return Err(persistence_error(
                output_path,
                format!("profile data type is {}, only float32 output is supported", profile.data_type),
            ));
        }

        write_atomically(output_path, |temp_path| {
            let driver = DriverManager::get_driver_by_name("GTiff")?;
            let mut dataset = driver.create_with_band_type::<f32, _>(
                temp_path,
                width as isize,
                height as isize,
                channels as isize,
            )?;

            apply_georeferencing(&mut dataset, profile)?;

            for (index, channel) in volume.axis_iter(Axis(0)).enumerate() {
                let mut rasterband = dataset.rasterband(index as isize + 1)?;
                let flat_data: Vec<f32> = channel.iter().copied().collect();
                let buffer = Buffer::new((width, height), flat_data);
                rasterband.write((0, 0), (width, height), &buffer)?;
                rasterband.set_no_data_value(profile.nodata)?;
            }

            dataset.flush_cache();
            drop(dataset);

            verify_staged(temp_path, (channels, height, width))
        })?;

        log::info!("GeoTIFF saved: {} ({}x{}x{})", output_path.display(), channels, height, width);
        Ok(())
    }

    /// Persist a single f32 grid, e.g. a derived NDVI band
    pub fn write_grid<P: AsRef<Path>>(
        output_path: P,
        grid: &Grid,
        profile: &SpatialProfile,
    ) -> StackResult<()> {
        let volume = grid.clone().insert_axis(Axis(0));
        let profile = SpatialProfile {
            band_count: 1,
            data_type: RasterDataType::Float32,
            ..profile.clone()
        };
        Self::write_volume(output_path, &volume, &profile)
    }
}

/// Reads every band of a raster into a volume
pub struct GeoTiffReader;

impl GeoTiffReader {
    /// Load all bands as f32 (channel x height x width); single-band files
    /// yield a volume with one channel
    pub fn read_volume<P: AsRef<Path>>(path: P) -> StackResult<(Volume, SpatialProfile)> {
        let path = path.as_ref();
        let read_error = |reason: String| StackError::BandRead {
            path: path.to_path_buf(),
            reason,
        };

        log::info!("Reading multi-band raster: {}", path.display());

        let dataset = Dataset::open(path).map_err(|e| read_error(e.to_string()))?;
        let band_count = dataset.raster_count() as usize;
        if band_count == 0 {
            return Err(read_error("raster has no bands".to_string()));
        }

        let (width, height) = dataset.raster_size();
        let mut volume = Array3::<f32>::zeros((band_count, height, width));

        let mut data_type = RasterDataType::Other;
        let mut nodata = None;

        for (index, mut channel) in volume.axis_iter_mut(Axis(0)).enumerate() {
            let rasterband = dataset
                .rasterband(index as isize + 1)
                .map_err(|e| read_error(e.to_string()))?;
            if index == 0 {
                data_type = raster_data_type(rasterband.band_type());
                nodata = rasterband.no_data_value();
            }

            let buffer = rasterband
                .read_as::<f32>((0, 0), (width, height), (width, height), None)
                .map_err(|e| read_error(e.to_string()))?;
            let band = Grid::from_shape_vec((height, width), buffer.data)
                .map_err(|e| read_error(format!("failed to reshape band {}: {}", index + 1, e)))?;
            channel.assign(&band);
        }

        let geo_transform = dataset
            .geo_transform()
            .map(GeoTransform::from_gdal)
            .unwrap_or_default();

        let profile = SpatialProfile {
            width,
            height,
            crs_wkt: dataset.projection(),
            geo_transform,
            data_type,
            nodata,
            band_count,
        };

        log::debug!("Loaded volume shape: {:?}", volume.dim());
        Ok((volume, profile))
    }

    /// Read only the spatial profile of a raster
    pub fn read_profile<P: AsRef<Path>>(path: P) -> StackResult<SpatialProfile> {
        let path = path.as_ref();
        let dataset = Dataset::open(path).map_err(|e| StackError::BandRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count() as usize;
        let (data_type, nodata) = if band_count > 0 {
            let rasterband = dataset.rasterband(1)?;
            (raster_data_type(rasterband.band_type()), rasterband.no_data_value())
        } else {
            (RasterDataType::Other, None)
        };

        Ok(SpatialProfile {
            width,
            height,
            crs_wkt: dataset.projection(),
            geo_transform: dataset
                .geo_transform()
                .map(GeoTransform::from_gdal)
                .unwrap_or_default(),
            data_type,
            nodata,
            band_count,
        })
    }
}

fn apply_georeferencing(dataset: &mut Dataset, profile: &SpatialProfile) -> gdal::errors::Result<()> {
    dataset.set_geo_transform(&profile.geo_transform.to_gdal())?;
    if !profile.crs_wkt.is_empty() {
        dataset.set_projection(&profile.crs_wkt)?;
    }
    Ok(())
}

/// Reopen a closed raster and read its last row to confirm it is complete
fn verify_staged(path: &Path, shape: (usize, usize, usize)) -> StackResult<()> {
    let (channels, height, width) = shape;
    let incomplete = |reason: String| StackError::Persistence {
        path: path.to_path_buf(),
        reason,
    };

    let dataset = Dataset::open(path).map_err(|e| incomplete(format!("staged file unreadable: {}", e)))?;
    let written = (dataset.raster_count() as usize, dataset.raster_size());
    if written != (channels, (width, height)) {
        return Err(incomplete(format!(
            "staged file has {} bands of {:?}, expected {} bands of {:?}",
            written.0,
            written.1,
            channels,
            (width, height)
        )));
    }

    if channels > 0 && height > 0 {
        dataset
            .rasterband(channels as isize)
            .and_then(|band| band.read_as::<f32>((0, height as isize - 1), (width, 1), (width, 1), None))
            .map_err(|e| incomplete(format!("staged file is truncated: {}", e)))?;
    }

    Ok(())
}

/// Run `write` against a temporary path, then move the result onto `output_path`
fn write_atomically<F>(output_path: &Path, write: F) -> StackResult<()>
where
    F: FnOnce(&Path) -> StackResult<()>,
{
    let parent = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = output_path
        .file_name()
        .ok_or_else(|| persistence_error(output_path, "output path has no file name".to_string()))?;

    let staging = tempfile::Builder::new()
        .prefix(".canopy-")
        .tempdir_in(parent)
        .map_err(|e| persistence_error(output_path, format!("cannot create staging directory: {}", e)))?;
    let temp_path = staging.path().join(file_name);

    // The dataset is closed inside `write`
    write(&temp_path).map_err(|e| persistence_error(output_path, e.to_string()))?;

    std::fs::rename(&temp_path, output_path)
        .map_err(|e| persistence_error(output_path, format!("cannot finalize output: {}", e)))?;

    Ok(())
}

fn persistence_error(path: &Path, reason: String) -> StackError {
    StackError::Persistence {
        path: path.to_path_buf(),
        reason,
    }
}
