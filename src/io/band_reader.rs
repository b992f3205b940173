use crate::config::BandConfig;
use crate::types::{
    BandSource, GeoTransform, Grid, RasterDataType, SpatialProfile, StackError, StackResult,
};
use gdal::raster::GdalDataType;
use gdal::Dataset;
use ndarray::Array2;
use std::path::Path;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Reads ordered single-band rasters into grids sharing one reference profile
pub struct BandCollector {
    raster_extensions: Vec<String>,
}

impl BandCollector {
    /// Create a collector that counts `.tif`/`.tiff` files during preflight
    pub fn new() -> Self {
        Self::with_extensions(["tif", "tiff"])
    }

    /// Create a collector with custom raster file extensions
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            raster_extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Count regular files in `directory` that carry a raster extension
    pub fn count_raster_files<P: AsRef<Path>>(&self, directory: P) -> StackResult<usize> {
        let mut count = 0;
        for entry in std::fs::read_dir(directory.as_ref())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let is_raster = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| self.raster_extensions.contains(&ext.to_lowercase()))
                .unwrap_or(false);
            if is_raster {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Fail fast when the directory holds fewer rasters than the band list needs.
    ///
    /// Returns the number of raster files found.
    pub fn preflight<P: AsRef<Path>>(&self, directory: P, required: usize) -> StackResult<usize> {
        let directory = directory.as_ref();

        // A missing directory holds no bands; any other listing failure keeps its cause
        let found = match self.count_raster_files(directory) {
            Ok(found) => found,
            Err(StackError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(StackError::Io(e)) => {
                return Err(StackError::Io(std::io::Error::new(
                    e.kind(),
                    format!("cannot list {}: {}", directory.display(), e),
                )));
            }
            Err(e) => return Err(e),
        };

        log::debug!("Preflight: {} raster files in {}, {} required", found, directory.display(), required);

        if found < required {
            return Err(StackError::MissingInput {
                directory: directory.to_path_buf(),
                found,
                required,
            });
        }

        Ok(found)
    }

    /// Preflight `directory`, then read `band_names` from it in declared order
    pub fn collect<P, S>(&self, directory: P, band_names: &[S]) -> StackResult<(Vec<Grid>, SpatialProfile)>
    where
        P: AsRef<Path>,
        S: AsRef<str>,
    {
        let bands = BandConfig::new(band_names.iter().map(|name| name.as_ref().to_string()));
        bands.validate()?;

        self.preflight(directory.as_ref(), bands.len())?;
        let sources = bands.resolve(directory.as_ref())?;

        self.collect_sources(&sources)
    }

    /// Read already-resolved band sources.
    ///
    /// Grid `i` of the result belongs to `sources[i]`. The profile is captured
    /// from the first source; every other band must share its grid.
    pub fn collect_sources(&self, sources: &[BandSource]) -> StackResult<(Vec<Grid>, SpatialProfile)> {
        if sources.is_empty() {
            return Err(StackError::Config("no band sources to collect".to_string()));
        }
        for (index, source) in sources.iter().enumerate() {
            if source.channel != index {
                return Err(StackError::Config(format!(
                    "band {} declares channel {} but is listed at position {}",
                    source.name, source.channel, index
                )));
            }
        }

        log::info!("Collecting {} bands", sources.len());

        // Parallel reads land in index-addressed slots; checks below run in declared order
        #[cfg(feature = "parallel")]
        let reads: Vec<StackResult<(Grid, SpatialProfile)>> =
            sources.par_iter().map(|source| read_band(&source.path)).collect();
        #[cfg(feature = "parallel")]
        let reads = reads.into_iter();

        #[cfg(not(feature = "parallel"))]
        let reads = sources.iter().map(|source| read_band(&source.path));

        let mut grids = Vec::with_capacity(sources.len());
        let mut reference: Option<SpatialProfile> = None;

        for (source, read) in sources.iter().zip(reads) {
            let (grid, profile) = read?;

            match &reference {
                None => {
                    log::debug!(
                        "Reference profile from {}: {}x{} {} nodata={:?}",
                        source.name, profile.width, profile.height, profile.data_type, profile.nodata
                    );
                    reference = Some(profile);
                }
                Some(reference) => check_against_reference(source, &profile, reference, &sources[0])?,
            }

            grids.push(grid);
        }

        let reference = reference.ok_or_else(|| StackError::Config("no bands were read".to_string()))?;
        log::info!("Collected {} bands of {}x{}", grids.len(), reference.width, reference.height);

        Ok((grids, reference))
    }
}

impl Default for BandCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn check_against_reference(
    source: &BandSource,
    profile: &SpatialProfile,
    reference: &SpatialProfile,
    reference_source: &BandSource,
) -> StackResult<()> {
    let mismatch = |reason: String| StackError::BandRead {
        path: source.path.clone(),
        reason,
    };

    if profile.shape() != reference.shape() {
        return Err(mismatch(format!(
            "grid shape {:?} differs from {:?} of {}",
            profile.shape(),
            reference.shape(),
            reference_source.path.display()
        )));
    }
    if profile.crs_wkt != reference.crs_wkt {
        return Err(mismatch(format!(
            "coordinate reference system differs from {}",
            reference_source.path.display()
        )));
    }
    if profile.geo_transform != reference.geo_transform {
        return Err(mismatch(format!(
            "geotransform {:?} differs from {:?} of {}",
            profile.geo_transform.to_gdal(),
            reference.geo_transform.to_gdal(),
            reference_source.path.display()
        )));
    }

    Ok(())
}

/// Read band 1 of a raster as f32 together with its spatial profile
pub fn read_band<P: AsRef<Path>>(path: P) -> StackResult<(Grid, SpatialProfile)> {
    let path = path.as_ref();
    let band_error = |reason: String| StackError::BandRead {
        path: path.to_path_buf(),
        reason,
    };

    log::debug!("Reading band from: {}", path.display());

    let dataset = Dataset::open(path).map_err(|e| band_error(e.to_string()))?;

    let band_count = dataset.raster_count();
    if band_count < 1 {
        return Err(band_error("raster has no bands".to_string()));
    }
    if band_count > 1 {
        log::warn!("{} has {} bands, only band 1 is read", path.display(), band_count);
    }

    let (width, height) = dataset.raster_size();
    let geo_transform = match dataset.geo_transform() {
        Ok(gt) => GeoTransform::from_gdal(gt),
        Err(e) => {
            log::debug!("No geotransform in {} ({}), using identity", path.display(), e);
            GeoTransform::default()
        }
    };

    let rasterband = dataset.rasterband(1).map_err(|e| band_error(e.to_string()))?;
    let data_type = raster_data_type(rasterband.band_type());
    let nodata = rasterband.no_data_value();

    let buffer = rasterband
        .read_as::<f32>((0, 0), (width, height), (width, height), None)
        .map_err(|e| band_error(e.to_string()))?;

    let grid = Array2::from_shape_vec((height, width), buffer.data)
        .map_err(|e| band_error(format!("failed to reshape band data: {}", e)))?;

    let profile = SpatialProfile {
        width,
        height,
        crs_wkt: dataset.projection(),
        geo_transform,
        data_type,
        nodata,
        band_count: 1,
    };

    Ok((grid, profile))
}

pub(crate) fn raster_data_type(band_type: GdalDataType) -> RasterDataType {
    match band_type {
        GdalDataType::UInt8 => RasterDataType::UInt8,
        GdalDataType::UInt16 => RasterDataType::UInt16,
        GdalDataType::Int16 => RasterDataType::Int16,
        GdalDataType::UInt32 => RasterDataType::UInt32,
        GdalDataType::Int32 => RasterDataType::Int32,
        GdalDataType::Float32 => RasterDataType::Float32,
        GdalDataType::Float64 => RasterDataType::Float64,
        _ => RasterDataType::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_counts_only_raster_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.tif"), b"").unwrap();
        std::fs::write(dir.path().join("b.TIFF"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("c.tif")).unwrap();

        let collector = BandCollector::new();
        assert_eq!(collector.count_raster_files(dir.path()).unwrap(), 2);
        assert_eq!(collector.preflight(dir.path(), 2).unwrap(), 2);

        match collector.preflight(dir.path(), 3) {
            Err(StackError::MissingInput { found, required, .. }) => {
                assert_eq!(found, 2);
                assert_eq!(required, 3);
            }
            other => panic!("expected MissingInput, got {:?}", other),
        }
    }

    #[test]
    fn test_preflight_missing_directory_reports_zero() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does_not_exist");

        let result = BandCollector::new().preflight(&missing, 1);
        assert!(matches!(result, Err(StackError::MissingInput { found: 0, required: 1, .. })));
    }

    #[test]
    fn test_preflight_unlistable_directory_keeps_cause() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_directory = dir.path().join("band.tif");
        std::fs::write(&not_a_directory, b"").unwrap();

        match BandCollector::new().preflight(&not_a_directory, 1) {
            Err(StackError::Io(e)) => {
                assert!(e.to_string().contains("cannot list"));
                assert!(e.to_string().contains("band.tif"));
            }
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jp2"), b"").unwrap();
        std::fs::write(dir.path().join("b.tif"), b"").unwrap();

        let collector = BandCollector::with_extensions([".jp2"]);
        assert_eq!(collector.count_raster_files(dir.path()).unwrap(), 1);
    }

    #[test]
    fn test_collect_sources_rejects_out_of_order_channels() {
        let sources = vec![BandSource {
            name: "b.tif".to_string(),
            path: "/nonexistent/b.tif".into(),
            channel: 3,
        }];

        assert!(matches!(
            BandCollector::new().collect_sources(&sources),
            Err(StackError::Config(_))
        ));
    }
}
