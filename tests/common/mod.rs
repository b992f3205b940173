//! Shared fixtures: synthetic single-band GeoTIFFs on a common UTM grid

#![allow(dead_code)]

use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;
use std::path::{Path, PathBuf};

/// UTM zone 21S, covering the Amazon test area
pub const EPSG_UTM_21S: u32 = 32721;

/// 10 m pixels, north-up
pub const GEO_TRANSFORM: [f64; 6] = [600000.0, 10.0, 0.0, 8900000.0, 0.0, -10.0];

/// UTM zone 22S, the neighbouring zone
pub const EPSG_UTM_22S: u32 = 32722;

pub fn epsg_wkt(epsg: u32) -> String {
    SpatialRef::from_epsg(epsg)
        .and_then(|srs| srs.to_wkt())
        .unwrap_or_else(|e| panic!("EPSG:{} should be known to PROJ: {}", epsg, e))
}

pub fn utm_wkt() -> String {
    epsg_wkt(EPSG_UTM_21S)
}

/// Write a single-band GeoTIFF in UTM 21S whose pixel (row, col) is `value(row, col)`
pub fn write_band<T, F>(path: &Path, width: usize, height: usize, geo_transform: [f64; 6], value: F)
where
    T: GdalType + Copy,
    F: Fn(usize, usize) -> T,
{
    write_band_in(path, width, height, geo_transform, EPSG_UTM_21S, value);
}

/// Write a single-band GeoTIFF in the projection `epsg`
pub fn write_band_in<T, F>(
    path: &Path,
    width: usize,
    height: usize,
    geo_transform: [f64; 6],
    epsg: u32,
    value: F,
) where
    T: GdalType + Copy,
    F: Fn(usize, usize) -> T,
{
    let driver = DriverManager::get_driver_by_name("GTiff").expect("GTiff driver");
    let mut dataset = driver
        .create_with_band_type::<T, _>(path, width as isize, height as isize, 1)
        .expect("create band raster");
    dataset.set_geo_transform(&geo_transform).expect("set geotransform");
    dataset.set_projection(&epsg_wkt(epsg)).expect("set projection");

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(value(row, col));
        }
    }

    let mut rasterband = dataset.rasterband(1).expect("band 1");
    rasterband
        .write((0, 0), (width, height), &Buffer::new((width, height), data))
        .expect("write band");
}

/// Write a uint16 band filled with one value
pub fn write_constant_u16(dir: &Path, name: &str, size: usize, value: u16) -> PathBuf {
    let path = dir.join(name);
    write_band::<u16, _>(&path, size, size, GEO_TRANSFORM, |_, _| value);
    path
}

/// The reference deployment: eight uint16 reflectance bands and a float32 NDVI band.
///
/// Spectral band `k` holds `(k + 1) * 1000 + row`, NDVI holds a column ramp in [-1, 1).
pub fn write_reference_bands(dir: &Path, size: usize) {
    for (k, name) in canopy::REFERENCE_BANDS.iter().take(8).enumerate() {
        write_band::<u16, _>(&dir.join(name), size, size, GEO_TRANSFORM, |row, _| {
            ((k + 1) * 1000 + row) as u16
        });
    }
    write_band::<f32, _>(&dir.join(canopy::REFERENCE_BANDS[8]), size, size, GEO_TRANSFORM, |_, col| {
        col as f32 / size as f32 * 2.0 - 1.0
    });
}
