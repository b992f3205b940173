//! I/O modules for reading band rasters and writing stacks

pub mod band_reader;
pub mod geotiff;

pub use band_reader::{BandCollector, read_band};
pub use geotiff::{GeoTiffReader, GeoTiffWriter};
