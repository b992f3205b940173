//! Canopy: multi-band raster stacking for deforestation segmentation
//!
//! Assembles single-band rasters (Sentinel-2 bands before and after an event
//! plus an NDVI band) into one spatially aligned float32 stack, validates it
//! against the segmentation model's channel contract and turns the model's
//! raw outputs into a per-pixel deforestation mask and a global probability.

pub mod types;
pub mod config;
pub mod io;
pub mod core;
pub mod pipeline;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    BandSource, GeoTransform, Grid, RasterDataType, SpatialProfile, StackError, StackResult, Volume,
};
pub use config::{BandConfig, PipelineConfig, REFERENCE_BANDS};
pub use io::{BandCollector, GeoTiffReader, GeoTiffWriter};
pub use core::{
    InferenceAdapter, InferenceParams, InferenceResult, ModelOutput, NdviCalculator,
    SegmentationModel, StackAssembler, StackParams,
};
