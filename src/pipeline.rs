//! End-to-end runs: band directory -> persisted stack -> model outputs

use crate::config::PipelineConfig;
use crate::core::{InferenceAdapter, InferenceParams, InferenceResult, SegmentationModel, StackAssembler, StackParams};
use crate::io::BandCollector;
use crate::types::{SpatialProfile, StackResult, Volume};

/// Collect the configured bands, assemble them and write the stack to
/// `config.output_path`
pub fn stack_bands(config: &PipelineConfig) -> StackResult<(Volume, SpatialProfile)> {
    config.validate()?;
    log::info!(
        "Stacking {} bands from {} into {}",
        config.bands.len(),
        config.input_dir.display(),
        config.output_path.display()
    );

    let collector = BandCollector::with_extensions(&config.raster_extensions);
    let (grids, reference) = collector.collect(&config.input_dir, config.bands.names())?;

    let assembler = StackAssembler::with_params(StackParams {
        channel_count: config.bands.len(),
        nodata: config.nodata,
    });
    assembler.assemble_to_file(&grids, &reference, &config.output_path)
}

/// Stack the configured bands and run `model` on the result
pub fn stack_and_infer<M: SegmentationModel>(
    config: &PipelineConfig,
    model: M,
) -> StackResult<(Volume, SpatialProfile, InferenceResult)> {
    let (volume, profile) = stack_bands(config)?;

    let adapter = InferenceAdapter::with_params(
        model,
        InferenceParams {
            expected_channels: config.expected_channels,
            foreground_class: config.foreground_class,
            ..InferenceParams::default()
        },
    );
    let result = adapter.infer(&volume)?;

    Ok((volume, profile, result))
}
