//! Core stacking and inference modules

pub mod stack;
pub mod inference;
pub mod ndvi;

// Re-export main types
pub use stack::{StackAssembler, StackParams, stack_grids, output_profile};
pub use inference::{
    InferenceAdapter, InferenceParams, InferenceResult, ModelOutput, SegmentationModel,
    GlobalScore, normalize_global_max, softmax_classes,
};
pub use ndvi::NdviCalculator;
