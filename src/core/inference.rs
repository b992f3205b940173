//! Inference adapter: validates a volume against the model's input contract,
//! normalizes it and turns the raw model outputs into a mask and a score.

use crate::types::{StackError, StackResult, Volume};
use ndarray::{Array1, Array2, Array4, ArrayView3, ArrayView4, Axis};

/// Raw outputs of a segmentation model for one batch
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// Per-pixel class scores (batch x classes x height x width)
    pub segmentation: Array4<f32>,
    /// Auxiliary per-pixel class scores, same layout as `segmentation`
    pub auxiliary: Array4<f32>,
    /// One global score per batch element
    pub global_score: Array1<f32>,
}

/// A loaded segmentation model.
///
/// Implementations must not change their parameters during `predict`.
pub trait SegmentationModel {
    /// Run the model on a normalized batch (batch x channels x height x width)
    fn predict(&self, input: ArrayView4<'_, f32>) -> StackResult<ModelOutput>;
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for &M {
    fn predict(&self, input: ArrayView4<'_, f32>) -> StackResult<ModelOutput> {
        (**self).predict(input)
    }
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for Box<M> {
    fn predict(&self, input: ArrayView4<'_, f32>) -> StackResult<ModelOutput> {
        (**self).predict(input)
    }
}

/// How the model's global output is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalScore {
    /// Already a probability in [0, 1]
    Probability,
    /// Raw logit; a sigmoid is applied
    Logit,
}

/// Inference parameters
#[derive(Debug, Clone)]
pub struct InferenceParams {
    /// Channel count the model was trained with
    pub expected_channels: usize,
    /// Class whose probability map becomes the mask
    pub foreground_class: usize,
    pub global_score: GlobalScore,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            expected_channels: 9,
            foreground_class: 1, // class 0 = intact, class 1 = deforested
            global_score: GlobalScore::Probability,
        }
    }
}

/// Mask and global prediction for one volume
#[derive(Debug, Clone)]
pub struct InferenceResult {
    /// Foreground probability per pixel (height x width), values in [0, 1]
    pub mask: Array2<f32>,
    /// Probability that the scene as a whole is foreground
    pub global_probability: f32,
}

impl InferenceResult {
    /// Quantize the mask to 0..=255 for display
    pub fn mask_to_u8(&self) -> Array2<u8> {
        self.mask.mapv(|p| (p.clamp(0.0, 1.0) * 255.0) as u8)
    }
}

/// Feeds volumes to an injected segmentation model
pub struct InferenceAdapter<M> {
    model: M,
    params: InferenceParams,
}

impl<M: SegmentationModel> InferenceAdapter<M> {
    /// Create an adapter for the reference nine-channel model
    pub fn new(model: M) -> Self {
        Self::with_params(model, InferenceParams::default())
    }

    pub fn with_params(model: M, params: InferenceParams) -> Self {
        Self { model, params }
    }

    pub fn params(&self) -> &InferenceParams {
        &self.params
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Validate, normalize and run the model on `volume` (channels x height x width)
    pub fn infer(&self, volume: &Volume) -> StackResult<InferenceResult> {
        let channels = volume.len_of(Axis(0));
        if channels != self.params.expected_channels {
            return Err(StackError::ChannelMismatch {
                expected: self.params.expected_channels,
                actual: channels,
            });
        }

        let normalized = normalize_global_max(volume)?;
        let batch = normalized.insert_axis(Axis(0));

        log::info!("Running segmentation model on input {:?}", batch.dim());
        let output = self.model.predict(batch.view())?;
        log::debug!(
            "Model output: segmentation {:?}, auxiliary {:?}, global {:?}",
            output.segmentation.dim(),
            output.auxiliary.dim(),
            output.global_score.dim()
        );

        let (_, height, width) = volume.dim();
        self.interpret(output, (height, width))
    }

    fn interpret(&self, output: ModelOutput, shape: (usize, usize)) -> StackResult<InferenceResult> {
        let (batch, classes, height, width) = output.segmentation.dim();
        if batch != 1 {
            return Err(StackError::Model(format!("expected batch size 1, got {}", batch)));
        }
        if (height, width) != shape {
            return Err(StackError::Model(format!(
                "segmentation covers {:?}, input covers {:?}",
                (height, width),
                shape
            )));
        }
        if classes <= self.params.foreground_class {
            return Err(StackError::Model(format!(
                "segmentation has {} classes, foreground class is {}",
                classes, self.params.foreground_class
            )));
        }

        let raw_global = output
            .global_score
            .iter()
            .next()
            .copied()
            .ok_or_else(|| StackError::Model("global score is empty".to_string()))?;
        let global_probability = match self.params.global_score {
            GlobalScore::Probability => raw_global,
            GlobalScore::Logit => sigmoid(raw_global),
        };
        if !global_probability.is_finite() || !(0.0..=1.0).contains(&global_probability) {
            return Err(StackError::Model(format!(
                "global probability {} is outside [0, 1]",
                global_probability
            )));
        }

        let probabilities = softmax_classes(output.segmentation.index_axis(Axis(0), 0))?;
        let mask = probabilities.index_axis(Axis(0), self.params.foreground_class).to_owned();

        log::info!("Global probability: {:.4}", global_probability);
        Ok(InferenceResult {
            mask,
            global_probability,
        })
    }
}

/// Divide the whole volume by its global maximum
pub fn normalize_global_max(volume: &Volume) -> StackResult<Volume> {
    if let Some(value) = volume.iter().find(|v| !v.is_finite()) {
        return Err(StackError::DegenerateInput(format!("volume contains non-finite value {}", value)));
    }

    let max = volume.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    log::debug!("Normalization divisor: {}", max);

    if volume.is_empty() {
        return Err(StackError::DegenerateInput("volume is empty, cannot normalize".to_string()));
    }
    // A non-positive divisor cannot map the volume onto a maximum of 1
    if max <= 0.0 {
        return Err(StackError::DegenerateInput(format!(
            "normalization divisor {} is not positive",
            max
        )));
    }

    Ok(volume.mapv(|v| v / max))
}

/// Numerically stable softmax across the class axis (classes x height x width)
pub fn softmax_classes(scores: ArrayView3<'_, f32>) -> StackResult<ndarray::Array3<f32>> {
    if scores.iter().any(|v| !v.is_finite()) {
        return Err(StackError::Model("segmentation scores contain non-finite values".to_string()));
    }

    let mut probabilities = scores.to_owned();
    for mut pixel in probabilities.lanes_mut(Axis(0)) {
        let max = pixel.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        pixel.mapv_inplace(|v| (v - max).exp());
        let sum: f32 = pixel.sum();
        pixel.mapv_inplace(|v| v / sum);
    }

    Ok(probabilities)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
