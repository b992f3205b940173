//! Pipeline configuration: the ordered band list and run parameters

use crate::types::{BandSource, StackError, StackResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Band order the segmentation model was trained on: B2, B3, B4, B8 before
/// and after the event, then NDVI as the ninth channel.
pub const REFERENCE_BANDS: [&str; 9] = [
    "before_B2.tif",
    "before_B3.tif",
    "before_B4.tif",
    "before_B8.tif",
    "after_B2.tif",
    "after_B3.tif",
    "after_B4.tif",
    "after_B8.tif",
    "ndvi_band.tif",
];

/// Ordered list of band file names; list position is the channel index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BandConfig {
    names: Vec<String>,
}

impl BandConfig {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Reject empty lists and repeated names
    pub fn validate(&self) -> StackResult<()> {
        if self.names.is_empty() {
            return Err(StackError::Config("band list is empty".to_string()));
        }

        // Repeated names are allowed and read into separate channels
        if self.names.iter().any(|name| name.trim().is_empty()) {
            return Err(StackError::Config("band list contains an empty name".to_string()));
        }

        Ok(())
    }

    /// Resolve names against a directory, keeping declared order
    pub fn resolve<P: AsRef<Path>>(&self, directory: P) -> StackResult<Vec<BandSource>> {
        self.validate()?;

        Ok(self
            .names
            .iter()
            .enumerate()
            .map(|(channel, name)| BandSource {
                name: name.clone(),
                path: directory.as_ref().join(name),
                channel,
            })
            .collect())
    }
}

impl Default for BandConfig {
    fn default() -> Self {
        Self::new(REFERENCE_BANDS)
    }
}

/// Full configuration for a stacking + inference run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding one single-band raster per band name
    pub input_dir: PathBuf,
    /// Destination of the assembled multi-band raster
    pub output_path: PathBuf,
    pub bands: BandConfig,
    /// Nodata sentinel written to every output band
    pub nodata: f64,
    /// Channel count the model accepts
    pub expected_channels: usize,
    /// Class index whose probability becomes the mask
    pub foreground_class: usize,
    /// File extensions counted by the preflight check (case-insensitive)
    pub raster_extensions: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./deployment_data/input_bands"),
            output_path: PathBuf::from("./deployment_data/final_9band_patch.tif"),
            bands: BandConfig::default(),
            nodata: 0.0,
            expected_channels: 9,
            foreground_class: 1,
            raster_extensions: vec!["tif".to_string(), "tiff".to_string()],
        }
    }
}

impl PipelineConfig {
    /// Load a JSON configuration; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> StackResult<Self> {
        log::info!("Loading pipeline configuration from: {}", path.as_ref().display());

        let content = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&content).map_err(|e| {
            StackError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StackResult<()> {
        self.bands.validate()?;

        if self.expected_channels == 0 {
            return Err(StackError::Config("expected_channels must be positive".to_string()));
        }
        if self.raster_extensions.is_empty() {
            return Err(StackError::Config("raster_extensions is empty".to_string()));
        }

        Ok(())
    }

    /// Band sources in declared order
    pub fn band_sources(&self) -> StackResult<Vec<BandSource>> {
        self.bands.resolve(&self.input_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_band_order() {
        let bands = BandConfig::default();
        assert_eq!(bands.len(), 9);
        assert_eq!(bands.names()[0], "before_B2.tif");
        assert_eq!(bands.names()[8], "ndvi_band.tif");
    }

    #[test]
    fn test_resolve_keeps_declared_order() {
        let bands = BandConfig::new(["zeta.tif", "alpha.tif", "mid.tif"]);
        let sources = bands.resolve("/data").unwrap();

        let names: Vec<_> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta.tif", "alpha.tif", "mid.tif"]);
        assert_eq!(sources[1].path, PathBuf::from("/data/alpha.tif"));
        assert_eq!(sources[2].channel, 2);
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        assert!(matches!(
            BandConfig::new(Vec::<String>::new()).validate(),
            Err(StackError::Config(_))
        ));
        assert!(matches!(
            BandConfig::new(["a.tif", " "]).validate(),
            Err(StackError::Config(_))
        ));
    }

    #[test]
    fn test_repeated_band_resolves_to_separate_channels() {
        let bands = BandConfig::new(["a.tif", "b.tif", "a.tif"]);
        assert!(bands.validate().is_ok());

        let sources = bands.resolve("/data").unwrap();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].path, sources[2].path);
        assert_eq!(sources[2].channel, 2);
    }

    #[test]
    fn test_pipeline_config_partial_json() {
        let json = r#"{ "input_dir": "/tmp/bands", "bands": ["b1.tif", "b2.tif"], "expected_channels": 2 }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.input_dir, PathBuf::from("/tmp/bands"));
        assert_eq!(config.bands.len(), 2);
        assert_eq!(config.expected_channels, 2);
        assert_eq!(config.nodata, 0.0);
        assert_eq!(config.foreground_class, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_file_rejects_zero_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{ "expected_channels": 0 }"#).unwrap();

        assert!(matches!(
            PipelineConfig::from_json_file(&path),
            Err(StackError::Config(_))
        ));
    }
}
