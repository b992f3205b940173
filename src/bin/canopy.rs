use anyhow::{Context, Result};
use canopy::config::PipelineConfig;
use canopy::core::NdviCalculator;
use canopy::io::GeoTiffReader;
use canopy::pipeline;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
enum Command {
    /// Stack single-band rasters into one multi-band GeoTIFF
    Stack {
        /// Directory holding one raster per band
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Output GeoTIFF
        #[arg(long)]
        output: Option<PathBuf>,

        /// JSON pipeline configuration (band order, nodata, ...)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Nodata sentinel for every output band
        #[arg(long)]
        nodata: Option<f64>,
    },

    /// Derive an NDVI band from NIR and red rasters
    Ndvi {
        #[arg(long)]
        nir: PathBuf,

        #[arg(long)]
        red: PathBuf,

        #[arg(long)]
        output: PathBuf,
    },

    /// Print the spatial profile of a raster
    Inspect {
        path: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Band stacking for deforestation segmentation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Stack { input_dir, output, config, nodata } => {
            let mut pipeline_config = match config {
                Some(path) => PipelineConfig::from_json_file(&path)
                    .with_context(|| format!("loading configuration {}", path.display()))?,
                None => PipelineConfig::default(),
            };
            if let Some(input_dir) = input_dir {
                pipeline_config.input_dir = input_dir;
            }
            if let Some(output) = output {
                pipeline_config.output_path = output;
            }
            if let Some(nodata) = nodata {
                pipeline_config.nodata = nodata;
            }

            let (volume, _) = pipeline::stack_bands(&pipeline_config)?;
            info!(
                "Created {}-band GeoTIFF: {}",
                volume.dim().0,
                pipeline_config.output_path.display()
            );
            info!("Final shape: {:?}", volume.dim());
        }
        Command::Ndvi { nir, red, output } => {
            let (ndvi, _) = NdviCalculator::new().compute_file(&nir, &red, &output)?;
            info!("NDVI written to {} ({:?})", output.display(), ndvi.dim());
        }
        Command::Inspect { path } => {
            let profile = GeoTiffReader::read_profile(&path)?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
    }

    Ok(())
}
