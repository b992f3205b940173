//! Python bindings used by the interactive front end

use crate::config::{BandConfig, PipelineConfig};
use crate::core::{InferenceAdapter, InferenceParams, ModelOutput, SegmentationModel};
use crate::io::{BandCollector, GeoTiffReader};
use crate::pipeline;
use crate::types::{SpatialProfile, StackError, StackResult};
use ndarray::{ArrayView4, Axis};
use numpy::{IntoPyArray, PyReadonlyArray1, PyReadonlyArray3, PyReadonlyArray4, ToPyArray};
use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::path::PathBuf;

/// Errors reach Python with their message unchanged
fn to_py_err(e: StackError) -> PyErr {
    PyErr::new::<PyRuntimeError, _>(format!("{}", e))
}

fn profile_to_dict<'py>(py: Python<'py>, profile: &SpatialProfile) -> PyResult<&'py PyDict> {
    let dict = PyDict::new(py);
    dict.set_item("width", profile.width)?;
    dict.set_item("height", profile.height)?;
    dict.set_item("count", profile.band_count)?;
    dict.set_item("crs", profile.crs_wkt.clone())?;
    dict.set_item("transform", profile.geo_transform.to_gdal().to_vec())?;
    dict.set_item("dtype", profile.data_type.to_string())?;
    dict.set_item("nodata", profile.nodata)?;
    Ok(dict)
}

/// Model implemented by a Python callable.
///
/// The callable receives a float32 array (1, C, H, W) and returns a dict with
/// float32 arrays under "segmentation", "auxiliary" and "global".
struct PyModel {
    callable: PyObject,
}

impl PyModel {
    fn call(&self, py: Python<'_>, input: ArrayView4<'_, f32>) -> PyResult<ModelOutput> {
        let outputs = self.callable.call1(py, (input.to_pyarray(py),))?;
        let outputs = outputs.as_ref(py);

        let segmentation: PyReadonlyArray4<f32> = outputs.get_item("segmentation")?.extract()?;
        let auxiliary: PyReadonlyArray4<f32> = outputs.get_item("auxiliary")?.extract()?;
        let global_score: PyReadonlyArray1<f32> = outputs.get_item("global")?.extract()?;

        Ok(ModelOutput {
            segmentation: segmentation.as_array().to_owned(),
            auxiliary: auxiliary.as_array().to_owned(),
            global_score: global_score.as_array().to_owned(),
        })
    }
}

impl SegmentationModel for PyModel {
    fn predict(&self, input: ArrayView4<'_, f32>) -> StackResult<ModelOutput> {
        Python::with_gil(|py| self.call(py, input)).map_err(|e| StackError::Model(e.to_string()))
    }
}

/// Read bands from a directory in the given order; returns (volume, profile)
#[pyfunction]
#[pyo3(signature = (directory, band_names=None))]
fn collect_bands(
    py: Python,
    directory: PathBuf,
    band_names: Option<Vec<String>>,
) -> PyResult<PyObject> {
    let bands = band_names.map(BandConfig::new).unwrap_or_default();

    let (grids, profile) = BandCollector::new()
        .collect(&directory, bands.names())
        .map_err(to_py_err)?;
    let views: Vec<_> = grids.iter().map(|grid| grid.view()).collect();
    let volume = ndarray::stack(Axis(0), &views)
        .map_err(|e| PyErr::new::<PyRuntimeError, _>(format!("Failed to stack bands: {}", e)))?;

    let result = PyDict::new(py);
    result.set_item("data", volume.into_pyarray(py))?;
    result.set_item("profile", profile_to_dict(py, &profile)?)?;
    Ok(result.into())
}

/// Collect, assemble and write a stack; returns the output profile
#[pyfunction]
#[pyo3(signature = (input_dir, output_path, band_names=None, nodata=0.0))]
fn stack_bands(
    py: Python,
    input_dir: PathBuf,
    output_path: PathBuf,
    band_names: Option<Vec<String>>,
    nodata: f64,
) -> PyResult<PyObject> {
    let config = PipelineConfig {
        input_dir,
        output_path,
        bands: band_names.map(BandConfig::new).unwrap_or_default(),
        nodata,
        ..PipelineConfig::default()
    };

    let (_, profile) = pipeline::stack_bands(&config).map_err(to_py_err)?;
    Ok(profile_to_dict(py, &profile)?.into())
}

/// Load every band of a raster as a float32 (C, H, W) array
#[pyfunction]
fn read_stack(py: Python, path: PathBuf) -> PyResult<PyObject> {
    let (volume, profile) = GeoTiffReader::read_volume(&path).map_err(to_py_err)?;

    let result = PyDict::new(py);
    result.set_item("data", volume.into_pyarray(py))?;
    result.set_item("profile", profile_to_dict(py, &profile)?)?;
    Ok(result.into())
}

/// Run `model` on a (C, H, W) volume; returns (mask, global_probability)
#[pyfunction]
#[pyo3(signature = (volume, model, expected_channels=9, foreground_class=1))]
fn run_inference(
    py: Python,
    volume: PyReadonlyArray3<f32>,
    model: PyObject,
    expected_channels: usize,
    foreground_class: usize,
) -> PyResult<(PyObject, f32)> {
    let volume = volume.as_array().to_owned();
    let adapter = InferenceAdapter::with_params(
        PyModel { callable: model },
        InferenceParams {
            expected_channels,
            foreground_class,
            ..InferenceParams::default()
        },
    );

    let result = adapter.infer(&volume).map_err(to_py_err)?;
    Ok((result.mask.into_pyarray(py).into(), result.global_probability))
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(collect_bands, m)?)?;
    m.add_function(wrap_pyfunction!(stack_bands, m)?)?;
    m.add_function(wrap_pyfunction!(read_stack, m)?)?;
    m.add_function(wrap_pyfunction!(run_inference, m)?)?;
    Ok(())
}
