//! Python bindings for bitshard via PyO3.
//!
//! Exposes the `BinaryIndex` class and the `backend_info()` function in a
//! `_bitshard` Python module.

use pyo3::exceptions::{PyFileNotFoundError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyInt, PyList, PyString};
use std::path::PathBuf;

use bitshard_core::backend::BackendContext;
use bitshard_core::config;
use bitshard_core::document::Record;
use bitshard_core::engine::BackendInfo;
use bitshard_core::search::SearchResult;
use bitshard_core::EngineError;

// ---------------------------------------------------------------------------
// Helper: EngineError → Python exception
// ---------------------------------------------------------------------------

fn engine_err(e: EngineError) -> PyErr {
    match e {
        EngineError::ShapeMismatch { .. }
        | EngineError::DimensionMismatch { .. }
        | EngineError::InvalidArgument(_) => PyValueError::new_err(e.to_string()),
        EngineError::CorpusNotFound { .. } => PyFileNotFoundError::new_err(e.to_string()),
        EngineError::NotLoaded | EngineError::CorpusCorrupt { .. } | EngineError::Io(_) => {
            PyRuntimeError::new_err(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Helper: serde_json::Value ↔ Python object
// ---------------------------------------------------------------------------

fn json_to_py(py: Python<'_>, value: &serde_json::Value) -> PyResult<PyObject> {
    use serde_json::Value;
    Ok(match value {
        Value::Null => py.None(),
        Value::Bool(b) => (*b).into_pyobject(py)?.to_owned().into_any().unbind(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into_pyobject(py)?.into_any().unbind()
            } else if let Some(u) = n.as_u64() {
                u.into_pyobject(py)?.into_any().unbind()
            } else {
                n.as_f64()
                    .unwrap_or(f64::NAN)
                    .into_pyobject(py)?
                    .into_any()
                    .unbind()
            }
        }
        Value::String(s) => s.into_pyobject(py)?.into_any().unbind(),
        Value::Array(items) => {
            let converted = items
                .iter()
                .map(|item| json_to_py(py, item))
                .collect::<PyResult<Vec<_>>>()?;
            PyList::new(py, converted)?.into_any().unbind()
        }
        Value::Object(map) => {
            let dict = PyDict::new(py);
            for (k, v) in map {
                dict.set_item(k, json_to_py(py, v)?)?;
            }
            dict.into_any().unbind()
        }
    })
}

fn py_to_json(obj: &Bound<'_, PyAny>) -> PyResult<serde_json::Value> {
    if obj.is_none() {
        return Ok(serde_json::Value::Null);
    }
    // Order matters: bool before int (Python bool is a subclass of int)
    if obj.is_instance_of::<PyBool>() {
        return Ok(serde_json::Value::Bool(obj.extract::<bool>()?));
    }
    if obj.is_instance_of::<PyInt>() {
        let i: i64 = obj.extract()?;
        return Ok(serde_json::Value::Number(i.into()));
    }
    if obj.is_instance_of::<PyFloat>() {
        let f: f64 = obj.extract()?;
        return Ok(serde_json::json!(f));
    }
    if obj.is_instance_of::<PyString>() {
        return Ok(serde_json::Value::String(obj.extract::<String>()?));
    }
    if let Ok(list) = obj.downcast::<PyList>() {
        return list
            .iter()
            .map(|item| py_to_json(&item))
            .collect::<PyResult<Vec<_>>>()
            .map(serde_json::Value::Array);
    }
    if let Ok(dict) = obj.downcast::<PyDict>() {
        return py_dict_to_record(dict).map(|r| serde_json::Value::Object(r.fields));
    }
    Err(PyValueError::new_err(
        "metadata values must be None, bool, int, float, str, list, or dict",
    ))
}

fn py_dict_to_record(dict: &Bound<'_, PyDict>) -> PyResult<Record> {
    let mut fields = serde_json::Map::new();
    for (key, value) in dict.iter() {
        let k: String = key.extract()?;
        fields.insert(k, py_to_json(&value)?);
    }
    Ok(Record::new(fields))
}

fn to_py<T: serde::Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    let json = serde_json::to_value(value).map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
    json_to_py(py, &json)
}

fn results_to_py(py: Python<'_>, results: &[SearchResult]) -> PyResult<Vec<PyObject>> {
    results.iter().map(|r| to_py(py, r)).collect()
}

// ---------------------------------------------------------------------------
// BinaryIndex
// ---------------------------------------------------------------------------

/// Binary-quantized index over one corpus shard.
///
///     index = BinaryIndex(vector_dim=384)
///     index.load("shard_0.bqv", "shard_0_meta.json")
///     hits = index.search(query, k=10)
#[pyclass(name = "BinaryIndex")]
struct PyBinaryIndex {
    index: bitshard_core::BinaryIndex,
}

#[pymethods]
impl PyBinaryIndex {
    #[new]
    #[pyo3(signature = (vector_dim=config::DEFAULT_DIMENSION, use_native=true))]
    fn new(vector_dim: usize, use_native: bool) -> Self {
        Self {
            index: bitshard_core::BinaryIndex::new(
                BackendContext::from_preference(use_native),
                vector_dim,
            ),
        }
    }

    /// Load packed vectors (.bqv or uint8 .npy) and their metadata JSON.
    ///
    /// Returns the number of vectors loaded. A failed load keeps the previous corpus.
    fn load(&self, py: Python<'_>, vectors_path: PathBuf, metadata_path: PathBuf) -> PyResult<usize> {
        py.allow_threads(|| self.index.load(&vectors_path, &metadata_path))
            .map_err(engine_err)
    }

    /// Top-k records for one query embedding, as dicts, nearest first.
    #[pyo3(signature = (query, k=config::DEFAULT_K))]
    fn search(&self, py: Python<'_>, query: Vec<f32>, k: usize) -> PyResult<Vec<PyObject>> {
        let results = py
            .allow_threads(|| self.index.search(&query, k))
            .map_err(engine_err)?;
        results_to_py(py, &results)
    }

    /// Runs `search` for every query against the same corpus snapshot.
    #[pyo3(signature = (queries, k=config::DEFAULT_K))]
    fn search_batch(
        &self,
        py: Python<'_>,
        queries: Vec<Vec<f32>>,
        k: usize,
    ) -> PyResult<Vec<Vec<PyObject>>> {
        let batches = py
            .allow_threads(|| self.index.search_batch(&queries, k))
            .map_err(engine_err)?;
        batches.iter().map(|r| results_to_py(py, r)).collect()
    }

    fn get_stats(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_py(py, &self.index.stats())
    }

    /// Pack float embeddings, write both artifacts, and serve the result.
    ///
    /// Returns the build report (rows, dimension, row width, compression ratio).
    fn build_and_save(
        &self,
        py: Python<'_>,
        vectors: Vec<Vec<f32>>,
        metadata: &Bound<'_, PyList>,
        vectors_path: PathBuf,
        metadata_path: PathBuf,
    ) -> PyResult<PyObject> {
        let records = metadata
            .iter()
            .map(|item| {
                let dict = item
                    .downcast::<PyDict>()
                    .map_err(|_| PyValueError::new_err("metadata entries must be dicts"))?;
                py_dict_to_record(dict)
            })
            .collect::<PyResult<Vec<_>>>()?;
        let report = py
            .allow_threads(|| {
                self.index
                    .build_and_save(&vectors, records, &vectors_path, &metadata_path)
            })
            .map_err(engine_err)?;
        to_py(py, &report)
    }

    #[getter]
    fn num_vectors(&self) -> usize {
        self.index.len()
    }

    #[getter]
    fn backend(&self) -> &'static str {
        self.index.backend().backend_name()
    }

    fn __len__(&self) -> usize {
        self.index.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "BinaryIndex(vectors={}, dim={}, backend='{}')",
            self.index.len(),
            self.index.dimension(),
            self.index.backend().backend_name()
        )
    }
}

/// Host SIMD capability and the backend a new index would use.
#[pyfunction]
fn backend_info(py: Python<'_>) -> PyResult<PyObject> {
    to_py(py, &BackendInfo::from_context(&BackendContext::detect()))
}

#[pymodule]
fn _bitshard(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyBinaryIndex>()?;
    m.add_function(wrap_pyfunction!(backend_info, m)?)?;
    Ok(())
}
