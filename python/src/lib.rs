//! PyO3 bindings for the ResField linear layer.
//!
//! Tensors cross the boundary as flat row-major lists plus an explicit shape.
//! No Python-side math. All computation happens in Rust.

use pyo3::prelude::*;
use pyo3::exceptions::PyValueError;
use pyo3::types::PyDict;

use resfields_core::{
    LayerConfig, ResFieldError, ResFieldLinear as RustLayer, TemporalMode, Tensor, TimeQuery,
};

fn to_py_err(e: ResFieldError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

// ── ResFieldLinear ───────────────────────────────────────────────────

#[pyclass]
struct ResFieldLinear {
    inner: RustLayer,
}

#[pymethods]
impl ResFieldLinear {
    #[new]
    #[pyo3(signature = (in_features, out_features, bias=true, rank=0, capacity=0, mode="lookup", seed=0))]
    fn new(
        in_features: usize,
        out_features: usize,
        bias: bool,
        rank: usize,
        capacity: usize,
        mode: &str,
        seed: u64,
    ) -> PyResult<Self> {
        let mode: TemporalMode = mode.parse().map_err(to_py_err)?;
        let cfg = LayerConfig::new(in_features, out_features)
            .with_bias(bias)
            .with_temporal(rank, capacity)
            .with_mode(mode);
        let inner = RustLayer::new(cfg, seed).map_err(to_py_err)?;
        Ok(ResFieldLinear { inner })
    }

    /// Forward on a flat (B, S, in_features) buffer. Returns flat (B, S, out_features).
    #[pyo3(signature = (input, shape, time_value=None, frame_id=None))]
    fn forward(
        &self,
        input: Vec<f32>,
        shape: (usize, usize, usize),
        time_value: Option<Vec<f32>>,
        frame_id: Option<Vec<i64>>,
    ) -> PyResult<Vec<f32>> {
        let x = Tensor::from_vec(input, &[shape.0, shape.1, shape.2]).map_err(to_py_err)?;
        let query = TimeQuery {
            time_value: time_value.as_deref(),
            frame_id: frame_id.as_deref(),
        };
        let y = self.inner.forward(&x, query).map_err(to_py_err)?;
        Ok(y.data)
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }

    fn num_params(&self) -> usize {
        self.inner.num_params()
    }

    #[getter]
    fn is_temporal(&self) -> bool {
        self.inner.is_temporal()
    }

    /// Return all parameter buffers as a dict of flat lists.
    /// Keys: "weight", "bias", "weights_t", "matrix_t".
    fn get_weights<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let p = self.inner.params();
        let dict = PyDict::new(py);
        dict.set_item("weight", p.base_weight.clone())?;
        dict.set_item("bias", p.bias.clone())?;
        dict.set_item("weights_t", p.factor_u.clone())?;
        dict.set_item("matrix_t", p.factor_v.clone())?;
        Ok(dict)
    }

    /// Overwrite one parameter buffer. Length must match the current buffer.
    fn set_weight(&mut self, name: &str, values: Vec<f32>) -> PyResult<()> {
        let p = self.inner.params_mut();
        let buf = match name {
            "weight" => &mut p.base_weight,
            "bias" => &mut p.bias,
            "weights_t" => &mut p.factor_u,
            "matrix_t" => &mut p.factor_v,
            other => return Err(PyValueError::new_err(format!("unknown parameter `{other}`"))),
        };
        if buf.len() != values.len() {
            return Err(PyValueError::new_err(format!(
                "`{name}` has {} elements, got {}", buf.len(), values.len()
            )));
        }
        *buf = values;
        Ok(())
    }
}

// ── Module ───────────────────────────────────────────────────────────

#[pymodule]
fn resfields(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ResFieldLinear>()?;
    Ok(())
}
