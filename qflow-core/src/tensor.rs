//! Interface-tagged numeric arrays
//!
//! Every parameter and every numeric result in qflow is a [`Tensor`]: an
//! n-dimensional real or complex array that remembers which numeric
//! [`Interface`] owns it and whether it is flagged as trainable. The pipeline
//! never differentiates anything itself; it only has to carry these tags
//! through rewrites and restore them after execution.

use crate::{QuantumError, Result};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Zip};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric/autodiff backend that owns an array
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interface {
    /// Plain numeric arrays with no autodiff tracking
    #[default]
    Numpy,
    /// NumPy-compatible autodiff arrays
    Autograd,
    /// JAX arrays
    Jax,
    /// PyTorch tensors
    Torch,
    /// TensorFlow tensors
    Tensorflow,
}

impl Interface {
    /// Whether this is the plain numeric interface
    #[inline]
    pub fn is_plain(self) -> bool {
        self == Interface::Numpy
    }

    /// Interface of a group of values
    ///
    /// The first value decides for the whole group; an empty group is plain.
    /// Mixed groups are not reconciled.
    pub fn of<'a>(values: impl IntoIterator<Item = &'a Tensor>) -> Interface {
        values
            .into_iter()
            .next()
            .map(|t| t.interface())
            .unwrap_or_default()
    }

    /// Short lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Interface::Numpy => "numpy",
            Interface::Autograd => "autograd",
            Interface::Jax => "jax",
            Interface::Torch => "torch",
            Interface::Tensorflow => "tensorflow",
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Raw array payload
#[derive(Clone, Debug, PartialEq)]
pub enum TensorData {
    Real(ArrayD<f64>),
    Complex(ArrayD<Complex64>),
}

impl TensorData {
    fn shape(&self) -> &[usize] {
        match self {
            TensorData::Real(a) => a.shape(),
            TensorData::Complex(a) => a.shape(),
        }
    }

    fn to_complex(&self) -> ArrayD<Complex64> {
        match self {
            TensorData::Real(a) => a.mapv(|v| Complex64::new(v, 0.0)),
            TensorData::Complex(a) => a.clone(),
        }
    }
}

/// An interface-tagged n-dimensional array
///
/// # Example
/// ```
/// use qflow_core::{Interface, Tensor};
///
/// let x = Tensor::from_vec(vec![0.1, 0.2, 0.3]).with_interface(Interface::Torch);
/// assert_eq!(x.shape(), &[3]);
///
/// let first = x.index_axis0(0).unwrap();
/// assert_eq!(first.as_scalar(), Some(0.1));
/// assert_eq!(first.interface(), Interface::Torch);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    data: TensorData,
    interface: Interface,
    requires_grad: bool,
}

impl Tensor {
    /// Real array in the plain interface
    pub fn from_real(array: ArrayD<f64>) -> Self {
        Self {
            data: TensorData::Real(array),
            interface: Interface::Numpy,
            requires_grad: false,
        }
    }

    /// Complex array in the plain interface
    pub fn from_complex(array: ArrayD<Complex64>) -> Self {
        Self {
            data: TensorData::Complex(array),
            interface: Interface::Numpy,
            requires_grad: false,
        }
    }

    /// Zero-dimensional real value
    pub fn scalar(value: f64) -> Self {
        Self::from_real(ArrayD::from_elem(IxDyn(&[]), value))
    }

    /// One-dimensional real array
    pub fn from_vec(values: Vec<f64>) -> Self {
        let n = values.len();
        // A vector always fits a 1-D shape of its own length
        Self::from_real(ArrayD::from_shape_vec(IxDyn(&[n]), values).unwrap_or_default())
    }

    /// Same values tagged with another interface
    #[must_use]
    pub fn with_interface(mut self, interface: Interface) -> Self {
        self.interface = interface;
        self
    }

    /// Same values with the trainability flag set
    #[must_use]
    pub fn with_requires_grad(mut self, requires_grad: bool) -> Self {
        self.requires_grad = requires_grad;
        self
    }

    #[inline]
    pub fn interface(&self) -> Interface {
        self.interface
    }

    #[inline]
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    #[inline]
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complex(&self) -> bool {
        matches!(self.data, TensorData::Complex(_))
    }

    /// Real payload, if the tensor is real
    pub fn as_real(&self) -> Option<&ArrayD<f64>> {
        match &self.data {
            TensorData::Real(a) => Some(a),
            TensorData::Complex(_) => None,
        }
    }

    /// Value of a real zero-dimensional tensor
    pub fn as_scalar(&self) -> Option<f64> {
        match &self.data {
            TensorData::Real(a) if a.ndim() == 0 => a.iter().next().copied(),
            _ => None,
        }
    }

    /// Plain-interface copy with autodiff tracking stripped
    pub fn unwrap(&self) -> Tensor {
        Tensor {
            data: self.data.clone(),
            interface: Interface::Numpy,
            requires_grad: false,
        }
    }

    /// Slice `index` along the leading dimension
    ///
    /// # Errors
    /// Returns error if the tensor is zero-dimensional or `index` is out of range
    pub fn index_axis0(&self, index: usize) -> Result<Tensor> {
        let leading = match self.shape().first() {
            Some(&n) => n,
            None => {
                return Err(QuantumError::shape_mismatch(
                    "cannot slice a zero-dimensional tensor",
                ))
            }
        };
        if index >= leading {
            return Err(QuantumError::shape_mismatch(format!(
                "index {} out of range for leading dimension {}",
                index, leading
            )));
        }
        let data = match &self.data {
            TensorData::Real(a) => TensorData::Real(a.index_axis(Axis(0), index).to_owned()),
            TensorData::Complex(a) => {
                TensorData::Complex(a.index_axis(Axis(0), index).to_owned())
            }
        };
        Ok(Tensor {
            data,
            interface: self.interface,
            requires_grad: self.requires_grad,
        })
    }

    /// Stack tensors of identical shape along a new leading axis
    ///
    /// Real and complex inputs are promoted to complex. The result takes the
    /// interface of the first input and is trainable if any input is.
    ///
    /// # Errors
    /// Returns error if `items` is empty or the shapes differ
    pub fn stack(items: &[Tensor]) -> Result<Tensor> {
        let first = items
            .first()
            .ok_or_else(|| QuantumError::shape_mismatch("cannot stack an empty sequence"))?;
        if let Some(bad) = items.iter().find(|t| t.shape() != first.shape()) {
            return Err(QuantumError::shape_mismatch(format!(
                "cannot stack shapes {:?} and {:?}",
                first.shape(),
                bad.shape()
            )));
        }

        let stack_err = |e: ndarray::ShapeError| QuantumError::shape_mismatch(e.to_string());
        let data = if items.iter().any(Tensor::is_complex) {
            let owned: Vec<ArrayD<Complex64>> = items.iter().map(|t| t.data.to_complex()).collect();
            let views: Vec<ArrayViewD<'_, Complex64>> = owned.iter().map(|a| a.view()).collect();
            TensorData::Complex(ndarray::stack(Axis(0), &views).map_err(stack_err)?)
        } else {
            let views: Vec<ArrayViewD<'_, f64>> = items
                .iter()
                .filter_map(|t| t.as_real().map(|a| a.view()))
                .collect();
            TensorData::Real(ndarray::stack(Axis(0), &views).map_err(stack_err)?)
        };

        Ok(Tensor {
            data,
            interface: first.interface,
            requires_grad: items.iter().any(|t| t.requires_grad),
        })
    }

    /// Remove every axis of length one
    pub fn squeeze(&self) -> Result<Tensor> {
        let shape: Vec<usize> = self.shape().iter().copied().filter(|&d| d != 1).collect();
        let reshape_err = |e: ndarray::ShapeError| QuantumError::shape_mismatch(e.to_string());
        let data = match &self.data {
            TensorData::Real(a) => TensorData::Real(
                a.as_standard_layout()
                    .into_owned()
                    .into_shape(IxDyn(&shape))
                    .map_err(reshape_err)?,
            ),
            TensorData::Complex(a) => TensorData::Complex(
                a.as_standard_layout()
                    .into_owned()
                    .into_shape(IxDyn(&shape))
                    .map_err(reshape_err)?,
            ),
        };
        Ok(Tensor {
            data,
            interface: self.interface,
            requires_grad: self.requires_grad,
        })
    }

    /// Element-wise `|a - b| <= atol + rtol * |b|` over identical shapes
    ///
    /// Tensors of different shape are never close.
    pub fn allclose(&self, other: &Tensor, rtol: f64, atol: f64) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        match (&self.data, &other.data) {
            (TensorData::Real(a), TensorData::Real(b)) => {
                Zip::from(a).and(b).all(|&x, &y| (x - y).abs() <= atol + rtol * y.abs())
            }
            _ => {
                let a = self.data.to_complex();
                let b = other.data.to_complex();
                Zip::from(&a)
                    .and(&b)
                    .all(|x, y| (x - y).norm() <= atol + rtol * y.norm())
            }
        }
    }

    /// Exact element-wise equality over identical shapes, ignoring tags
    pub fn all_equal(&self, other: &Tensor) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        match (&self.data, &other.data) {
            (TensorData::Real(a), TensorData::Real(b)) => a == b,
            _ => self.data.to_complex() == other.data.to_complex(),
        }
    }
}

impl From<f64> for Tensor {
    fn from(value: f64) -> Self {
        Tensor::scalar(value)
    }
}

impl From<Vec<f64>> for Tensor {
    fn from(values: Vec<f64>) -> Self {
        Tensor::from_vec(values)
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            TensorData::Real(a) if a.ndim() == 0 => write!(f, "{}", a.iter().next().copied().unwrap_or_default())?,
            TensorData::Real(a) => write!(f, "{}", a)?,
            TensorData::Complex(a) => write!(f, "{}", a)?,
        }
        if !self.interface.is_plain() {
            write!(f, " ({})", self.interface)?;
        }
        Ok(())
    }
}
