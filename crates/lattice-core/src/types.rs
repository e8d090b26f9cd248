//! Core value types: element dtypes, literal scalars, attributes and host tensors.

use crate::broadcast::{broadcast_index, broadcast_shape};
use crate::{Error, Result};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Element data type.
///
/// Only `F32` is materialized by the host tensor; the quantized and reduced
/// precision types appear in dtype configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    F32,
    F16,
    I32,
    I64,
    Bool,
    /// Unsigned 8-bit affine quantized.
    QUInt8,
    /// Signed 8-bit affine quantized.
    QInt8,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            DataType::F32 | DataType::I32 => 4,
            DataType::F16 => 2,
            DataType::I64 => 8,
            DataType::Bool | DataType::QUInt8 | DataType::QInt8 => 1,
        }
    }

    pub fn is_quantized(&self) -> bool {
        matches!(self, DataType::QUInt8 | DataType::QInt8)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::F32 => "float32",
            DataType::F16 => "float16",
            DataType::I32 => "int32",
            DataType::I64 => "int64",
            DataType::Bool => "bool",
            DataType::QUInt8 => "quint8",
            DataType::QInt8 => "qint8",
        };
        f.write_str(name)
    }
}

/// A host-side literal passed directly to an operator.
///
/// Scalars are never promoted to tensors: an operator overload that takes a
/// true scalar is selected differently from one taking a 0-dim tensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl Scalar {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::Float(v) => v,
            Scalar::Int(v) => v as f64,
            Scalar::Bool(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn as_f32(&self) -> f32 {
        self.as_f64() as f32
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Named node attribute recorded at trace time (e.g. `dim`, `chunks`).
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Float(f64),
    Int(i64),
    String(String),
    Floats(Vec<f64>),
    Ints(Vec<i64>),
}

// ──────────────────────────────── Tensor ─────────────────────────────────

#[derive(Debug)]
struct Storage {
    shape: Vec<usize>,
    data: Vec<f32>,
}

/// A dense row-major f32 host tensor.
///
/// `Tensor` is cheap to clone: the storage is `Arc`-shared, so a clone is
/// the *same* value, not a copy. [`Tensor::same_storage`] observes that
/// identity, which is how aliased graph outputs are checked.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: Arc<Storage>,
}

impl Tensor {
    /// Create a tensor from flat data and a shape.
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::Shape(format!(
                "Data length {} does not match shape {shape:?} (expected {expected})",
                data.len()
            )));
        }
        Ok(Self {
            storage: Arc::new(Storage {
                shape: shape.to_vec(),
                data,
            }),
        })
    }

    /// Create a tensor filled with `value`.
    pub fn full(shape: &[usize], value: f32) -> Self {
        let numel = shape.iter().product();
        Self {
            storage: Arc::new(Storage {
                shape: shape.to_vec(),
                data: vec![value; numel],
            }),
        }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    /// Sample a tensor from the standard normal distribution.
    pub fn randn<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        let numel: usize = shape.iter().product();
        let data = (0..numel).map(|_| rng.sample(StandardNormal)).collect();
        Self {
            storage: Arc::new(Storage {
                shape: shape.to_vec(),
                data,
            }),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.storage.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.storage.data
    }

    pub fn numel(&self) -> usize {
        self.storage.data.len()
    }

    pub fn ndim(&self) -> usize {
        self.storage.shape.len()
    }

    pub fn dtype(&self) -> DataType {
        DataType::F32
    }

    /// Whether two handles refer to the same underlying value.
    pub fn same_storage(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Elementwise closeness with `rtol = 1e-5`, `atol = 1e-8`.
    pub fn allclose(&self, other: &Tensor) -> bool {
        self.allclose_with(other, 1e-5, 1e-8)
    }

    /// `|a - b| <= atol + rtol * |b|` for every element, and equal shapes.
    pub fn allclose_with(&self, other: &Tensor, rtol: f32, atol: f32) -> bool {
        self.shape() == other.shape()
            && self
                .data()
                .iter()
                .zip(other.data())
                .all(|(&a, &b)| (a - b).abs() <= atol + rtol * b.abs())
    }

    /// Apply `f` to every element.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        Tensor {
            storage: Arc::new(Storage {
                shape: self.shape().to_vec(),
                data: self.data().iter().map(|&v| f(v)).collect(),
            }),
        }
    }

    /// Combine two tensors elementwise with NumPy-style broadcasting.
    pub fn zip_with(&self, other: &Tensor, f: impl Fn(f32, f32) -> f32) -> Result<Tensor> {
        let out_shape = broadcast_shape(self.shape(), other.shape())?;
        let numel: usize = out_shape.iter().product();

        let lhs = self.data();
        let rhs = other.data();
        let data = (0..numel)
            .map(|i| {
                let a = lhs[broadcast_index(i, &out_shape, self.shape())];
                let b = rhs[broadcast_index(i, &out_shape, other.shape())];
                f(a, b)
            })
            .collect();

        Tensor::from_vec(data, &out_shape)
    }

    /// Split along dimension 0 into `chunks` pieces.
    ///
    /// Every chunk but the last has `ceil(len / chunks)` rows; like the
    /// eager library, fewer chunks are returned when the rows run out.
    pub fn chunk(&self, chunks: usize) -> Result<Vec<Tensor>> {
        if chunks == 0 {
            return Err(Error::Shape("chunk expects chunks > 0".to_string()));
        }
        let Some((&rows, rest)) = self.shape().split_first() else {
            return Err(Error::Shape(
                "chunk expects at least one dimension".to_string(),
            ));
        };

        let row_len: usize = rest.iter().product();
        let step = rows.div_ceil(chunks).max(1);
        let mut pieces = Vec::new();
        let mut start = 0;
        while start < rows {
            let end = (start + step).min(rows);
            let mut shape = vec![end - start];
            shape.extend_from_slice(rest);
            let data = self.data()[start * row_len..end * row_len].to_vec();
            pieces.push(Tensor::from_vec(data, &shape)?);
            start = end;
        }
        Ok(pieces)
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor(shape={:?}, data={:?})", self.shape(), self.data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Tensor::from_vec(vec![1.0, 2.0, 3.0], &[2, 2]).is_err());
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(t.numel(), 4);
        assert_eq!(t.ndim(), 2);
    }

    #[test]
    fn test_clone_shares_storage() {
        let a = Tensor::full(&[2, 3], 1.0);
        let b = a.clone();
        let c = Tensor::full(&[2, 3], 1.0);

        assert!(a.same_storage(&b));
        assert!(!a.same_storage(&c));
        assert!(a.allclose(&c));
    }

    #[test]
    fn test_randn_is_seeded() {
        let a = Tensor::randn(&[2, 3], &mut StdRng::seed_from_u64(7));
        let b = Tensor::randn(&[2, 3], &mut StdRng::seed_from_u64(7));
        assert_eq!(a.data(), b.data());
        assert_eq!(a.shape(), &[2, 3]);
    }

    #[test]
    fn test_zip_with_broadcast() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let b = Tensor::from_vec(vec![10.0, 20.0, 30.0], &[3]).unwrap();
        let c = a.zip_with(&b, |x, y| x + y).unwrap();
        assert_eq!(c.shape(), &[2, 3]);
        assert_eq!(c.data(), &[11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);
    }

    #[test]
    fn test_allclose_shape_mismatch() {
        let a = Tensor::zeros(&[2, 3]);
        let b = Tensor::zeros(&[3, 2]);
        assert!(!a.allclose(&b));
    }

    #[test]
    fn test_chunk_rows() {
        let a = Tensor::from_vec((0..6).map(|v| v as f32).collect(), &[2, 3]).unwrap();
        let pieces = a.chunk(2).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].shape(), &[1, 3]);
        assert_eq!(pieces[1].data(), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_scalar_conversion() {
        assert_eq!(Scalar::Int(5).as_f32(), 5.0);
        assert_eq!(Scalar::Bool(true).as_f64(), 1.0);
        assert_eq!(Scalar::from(2.5).to_string(), "2.5");
    }
}
