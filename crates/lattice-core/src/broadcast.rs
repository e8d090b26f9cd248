//! Broadcasting helpers for elementwise kernels.

use crate::{Error, Result};

/// Compute NumPy-style broadcast output shape from two input shapes.
///
/// - Shapes are aligned from the rightmost dimension
/// - Dimensions match if they are equal or one of them is 1
/// - Missing dimensions in shorter shapes are treated as 1
///
/// ```text
/// broadcast_shape(&[2, 3], &[3])       -> [2, 3]
/// broadcast_shape(&[2, 1], &[1, 3])    -> [2, 3]
/// broadcast_shape(&[], &[2, 3])        -> [2, 3]
/// ```
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut result = Vec::with_capacity(rank);

    for i in 0..rank {
        let da = dim_from_right(a, rank, i);
        let db = dim_from_right(b, rank, i);

        match (da, db) {
            (x, y) if x == y => result.push(x),
            (1, y) => result.push(y),
            (x, 1) => result.push(x),
            _ => {
                return Err(Error::Shape(format!(
                    "Cannot broadcast shapes {a:?} and {b:?} at dimension {i}"
                )));
            }
        }
    }

    Ok(result)
}

fn dim_from_right(shape: &[usize], rank: usize, i: usize) -> usize {
    let offset = rank - shape.len();
    if i < offset { 1 } else { shape[i - offset] }
}

/// Map a flat index in the broadcast `out_shape` back to a flat index into
/// a tensor of `shape`.
pub(crate) fn broadcast_index(flat: usize, out_shape: &[usize], shape: &[usize]) -> usize {
    let offset = out_shape.len() - shape.len();
    let mut remaining = flat;
    let mut index = 0;
    let mut stride = 1;

    for axis in (0..out_shape.len()).rev() {
        let coord = remaining % out_shape[axis];
        remaining /= out_shape[axis];

        if axis >= offset {
            let dim = shape[axis - offset];
            if dim != 1 {
                index += coord * stride;
            }
            stride *= dim;
        }
    }

    index
}
