#![forbid(unsafe_code)]

mod array;
mod iter;

pub use array::{ArrayValue, IndexTerm, Indexed, Slice};
pub use iter::FlatIter;

use nrt_dtype::TypeError;
use nrt_runtime::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOrder {
    C,
    F,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArrayError {
    #[error("item size must be > 0")]
    InvalidItemSize,
    #[error("invalid dimension {0}")]
    InvalidDimension(isize),
    #[error("only one -1 dimension is allowed")]
    MultipleUnknownDimensions,
    #[error("size arithmetic overflow")]
    Overflow,
    #[error("cannot broadcast {lhs:?} with {rhs:?}")]
    IncompatibleBroadcast { lhs: Vec<usize>, rhs: Vec<usize> },
    #[error("element count mismatch old={old} new={new}")]
    IncompatibleElementCount { old: usize, new: usize },
    #[error("index {index} is out of bounds for axis {axis} with size {extent}")]
    IndexOutOfRange {
        axis: usize,
        index: isize,
        extent: usize,
    },
    #[error("axis {axis} is out of bounds for array of dimension {ndim}")]
    AxisOutOfRange { axis: isize, ndim: usize },
    #[error("{terms} index term(s) are not supported on a {ndim}-d array")]
    UnsupportedIndexing { terms: usize, ndim: usize },
    #[error("view of shape {shape:?} comes from partial indexing and cannot be exported")]
    NonExportableView { shape: Vec<usize> },
    #[error("assignment destination is read-only")]
    ReadOnly,
    #[error("slice step cannot be zero")]
    ZeroStep,
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl ArrayError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidItemSize => ErrorKind::UnsupportedType,
            Self::InvalidDimension(_)
            | Self::MultipleUnknownDimensions
            | Self::Overflow
            | Self::ZeroStep => ErrorKind::InvalidParameter,
            Self::IncompatibleBroadcast { .. } | Self::IncompatibleElementCount { .. } => {
                ErrorKind::Broadcast
            }
            Self::IndexOutOfRange { .. } | Self::AxisOutOfRange { .. } => {
                ErrorKind::IndexOutOfRange
            }
            Self::UnsupportedIndexing { .. } => ErrorKind::UnsupportedIndexing,
            Self::ReadOnly => ErrorKind::UnsupportedArgument,
            Self::NonExportableView { .. } => ErrorKind::NonExportableView,
            Self::Type(err) => err.kind(),
        }
    }

    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        self.kind().reason_code()
    }
}

#[must_use]
pub fn can_broadcast(lhs: &[usize], rhs: &[usize]) -> bool {
    broadcast_shape(lhs, rhs).is_ok()
}

/// Aligns two shapes from the trailing dimension; extents must match or
/// one of them must be 1.
pub fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>, ArrayError> {
    let nd = lhs.len().max(rhs.len());
    let mut out = Vec::with_capacity(nd);

    for idx in 0..nd {
        let l = *lhs.get(lhs.len().wrapping_sub(1 + idx)).unwrap_or(&1);
        let r = *rhs.get(rhs.len().wrapping_sub(1 + idx)).unwrap_or(&1);

        let merged = if l == r {
            l
        } else if l == 1 {
            r
        } else if r == 1 {
            l
        } else {
            return Err(ArrayError::IncompatibleBroadcast {
                lhs: lhs.to_vec(),
                rhs: rhs.to_vec(),
            });
        };

        out.push(merged);
    }

    out.reverse();
    Ok(out)
}

pub fn broadcast_shapes(shapes: &[&[usize]]) -> Result<Vec<usize>, ArrayError> {
    let mut acc = Vec::new();
    for shape in shapes {
        acc = broadcast_shape(&acc, shape)?;
    }
    Ok(acc)
}

pub fn element_count(shape: &[usize]) -> Result<usize, ArrayError> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim).ok_or(ArrayError::Overflow))
}

/// Resolves a single `-1` entry in a requested shape against the element
/// count it must preserve.
pub fn fix_unknown_dimension(
    new_shape: &[isize],
    old_element_count: usize,
) -> Result<Vec<usize>, ArrayError> {
    let mut known_product: usize = 1;
    let mut unknown_index: Option<usize> = None;
    let mut out = Vec::with_capacity(new_shape.len());

    for (idx, &dim) in new_shape.iter().enumerate() {
        match dim {
            -1 => {
                if unknown_index.replace(idx).is_some() {
                    return Err(ArrayError::MultipleUnknownDimensions);
                }
                out.push(0);
            }
            d if d < -1 => return Err(ArrayError::InvalidDimension(d)),
            d => {
                let d = usize::try_from(d).map_err(|_| ArrayError::InvalidDimension(d))?;
                known_product = known_product.checked_mul(d).ok_or(ArrayError::Overflow)?;
                out.push(d);
            }
        }
    }

    match unknown_index {
        Some(idx) => {
            if known_product == 0 || !old_element_count.is_multiple_of(known_product) {
                return Err(ArrayError::IncompatibleElementCount {
                    old: old_element_count,
                    new: known_product,
                });
            }
            out[idx] = old_element_count / known_product;
        }
        None => {
            if known_product != old_element_count {
                return Err(ArrayError::IncompatibleElementCount {
                    old: old_element_count,
                    new: known_product,
                });
            }
        }
    }

    Ok(out)
}

pub fn contiguous_strides(
    shape: &[usize],
    item_size: usize,
    order: MemoryOrder,
) -> Result<Vec<isize>, ArrayError> {
    if item_size == 0 {
        return Err(ArrayError::InvalidItemSize);
    }

    let mut strides_bytes = vec![0usize; shape.len()];
    let mut stride = item_size;
    match order {
        MemoryOrder::C => {
            for (i, &dim) in shape.iter().enumerate().rev() {
                strides_bytes[i] = stride;
                stride = stride.checked_mul(dim).ok_or(ArrayError::Overflow)?;
            }
        }
        MemoryOrder::F => {
            for (i, &dim) in shape.iter().enumerate() {
                strides_bytes[i] = stride;
                stride = stride.checked_mul(dim).ok_or(ArrayError::Overflow)?;
            }
        }
    }

    strides_bytes
        .into_iter()
        .map(|s| isize::try_from(s).map_err(|_| ArrayError::Overflow))
        .collect()
}

/// True when `strides` lay out `shape` back to back in `order`. Axes of
/// extent 1 place no constraint on their stride.
#[must_use]
pub fn is_contiguous(shape: &[usize], strides: &[isize], item_size: usize, order: MemoryOrder) -> bool {
    if shape.contains(&0) {
        return true;
    }
    let mut expected = item_size as isize;
    let mut check = |dim: usize, stride: isize| {
        if dim == 1 {
            return true;
        }
        let ok = stride == expected;
        expected = expected.saturating_mul(dim as isize);
        ok
    };
    match order {
        MemoryOrder::C => shape
            .iter()
            .zip(strides)
            .rev()
            .all(|(&dim, &stride)| check(dim, stride)),
        MemoryOrder::F => shape
            .iter()
            .zip(strides)
            .all(|(&dim, &stride)| check(dim, stride)),
    }
}

/// Maps a possibly negative axis onto `0..ndim`.
pub fn normalize_axis(axis: isize, ndim: usize) -> Result<usize, ArrayError> {
    let nd = ndim as isize;
    let resolved = if axis < 0 { axis + nd } else { axis };
    if (0..nd).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(ArrayError::AxisOutOfRange { axis, ndim })
    }
}
