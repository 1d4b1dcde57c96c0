use std::sync::Arc;

use nrt_dtype::{ArrayType, DType, Descr, Layout, Scalar, TypeError};

use crate::{
    ArrayError, FlatIter, MemoryOrder, broadcast_shape, contiguous_strides, element_count,
    fix_unknown_dimension, is_contiguous, normalize_axis,
};

/// Typed n-dimensional array over a shared little-endian byte buffer.
///
/// Cloning is cheap and yields another view of the same buffer. Writes go
/// through copy-on-write, so a buffer is either exclusively owned by the
/// writer or shared immutably between views; no view ever observes another
/// view's writes.
#[derive(Debug, Clone)]
pub struct ArrayValue {
    buffer: Arc<Vec<u8>>,
    offset: usize,
    shape: Vec<usize>,
    strides: Vec<isize>,
    descr: Descr,
    exportable: bool,
    writeable: bool,
}

/// Outcome of [`ArrayValue::getitem`].
#[derive(Debug, Clone)]
pub enum Indexed {
    Scalar(Scalar),
    View(ArrayValue),
}

/// Python-style slice bounds for [`ArrayValue::slice_axis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slice {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: Option<isize>,
}

impl Slice {
    #[must_use]
    pub const fn new(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> Self {
        Self { start, stop, step }
    }

    /// `start:stop`
    #[must_use]
    pub const fn range(start: isize, stop: isize) -> Self {
        Self::new(Some(start), Some(stop), None)
    }

    /// `::-1`
    #[must_use]
    pub const fn reversed() -> Self {
        Self::new(None, None, Some(-1))
    }

    /// Resolves the bounds against an axis of `extent` elements, returning
    /// `(start, step, count)`.
    fn indices(self, extent: usize) -> Result<(isize, isize, usize), ArrayError> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(ArrayError::ZeroStep);
        }
        let len = extent as isize;
        let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };
        let clamp = |bound: isize| {
            if bound < 0 {
                (bound + len).max(lower)
            } else {
                bound.min(upper)
            }
        };
        let start = self
            .start
            .map_or(if step > 0 { lower } else { upper }, clamp);
        let stop = self.stop.map_or(if step > 0 { upper } else { lower }, clamp);

        let count = if step > 0 && stop > start {
            (stop - start - 1) / step + 1
        } else if step < 0 && start > stop {
            (start - stop - 1) / (-step) + 1
        } else {
            0
        };
        Ok((start, step, count as usize))
    }
}

/// One term of an index tuple for [`ArrayValue::slice_terms`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexTerm {
    /// Fixes one axis and drops it from the result.
    Index(isize),
    Slice(Slice),
    /// Inserts an axis of extent 1 that consumes no source axis.
    NewAxis,
}

impl From<isize> for IndexTerm {
    fn from(index: isize) -> Self {
        Self::Index(index)
    }
}

impl From<Slice> for IndexTerm {
    fn from(slice: Slice) -> Self {
        Self::Slice(slice)
    }
}

impl ArrayValue {
    fn allocate(shape: &[usize], descr: Descr, order: MemoryOrder) -> Result<Self, ArrayError> {
        let item = descr.item_size();
        let strides = contiguous_strides(shape, item, order)?;
        let nbytes = element_count(shape)?
            .checked_mul(item)
            .ok_or(ArrayError::Overflow)?;
        Ok(Self {
            buffer: Arc::new(vec![0; nbytes]),
            offset: 0,
            shape: shape.to_vec(),
            strides,
            descr,
            exportable: true,
            writeable: true,
        })
    }

    /// Zero-initialised C-ordered array. All-zero bytes are the default
    /// value of every dtype, records included.
    pub fn zeros(shape: &[usize], descr: impl Into<Descr>) -> Result<Self, ArrayError> {
        Self::allocate(shape, descr.into(), MemoryOrder::C)
    }

    /// Builds an array from values given in row-major logical order, stored
    /// in `order`. Scalar dtypes are cast to `descr`; record values must
    /// carry exactly `descr`.
    pub fn from_scalars(
        shape: &[usize],
        descr: impl Into<Descr>,
        values: &[Scalar],
        order: MemoryOrder,
    ) -> Result<Self, ArrayError> {
        let mut out = Self::allocate(shape, descr.into(), order)?;
        out.assign_scalars(values)?;
        Ok(out)
    }

    pub fn from_f64(shape: &[usize], values: &[f64]) -> Result<Self, ArrayError> {
        let scalars: Vec<Scalar> = values.iter().copied().map(Scalar::F64).collect();
        Self::from_scalars(shape, DType::F64, &scalars, MemoryOrder::C)
    }

    pub fn from_i64(shape: &[usize], values: &[i64]) -> Result<Self, ArrayError> {
        let scalars: Vec<Scalar> = values.iter().copied().map(Scalar::I64).collect();
        Self::from_scalars(shape, DType::I64, &scalars, MemoryOrder::C)
    }

    /// Array of `shape` with every element set to `value`.
    pub fn full(shape: &[usize], value: &Scalar) -> Result<Self, ArrayError> {
        let mut out = Self::allocate(shape, value.descr(), MemoryOrder::C)?;
        let item = out.itemsize();
        let buffer = Arc::make_mut(&mut out.buffer);
        for chunk in buffer.chunks_exact_mut(item) {
            value.encode(chunk);
        }
        Ok(out)
    }

    /// Rank-0 array holding `value`.
    pub fn scalar(value: &Scalar) -> Result<Self, ArrayError> {
        Self::full(&[], value)
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Byte strides, one per dimension.
    #[must_use]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    #[must_use]
    pub fn itemsize(&self) -> usize {
        self.descr.item_size()
    }

    #[must_use]
    pub fn nbytes(&self) -> usize {
        self.size() * self.itemsize()
    }

    #[must_use]
    pub fn descr(&self) -> &Descr {
        &self.descr
    }

    /// Scalar dtype of the elements; `None` for record arrays.
    #[must_use]
    pub fn dtype(&self) -> Option<DType> {
        self.descr.as_dtype()
    }

    /// Byte offset of the first element within the shared buffer.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn is_exportable(&self) -> bool {
        self.exportable
    }

    #[must_use]
    pub fn is_writeable(&self) -> bool {
        self.writeable
    }

    /// The whole underlying buffer, including bytes outside this view.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// True when this value and `other` view the same allocation.
    #[must_use]
    pub fn shares_buffer(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    #[must_use]
    pub fn layout(&self) -> Layout {
        let item = self.itemsize();
        if is_contiguous(&self.shape, &self.strides, item, MemoryOrder::C) {
            Layout::C
        } else if is_contiguous(&self.shape, &self.strides, item, MemoryOrder::F) {
            Layout::F
        } else {
            Layout::A
        }
    }

    #[must_use]
    pub fn array_type(&self) -> ArrayType {
        ArrayType::new(self.descr.clone(), self.ndim(), self.layout())
    }

    fn normalize_index(&self, axis: usize, index: isize) -> Result<usize, ArrayError> {
        let extent = self.shape[axis];
        let resolved = if index < 0 {
            index + extent as isize
        } else {
            index
        };
        if resolved < 0 || resolved as usize >= extent {
            return Err(ArrayError::IndexOutOfRange {
                axis,
                index,
                extent,
            });
        }
        Ok(resolved as usize)
    }

    /// Byte offset of the element at a prefix of already-normalised indices.
    fn offset_of(&self, indices: &[usize]) -> usize {
        indices
            .iter()
            .zip(&self.strides)
            .fold(self.offset, |acc, (&i, &stride)| {
                acc.wrapping_add_signed(i as isize * stride)
            })
    }

    fn normalize_all(&self, indices: &[isize]) -> Result<Vec<usize>, ArrayError> {
        indices
            .iter()
            .enumerate()
            .map(|(axis, &index)| self.normalize_index(axis, index))
            .collect()
    }

    pub(crate) fn flat_offset(&self, mut flat: usize) -> usize {
        let mut offset = self.offset;
        for (&dim, &stride) in self.shape.iter().zip(&self.strides).rev() {
            offset = offset.wrapping_add_signed((flat % dim) as isize * stride);
            flat /= dim;
        }
        offset
    }

    pub(crate) fn read_at(&self, byte_offset: usize) -> Scalar {
        let item = self.itemsize();
        Scalar::decode(&self.descr, &self.buffer[byte_offset..byte_offset + item])
    }

    /// Full indexing: one index per dimension, negative indices wrap once.
    pub fn index(&self, indices: &[isize]) -> Result<Scalar, ArrayError> {
        if indices.len() != self.ndim() {
            return Err(ArrayError::UnsupportedIndexing {
                terms: indices.len(),
                ndim: self.ndim(),
            });
        }
        let resolved = self.normalize_all(indices)?;
        Ok(self.read_at(self.offset_of(&resolved)))
    }

    /// Fixes the leading `indices.len()` axes and returns a view over the
    /// remaining ones. The view is usable internally but never exportable.
    pub fn view_partial(&self, indices: &[isize]) -> Result<Self, ArrayError> {
        if indices.is_empty() || indices.len() >= self.ndim() {
            return Err(ArrayError::UnsupportedIndexing {
                terms: indices.len(),
                ndim: self.ndim(),
            });
        }
        let resolved = self.normalize_all(indices)?;
        let k = resolved.len();
        Ok(Self {
            buffer: Arc::clone(&self.buffer),
            offset: self.offset_of(&resolved),
            shape: self.shape[k..].to_vec(),
            strides: self.strides[k..].to_vec(),
            descr: self.descr.clone(),
            exportable: false,
            writeable: self.writeable,
        })
    }

    /// Front-end indexing convention: a full index yields a scalar, a single
    /// term on a higher-rank array yields a partial view, and any other
    /// number of terms is rejected.
    pub fn getitem(&self, indices: &[isize]) -> Result<Indexed, ArrayError> {
        if indices.len() == self.ndim() {
            self.index(indices).map(Indexed::Scalar)
        } else if indices.len() == 1 && self.ndim() > 1 {
            self.view_partial(indices).map(Indexed::View)
        } else {
            Err(ArrayError::UnsupportedIndexing {
                terms: indices.len(),
                ndim: self.ndim(),
            })
        }
    }

    /// Writes one element after casting `value` to the array dtype.
    pub fn setitem(&mut self, indices: &[isize], value: &Scalar) -> Result<(), ArrayError> {
        if indices.len() != self.ndim() {
            return Err(ArrayError::UnsupportedIndexing {
                terms: indices.len(),
                ndim: self.ndim(),
            });
        }
        if !self.writeable {
            return Err(ArrayError::ReadOnly);
        }
        let resolved = self.normalize_all(indices)?;
        let value = self.coerce(value)?;
        let at = self.offset_of(&resolved);
        let item = self.itemsize();
        value.encode(&mut Arc::make_mut(&mut self.buffer)[at..at + item]);
        Ok(())
    }

    fn coerce(&self, value: &Scalar) -> Result<Scalar, ArrayError> {
        match &self.descr {
            Descr::Scalar(dtype) => Ok(value.cast(*dtype)?),
            Descr::Record(_) if value.descr() == self.descr => Ok(value.clone()),
            Descr::Record(_) => Err(TypeError::ValueMismatch {
                expected: self.descr.to_string(),
                actual: value.descr().to_string(),
            }
            .into()),
        }
    }

    /// Overwrites every element, in row-major logical order. All values are
    /// converted before the first byte is written.
    pub fn assign_scalars(&mut self, values: &[Scalar]) -> Result<(), ArrayError> {
        if values.len() != self.size() {
            return Err(ArrayError::IncompatibleElementCount {
                old: self.size(),
                new: values.len(),
            });
        }
        if !self.writeable {
            return Err(ArrayError::ReadOnly);
        }
        let coerced = values
            .iter()
            .map(|value| self.coerce(value))
            .collect::<Result<Vec<_>, _>>()?;
        let offsets: Vec<usize> = (0..coerced.len()).map(|i| self.flat_offset(i)).collect();
        let item = self.itemsize();
        let buffer = Arc::make_mut(&mut self.buffer);
        for (value, at) in coerced.iter().zip(offsets) {
            value.encode(&mut buffer[at..at + item]);
        }
        Ok(())
    }

    /// Swaps the elements at two row-major flat positions.
    pub fn swap_flat(&mut self, a: usize, b: usize) -> Result<(), ArrayError> {
        let size = self.size();
        for pos in [a, b] {
            if pos >= size {
                return Err(ArrayError::IndexOutOfRange {
                    axis: 0,
                    index: pos as isize,
                    extent: size,
                });
            }
        }
        if !self.writeable {
            return Err(ArrayError::ReadOnly);
        }
        if a == b {
            return Ok(());
        }
        let (oa, ob) = (self.flat_offset(a), self.flat_offset(b));
        let item = self.itemsize();
        let buffer = Arc::make_mut(&mut self.buffer);
        for k in 0..item {
            buffer.swap(oa + k, ob + k);
        }
        Ok(())
    }

    /// Basic slicing along one axis. The result shares the buffer.
    pub fn slice_axis(&self, axis: isize, slice: Slice) -> Result<Self, ArrayError> {
        let axis = normalize_axis(axis, self.ndim())?;
        let (start, step, count) = slice.indices(self.shape[axis])?;
        let stride = self.strides[axis];
        let mut out = self.clone();
        if count > 0 {
            out.offset = self.offset.wrapping_add_signed(start * stride);
        }
        out.shape[axis] = count;
        out.strides[axis] = stride * step;
        Ok(out)
    }

    /// Inserts an axis of extent 1 at `axis`, counted in the result's
    /// dimensions. The result shares the buffer.
    pub fn expand_dims(&self, axis: isize) -> Result<Self, ArrayError> {
        let axis = normalize_axis(axis, self.ndim() + 1)?;
        let mut out = self.clone();
        out.shape.insert(axis, 1);
        out.strides.insert(axis, 0);
        Ok(out)
    }

    /// Basic indexing with a tuple of integers, slices and new axes, applied
    /// left to right. Source axes not covered by a term are kept whole.
    ///
    /// Integer terms drop their axis, so a view produced by one is a partial
    /// view and is not exportable.
    pub fn slice_terms(&self, terms: &[IndexTerm]) -> Result<Self, ArrayError> {
        let consumed = terms
            .iter()
            .filter(|term| !matches!(term, IndexTerm::NewAxis))
            .count();
        if consumed > self.ndim() {
            return Err(ArrayError::UnsupportedIndexing {
                terms: terms.len(),
                ndim: self.ndim(),
            });
        }

        let mut offset = self.offset;
        let mut shape = Vec::with_capacity(self.ndim() + terms.len());
        let mut strides = Vec::with_capacity(shape.capacity());
        let mut src = 0;
        let mut dropped = false;
        for term in terms {
            match *term {
                IndexTerm::Index(index) => {
                    let at = self.normalize_index(src, index)?;
                    offset = offset.wrapping_add_signed(at as isize * self.strides[src]);
                    dropped = true;
                    src += 1;
                }
                IndexTerm::Slice(slice) => {
                    let (start, step, count) = slice.indices(self.shape[src])?;
                    if count > 0 {
                        offset = offset.wrapping_add_signed(start * self.strides[src]);
                    }
                    shape.push(count);
                    strides.push(self.strides[src] * step);
                    src += 1;
                }
                IndexTerm::NewAxis => {
                    shape.push(1);
                    strides.push(0);
                }
            }
        }
        shape.extend_from_slice(&self.shape[src..]);
        strides.extend_from_slice(&self.strides[src..]);
        log::trace!("index tuple {terms:?} maps {:?} to {shape:?}", self.shape);

        Ok(Self {
            buffer: Arc::clone(&self.buffer),
            offset,
            shape,
            strides,
            descr: self.descr.clone(),
            exportable: self.exportable && !dropped,
            writeable: self.writeable,
        })
    }

    /// Reverses the axes.
    #[must_use]
    pub fn transpose(&self) -> Self {
        let mut out = self.clone();
        out.shape.reverse();
        out.strides.reverse();
        out
    }

    /// Reshapes with optional `-1` inference. C-contiguous inputs are
    /// reshaped in place as views; others are copied first.
    pub fn reshape(&self, new_shape: &[isize]) -> Result<Self, ArrayError> {
        let shape = fix_unknown_dimension(new_shape, self.size())?;
        let base = if self.layout() == Layout::C {
            self.clone()
        } else {
            log::trace!("reshape of {:?} array copies to C order", self.layout());
            self.to_contiguous()?
        };
        let strides = contiguous_strides(&shape, base.itemsize(), MemoryOrder::C)?;
        Ok(Self {
            shape,
            strides,
            ..base
        })
    }

    /// Read-only view stretched to `shape` with zero strides on broadcast
    /// axes.
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Self, ArrayError> {
        let merged = broadcast_shape(&self.shape, shape)?;
        if merged != shape {
            return Err(ArrayError::IncompatibleBroadcast {
                lhs: self.shape.clone(),
                rhs: shape.to_vec(),
            });
        }
        let lead = shape.len() - self.ndim();
        let mut strides = vec![0isize; lead];
        strides.extend(
            self.shape
                .iter()
                .zip(&self.strides)
                .zip(&shape[lead..])
                .map(|((&dim, &stride), &target)| if dim == 1 && target != 1 { 0 } else { stride }),
        );
        Ok(Self {
            buffer: Arc::clone(&self.buffer),
            offset: self.offset,
            shape: shape.to_vec(),
            strides,
            descr: self.descr.clone(),
            exportable: self.exportable,
            writeable: false,
        })
    }

    /// Copies the logical contents into a fresh C-ordered, writeable array.
    pub fn to_contiguous(&self) -> Result<Self, ArrayError> {
        let mut out = Self::allocate(&self.shape, self.descr.clone(), MemoryOrder::C)?;
        let item = self.itemsize();
        let buffer = Arc::make_mut(&mut out.buffer);
        for (i, chunk) in buffer.chunks_exact_mut(item).enumerate() {
            let at = self.flat_offset(i);
            chunk.copy_from_slice(&self.buffer[at..at + item]);
        }
        out.exportable = self.exportable;
        Ok(out)
    }

    /// Fails for views produced by partial indexing.
    pub fn mark_exportable(&mut self) -> Result<(), ArrayError> {
        if !self.exportable {
            return Err(ArrayError::NonExportableView {
                shape: self.shape.clone(),
            });
        }
        Ok(())
    }

    /// Hands the value across the runtime boundary.
    pub fn export(mut self) -> Result<Self, ArrayError> {
        self.mark_exportable()?;
        Ok(self)
    }

    /// Restartable row-major iterator over the logical elements.
    #[must_use]
    pub fn iter(&self) -> FlatIter<'_> {
        FlatIter::new(self)
    }

    /// Attribute-style flat view; identical to [`ArrayValue::iter`] and
    /// additionally random-accessible through [`FlatIter::get`].
    #[must_use]
    pub fn flat(&self) -> FlatIter<'_> {
        self.iter()
    }

    #[must_use]
    pub fn to_scalars(&self) -> Vec<Scalar> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a ArrayValue {
    type Item = Scalar;
    type IntoIter = FlatIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{ArrayValue, IndexTerm, Indexed, Slice};
    use crate::{ArrayError, MemoryOrder};
    use nrt_dtype::{DType, Descr, Layout, RecordDescr, RecordValue, Scalar};
    use nrt_runtime::ErrorKind;

    fn arange(shape: &[usize]) -> ArrayValue {
        let n: usize = shape.iter().product();
        let values: Vec<f64> = (0..n).map(|v| v as f64).collect();
        ArrayValue::from_f64(shape, &values).expect("arange")
    }

    #[test]
    fn accessors_describe_c_contiguous_array() {
        let a = arange(&[2, 3, 4]);
        assert_eq!(a.shape(), &[2, 3, 4]);
        assert_eq!(a.strides(), &[96, 32, 8]);
        assert_eq!(a.ndim(), 3);
        assert_eq!(a.size(), 24);
        assert_eq!(a.itemsize(), 8);
        assert_eq!(a.layout(), Layout::C);
        assert_eq!(a.array_type().to_string(), "array(float64, 3d, C)");
    }

    #[test]
    fn fortran_order_stores_column_major() {
        let values: Vec<Scalar> = (0..6).map(Scalar::I32).collect();
        let a = ArrayValue::from_scalars(&[2, 3], DType::I32, &values, MemoryOrder::F)
            .expect("f-order");
        assert_eq!(a.strides(), &[4, 8]);
        assert_eq!(a.layout(), Layout::F);
        assert_eq!(a.to_scalars(), values);
        assert_eq!(a.index(&[1, 0]).expect("a[1,0]"), Scalar::I32(3));
    }

    #[test]
    fn full_indexing_wraps_negative_indices_once() {
        let a = arange(&[3, 4]);
        assert_eq!(a.index(&[1, 2]).expect("a[1,2]"), Scalar::F64(6.0));
        assert_eq!(a.index(&[-1, -1]).expect("a[-1,-1]"), Scalar::F64(11.0));
        let err = a.index(&[3, 0]).expect_err("row out of range");
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
        assert!(a.index(&[0, -5]).is_err());
    }

    #[test]
    fn partial_index_view_is_not_exportable() {
        let a = arange(&[2, 3, 4]);
        let mut view = a.view_partial(&[1]).expect("a[1]");
        assert_eq!(view.shape(), &[3, 4]);
        assert!(view.shares_buffer(&a));
        assert_eq!(view.index(&[0, 0]).expect("a[1,0,0]"), Scalar::F64(12.0));
        let err = view.mark_exportable().expect_err("partial view");
        assert_eq!(err.kind(), ErrorKind::NonExportableView);
        assert!(view.clone().export().is_err());
        assert!(a.export().is_ok());
    }

    #[test]
    fn getitem_follows_calling_convention() {
        let a = arange(&[2, 3, 4]);
        assert!(matches!(a.getitem(&[0, 1, 2]), Ok(Indexed::Scalar(Scalar::F64(v))) if v == 6.0));
        let Ok(Indexed::View(view)) = a.getitem(&[1]) else {
            panic!("single term should give a view");
        };
        assert_eq!(view.shape(), &[3, 4]);
        let err = a.getitem(&[0, 1]).expect_err("two terms on 3-d");
        assert_eq!(err.kind(), ErrorKind::UnsupportedIndexing);
    }

    #[test]
    fn setitem_casts_and_copies_on_write() {
        let a = ArrayValue::zeros(&[2, 2], DType::I16).expect("zeros");
        let mut b = a.clone();
        b.setitem(&[0, 1], &Scalar::F64(7.9)).expect("set");
        assert_eq!(b.index(&[0, 1]).expect("b[0,1]"), Scalar::I16(7));
        assert_eq!(a.index(&[0, 1]).expect("a[0,1]"), Scalar::I16(0));
        assert!(!a.shares_buffer(&b));
    }

    #[test]
    fn slicing_matches_python_semantics() {
        let a = arange(&[10]);
        let every_other = a.slice_axis(0, Slice::new(Some(1), None, Some(2))).expect("1::2");
        assert_eq!(
            every_other.to_scalars(),
            [1.0, 3.0, 5.0, 7.0, 9.0].map(Scalar::F64).to_vec()
        );
        let reversed = a.slice_axis(0, Slice::reversed()).expect("::-1");
        assert_eq!(reversed.index(&[0]).expect("first"), Scalar::F64(9.0));
        assert_eq!(reversed.strides(), &[-8]);
        let tail = a.slice_axis(-1, Slice::new(Some(-3), None, None)).expect("-3:");
        assert_eq!(tail.size(), 3);
        let empty = a.slice_axis(0, Slice::range(5, 2)).expect("5:2");
        assert_eq!(empty.size(), 0);
        assert_eq!(
            a.slice_axis(0, Slice::new(None, None, Some(0)))
                .expect_err("zero step"),
            ArrayError::ZeroStep
        );
        assert!(a.slice_axis(1, Slice::default()).is_err());
    }

    #[test]
    fn transpose_and_reshape() {
        let a = arange(&[2, 3]);
        let t = a.transpose();
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.layout(), Layout::F);
        assert_eq!(t.index(&[2, 1]).expect("t[2,1]"), Scalar::F64(5.0));

        let r = a.reshape(&[-1]).expect("flatten");
        assert!(r.shares_buffer(&a));
        assert_eq!(r.shape(), &[6]);

        let rt = t.reshape(&[6]).expect("copying reshape");
        assert!(!rt.shares_buffer(&a));
        assert_eq!(
            rt.to_scalars(),
            [0.0, 3.0, 1.0, 4.0, 2.0, 5.0].map(Scalar::F64).to_vec()
        );
        assert!(a.reshape(&[4, -1]).is_err());
    }

    #[test]
    fn expand_dims_inserts_a_unit_axis() {
        let a = arange(&[2, 3]);
        let front = a.expand_dims(0).expect("front");
        assert_eq!(front.shape(), &[1, 2, 3]);
        assert_eq!(front.strides(), &[0, 24, 8]);
        assert_eq!(front.layout(), Layout::C);
        assert!(front.shares_buffer(&a));

        let back = a.expand_dims(-1).expect("back");
        assert_eq!(back.shape(), &[2, 3, 1]);
        assert_eq!(back.index(&[1, 2, 0]).expect("b[1,2,0]"), Scalar::F64(5.0));
        assert_eq!(back.to_scalars(), a.to_scalars());

        let err = a.expand_dims(3).expect_err("past the end");
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn index_tuples_mix_integers_slices_and_new_axes() {
        let a = arange(&[2, 3, 4]);
        // a[1, np.newaxis, ::2]
        let v = a
            .slice_terms(&[
                IndexTerm::Index(1),
                IndexTerm::NewAxis,
                Slice::new(None, None, Some(2)).into(),
            ])
            .expect("mixed terms");
        assert_eq!(v.shape(), &[1, 2, 4]);
        assert_eq!(v.strides(), &[0, 64, 8]);
        assert_eq!(v.index(&[0, 1, 3]).expect("v[0,1,3]"), Scalar::F64(23.0));
        assert!(v.shares_buffer(&a));
        let mut partial = v.clone();
        assert!(partial.mark_exportable().is_err());

        // a[np.newaxis, :, -1] keeps the middle axis whole
        let w = a
            .slice_terms(&[IndexTerm::NewAxis, Slice::default().into(), IndexTerm::from(-1)])
            .expect("trailing integer");
        assert_eq!(w.shape(), &[1, 2, 4]);
        assert_eq!(w.index(&[0, 1, 0]).expect("w[0,1,0]"), Scalar::F64(20.0));

        let mut sliced = a
            .slice_terms(&[IndexTerm::NewAxis, Slice::reversed().into()])
            .expect("slices only");
        assert_eq!(sliced.shape(), &[1, 2, 3, 4]);
        assert_eq!(sliced.index(&[0, 0, 0, 0]).expect("first"), Scalar::F64(12.0));
        assert!(sliced.mark_exportable().is_ok());
    }

    #[test]
    fn index_tuples_are_validated() {
        let a = arange(&[2, 3]);
        let err = a
            .slice_terms(&[IndexTerm::Index(0), IndexTerm::Index(0), IndexTerm::Index(0)])
            .expect_err("too many terms");
        assert_eq!(err.kind(), ErrorKind::UnsupportedIndexing);
        let extra = a
            .slice_terms(&[IndexTerm::NewAxis, IndexTerm::Index(0), IndexTerm::NewAxis, IndexTerm::Index(0)])
            .expect("new axes consume nothing");
        assert_eq!(extra.shape(), &[1, 1]);
        assert_eq!(extra.to_scalars(), vec![Scalar::F64(0.0)]);

        let err = a.slice_terms(&[IndexTerm::Index(2)]).expect_err("row 2");
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
        let err = a
            .slice_terms(&[Slice::new(None, None, Some(0)).into()])
            .expect_err("zero step");
        assert_eq!(err, ArrayError::ZeroStep);
        assert_eq!(a.slice_terms(&[]).expect("no terms").shape(), a.shape());
    }

    #[test]
    fn broadcast_views_are_read_only() {
        let row = arange(&[1, 3]);
        let mut b = row.broadcast_to(&[4, 3]).expect("broadcast");
        assert_eq!(b.strides(), &[0, 8]);
        assert_eq!(b.index(&[3, 2]).expect("b[3,2]"), Scalar::F64(2.0));
        assert_eq!(b.layout(), Layout::A);
        assert_eq!(b.setitem(&[0, 0], &Scalar::F64(1.0)), Err(ArrayError::ReadOnly));
        assert_eq!(ArrayError::ReadOnly.kind(), ErrorKind::UnsupportedArgument);
        assert!(row.broadcast_to(&[3]).is_err());
        let c = b.to_contiguous().expect("materialise");
        assert!(c.is_writeable());
        assert_eq!(c.layout(), Layout::C);
    }

    #[test]
    fn record_arrays_hold_structured_elements() {
        let descr = Arc::new(RecordDescr::scalars([("x", DType::F64), ("n", DType::I8)]).expect("record"));
        let a = ArrayValue::zeros(&[3], Descr::Record(Arc::clone(&descr))).expect("zeros");
        assert_eq!(a.itemsize(), 9);

        let mut value = RecordValue::zeroed(Arc::clone(&descr));
        value.set_field("x", Scalar::F64(1.5)).expect("x");
        let mut b = a.clone();
        b.setitem(&[2], &Scalar::Record(value.clone())).expect("store record");
        assert_eq!(b.index(&[2]).expect("b[2]"), Scalar::Record(value));

        let err = b.setitem(&[0], &Scalar::F64(1.0)).expect_err("scalar into record array");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn swap_flat_exchanges_elements() {
        let mut a = arange(&[4]);
        a.swap_flat(0, 3).expect("swap");
        assert_eq!(a.to_scalars(), [3.0, 1.0, 2.0, 0.0].map(Scalar::F64).to_vec());
        assert!(a.swap_flat(0, 4).is_err());
    }

    #[test]
    fn rank_zero_arrays_index_with_no_terms() {
        let s = ArrayValue::scalar(&Scalar::U8(9)).expect("scalar array");
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.size(), 1);
        assert_eq!(s.index(&[]).expect("s[()]"), Scalar::U8(9));
        assert_eq!(s.to_scalars(), vec![Scalar::U8(9)]);
    }
}
