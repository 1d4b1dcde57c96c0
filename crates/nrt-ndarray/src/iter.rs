use nrt_dtype::Scalar;

use crate::ArrayValue;

/// Row-major iterator over the logical elements of an [`ArrayValue`],
/// independent of its physical layout. Each call to
/// [`ArrayValue::iter`] starts a fresh pass.
#[derive(Debug, Clone)]
pub struct FlatIter<'a> {
    array: &'a ArrayValue,
    front: usize,
    back: usize,
}

impl<'a> FlatIter<'a> {
    pub(crate) fn new(array: &'a ArrayValue) -> Self {
        Self {
            array,
            front: 0,
            back: array.size(),
        }
    }

    /// Element at flat row-major position `index`, regardless of how far
    /// the iterator has advanced.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Scalar> {
        (index < self.array.size()).then(|| self.array.read_at(self.array.flat_offset(index)))
    }
}

impl Iterator for FlatIter<'_> {
    type Item = Scalar;

    fn next(&mut self) -> Option<Scalar> {
        if self.front >= self.back {
            return None;
        }
        let value = self.array.read_at(self.array.flat_offset(self.front));
        self.front += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for FlatIter<'_> {
    fn next_back(&mut self) -> Option<Scalar> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.array.read_at(self.array.flat_offset(self.back)))
    }
}

impl ExactSizeIterator for FlatIter<'_> {}

impl std::iter::FusedIterator for FlatIter<'_> {}
