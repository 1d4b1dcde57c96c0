use std::sync::Arc;

use crate::{DType, Scalar, TypeError};

/// Descriptor for a single field in a structured dtype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescr {
    pub name: String,
    pub dtype: DType,
    /// Fixed subarray shape; empty for a plain scalar field.
    pub shape: Vec<usize>,
    /// Byte offset within the packed record.
    pub offset: usize,
}

impl FieldDescr {
    /// Number of `dtype` elements stored in this field.
    #[must_use]
    pub fn count(&self) -> usize {
        self.shape.iter().product()
    }

    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.count() * self.dtype.item_size()
    }

    #[must_use]
    pub fn is_subarray(&self) -> bool {
        !self.shape.is_empty()
    }
}

impl std::fmt::Display for FieldDescr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.shape.is_empty() {
            write!(f, "{}:{}", self.name, self.dtype)
        } else {
            let dims: Vec<String> = self.shape.iter().map(ToString::to_string).collect();
            write!(f, "{}:({}){}", self.name, dims.join(","), self.dtype)
        }
    }
}

/// Index of a field inside one [`RecordDescr`]. Resolve it once with
/// [`RecordDescr::field_id`] and reuse it for O(1) access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(usize);

impl FieldId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Packed, one-level structured dtype. Offsets and the name table are
/// computed once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordDescr {
    fields: Vec<FieldDescr>,
    // sorted by name for binary search
    lookup: Vec<(String, usize)>,
    size: usize,
}

impl RecordDescr {
    /// Builds a record from `(name, dtype, subarray shape)` triples laid out
    /// back to back in declaration order.
    pub fn new<N: Into<String>>(
        fields: impl IntoIterator<Item = (N, DType, Vec<usize>)>,
    ) -> Result<Self, TypeError> {
        let mut out = Vec::new();
        let mut offset = 0usize;
        for (name, dtype, shape) in fields {
            let name = name.into();
            if name.is_empty() {
                return Err(TypeError::unsupported(name, "record field names must not be empty"));
            }
            if dtype.item_size() == 0 {
                return Err(TypeError::unsupported(
                    format!("{name}:{dtype}"),
                    "zero-sized record fields are not supported",
                ));
            }
            if shape.contains(&0) {
                return Err(TypeError::unsupported(
                    format!("{name}:{shape:?}{dtype}"),
                    "subarray extents must be positive",
                ));
            }
            let size = shape
                .iter()
                .try_fold(dtype.item_size(), |acc, &dim| acc.checked_mul(dim));
            let end = size.and_then(|size| offset.checked_add(size)).ok_or_else(|| {
                TypeError::unsupported(format!("{name}:{shape:?}{dtype}"), "record size overflows")
            })?;
            out.push(FieldDescr {
                name,
                dtype,
                shape,
                offset,
            });
            offset = end;
        }
        if out.is_empty() {
            return Err(TypeError::unsupported("[]", "records need at least one field"));
        }

        let mut lookup: Vec<(String, usize)> = out
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.name.clone(), idx))
            .collect();
        lookup.sort();
        if let Some(dup) = lookup.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(TypeError::unsupported(
                dup[0].0.clone(),
                "duplicate record field name",
            ));
        }

        Ok(Self {
            fields: out,
            lookup,
            size: offset,
        })
    }

    /// Convenience constructor for records whose fields are all scalars.
    pub fn scalars<N: Into<String>>(
        fields: impl IntoIterator<Item = (N, DType)>,
    ) -> Result<Self, TypeError> {
        Self::new(fields.into_iter().map(|(name, dtype)| (name, dtype, Vec::new())))
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDescr] {
        &self.fields
    }

    /// Packed record size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn field_id(&self, name: &str) -> Result<FieldId, TypeError> {
        self.lookup
            .binary_search_by(|(candidate, _)| candidate.as_str().cmp(name))
            .map(|pos| FieldId(self.lookup[pos].1))
            .map_err(|_| TypeError::FieldNotFound {
                name: name.to_string(),
                record: self.to_string(),
            })
    }

    #[must_use]
    pub fn field(&self, id: FieldId) -> Option<&FieldDescr> {
        self.fields.get(id.0)
    }
}

impl std::fmt::Display for RecordDescr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.fields.iter().map(ToString::to_string).collect();
        write!(f, "Record({})", parts.join(","))
    }
}

/// Value read from or written to a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Scalar),
    SubArray {
        dtype: DType,
        shape: Vec<usize>,
        values: Vec<Scalar>,
    },
}

impl FieldValue {
    #[must_use]
    pub fn into_scalar(self) -> Option<Scalar> {
        match self {
            Self::Scalar(value) => Some(value),
            Self::SubArray { .. } => None,
        }
    }

    fn type_label(&self) -> String {
        match self {
            Self::Scalar(value) => value.descr().to_string(),
            Self::SubArray { dtype, shape, .. } => {
                let dims: Vec<String> = shape.iter().map(ToString::to_string).collect();
                format!("({}){dtype}", dims.join(","))
            }
        }
    }
}

impl From<Scalar> for FieldValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

/// A structured scalar: a packed byte image interpreted through its
/// [`RecordDescr`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    descr: Arc<RecordDescr>,
    bytes: Vec<u8>,
}

impl RecordValue {
    #[must_use]
    pub fn zeroed(descr: Arc<RecordDescr>) -> Self {
        let bytes = vec![0u8; descr.size()];
        Self { descr, bytes }
    }

    pub(crate) fn from_image(descr: Arc<RecordDescr>, raw: &[u8]) -> Self {
        let bytes = raw[..descr.size()].to_vec();
        Self { descr, bytes }
    }

    pub fn from_bytes(descr: Arc<RecordDescr>, bytes: Vec<u8>) -> Result<Self, TypeError> {
        if bytes.len() != descr.size() {
            return Err(TypeError::ValueMismatch {
                expected: format!("{} bytes for {descr}", descr.size()),
                actual: format!("{} bytes", bytes.len()),
            });
        }
        Ok(Self { descr, bytes })
    }

    #[must_use]
    pub fn descr(&self) -> &Arc<RecordDescr> {
        &self.descr
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn get_field(&self, name: &str) -> Result<FieldValue, TypeError> {
        let id = self.descr.field_id(name)?;
        self.get(id)
    }

    pub fn get(&self, id: FieldId) -> Result<FieldValue, TypeError> {
        let field = self.field_or_err(id)?;
        let item = field.dtype.item_size();
        let descr = field.dtype.into();
        if !field.is_subarray() {
            let raw = &self.bytes[field.offset..field.offset + item];
            return Ok(FieldValue::Scalar(Scalar::decode(&descr, raw)));
        }
        let values = (0..field.count())
            .map(|i| {
                let start = field.offset + i * item;
                Scalar::decode(&descr, &self.bytes[start..start + item])
            })
            .collect();
        Ok(FieldValue::SubArray {
            dtype: field.dtype,
            shape: field.shape.clone(),
            values,
        })
    }

    /// Writes `value` into the named field. The value's dtype (and shape,
    /// for subarray fields) must match the declared field exactly.
    pub fn set_field(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<(), TypeError> {
        let id = self.descr.field_id(name)?;
        self.set(id, value)
    }

    pub fn set(&mut self, id: FieldId, value: impl Into<FieldValue>) -> Result<(), TypeError> {
        let value = value.into();
        let field = self.field_or_err(id)?.clone();
        let mismatch = || TypeError::FieldTypeMismatch {
            field: field.name.clone(),
            expected: field.to_string(),
            actual: value.type_label(),
        };
        let item = field.dtype.item_size();

        match &value {
            FieldValue::Scalar(scalar) => {
                if field.is_subarray() || scalar.dtype() != Some(field.dtype) {
                    return Err(mismatch());
                }
                scalar.encode(&mut self.bytes[field.offset..field.offset + item]);
            }
            FieldValue::SubArray {
                dtype,
                shape,
                values,
            } => {
                if *dtype != field.dtype
                    || *shape != field.shape
                    || values.len() != field.count()
                    || values.iter().any(|v| v.dtype() != Some(field.dtype))
                {
                    return Err(mismatch());
                }
                for (i, v) in values.iter().enumerate() {
                    let start = field.offset + i * item;
                    v.encode(&mut self.bytes[start..start + item]);
                }
            }
        }
        Ok(())
    }

    fn field_or_err(&self, id: FieldId) -> Result<&FieldDescr, TypeError> {
        self.descr.field(id).ok_or_else(|| TypeError::FieldNotFound {
            name: format!("#{}", id.0),
            record: self.descr.to_string(),
        })
    }
}
