use std::sync::Arc;

use crate::{DType, RecordDescr, TimeUnit, TypeError};

/// Element descriptor: a scalar dtype or a packed record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Descr {
    Scalar(DType),
    Record(Arc<RecordDescr>),
}

impl Descr {
    #[must_use]
    pub fn item_size(&self) -> usize {
        match self {
            Self::Scalar(dtype) => dtype.item_size(),
            Self::Record(record) => record.size(),
        }
    }

    #[must_use]
    pub fn as_dtype(&self) -> Option<DType> {
        match self {
            Self::Scalar(dtype) => Some(*dtype),
            Self::Record(_) => None,
        }
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&Arc<RecordDescr>> {
        match self {
            Self::Scalar(_) => None,
            Self::Record(record) => Some(record),
        }
    }

    /// A spec that resolves back to this descriptor.
    #[must_use]
    pub fn to_spec(&self) -> TypeSpec {
        match self {
            Self::Scalar(dtype) => TypeSpec::Name(dtype.to_string()),
            Self::Record(record) => TypeSpec::Record(
                record
                    .fields()
                    .iter()
                    .map(|field| FieldSpec {
                        name: field.name.clone(),
                        spec: TypeSpec::Name(field.dtype.to_string()),
                        shape: field.shape.clone(),
                    })
                    .collect(),
            ),
        }
    }
}

impl From<DType> for Descr {
    fn from(dtype: DType) -> Self {
        Self::Scalar(dtype)
    }
}

impl From<RecordDescr> for Descr {
    fn from(record: RecordDescr) -> Self {
        Self::Record(Arc::new(record))
    }
}

impl std::fmt::Display for Descr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(dtype) => write!(f, "{dtype}"),
            Self::Record(record) => write!(f, "{record}"),
        }
    }
}

/// Memory layout class of an array type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Row-major contiguous.
    C,
    /// Column-major contiguous.
    F,
    /// Arbitrary strides.
    A,
}

impl Layout {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::C => "C",
            Self::F => "F",
            Self::A => "A",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayType {
    pub element: Descr,
    pub ndim: usize,
    pub layout: Layout,
}

impl ArrayType {
    #[must_use]
    pub fn new(element: impl Into<Descr>, ndim: usize, layout: Layout) -> Self {
        Self {
            element: element.into(),
            ndim,
            layout,
        }
    }
}

impl std::fmt::Display for ArrayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "array({}, {}d, {})",
            self.element,
            self.ndim,
            self.layout.code()
        )
    }
}

/// User-facing type description, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpec {
    /// NumPy-style dtype name such as `"float64"`, `"<i4"` or `"M8[ns]"`.
    Name(String),
    Record(Vec<FieldSpec>),
    Array {
        element: Box<TypeSpec>,
        ndim: usize,
        layout: Layout,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub spec: TypeSpec,
    /// Fixed subarray shape; empty for a scalar field.
    pub shape: Vec<usize>,
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, spec: impl Into<TypeSpec>) -> Self {
        Self {
            name: name.into(),
            spec: spec.into(),
            shape: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = shape;
        self
    }
}

impl TypeSpec {
    #[must_use]
    pub fn array(element: impl Into<TypeSpec>, ndim: usize, layout: Layout) -> Self {
        Self::Array {
            element: Box::new(element.into()),
            ndim,
            layout,
        }
    }
}

impl From<&str> for TypeSpec {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl std::fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Record(fields) => {
                f.write_str("[")?;
                for (idx, field) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "({}, {}", field.name, field.spec)?;
                    if !field.shape.is_empty() {
                        write!(f, ", {:?}", field.shape)?;
                    }
                    f.write_str(")")?;
                }
                f.write_str("]")
            }
            Self::Array {
                element,
                ndim,
                layout,
            } => write!(f, "array({element}, {ndim}d, {})", layout.code()),
        }
    }
}

/// Outcome of [`resolve`]: an element descriptor or an array type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedType {
    Element(Descr),
    Array(ArrayType),
}

impl ResolvedType {
    #[must_use]
    pub fn as_element(&self) -> Option<&Descr> {
        match self {
            Self::Element(descr) => Some(descr),
            Self::Array(_) => None,
        }
    }
}

impl std::fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Element(descr) => write!(f, "{descr}"),
            Self::Array(array) => write!(f, "{array}"),
        }
    }
}

/// Maps a user type description to its canonical runtime type.
pub fn resolve(spec: &TypeSpec) -> Result<ResolvedType, TypeError> {
    match spec {
        TypeSpec::Name(name) => Ok(ResolvedType::Element(Descr::Scalar(parse_dtype_name(
            name,
        )?))),
        TypeSpec::Record(fields) => Ok(ResolvedType::Element(Descr::Record(Arc::new(
            resolve_record(fields)?,
        )))),
        TypeSpec::Array {
            element,
            ndim,
            layout,
        } => match resolve(element)? {
            ResolvedType::Element(descr) => {
                Ok(ResolvedType::Array(ArrayType::new(descr, *ndim, *layout)))
            }
            ResolvedType::Array(_) => Err(TypeError::unsupported(
                spec.to_string(),
                "arrays of arrays are not element types",
            )),
        },
    }
}

fn resolve_record(fields: &[FieldSpec]) -> Result<RecordDescr, TypeError> {
    let mut resolved = Vec::with_capacity(fields.len());
    for field in fields {
        let dtype = match &field.spec {
            TypeSpec::Name(name) => parse_dtype_name(name)?,
            TypeSpec::Record(_) => {
                return Err(TypeError::unsupported(
                    format!("{}:{}", field.name, field.spec),
                    "nested records are not supported",
                ));
            }
            TypeSpec::Array { .. } => {
                return Err(TypeError::unsupported(
                    format!("{}:{}", field.name, field.spec),
                    "record fields take a fixed subarray shape, not an array type",
                ));
            }
        };
        resolved.push((field.name.clone(), dtype, field.shape.clone()));
    }
    RecordDescr::new(resolved)
}

/// Parses a NumPy dtype name or type code. Native (`<`, `=`) and
/// not-applicable (`|`) byte-order prefixes are accepted; big-endian is
/// accepted only for single-byte types.
pub fn parse_dtype_name(raw: &str) -> Result<DType, TypeError> {
    let trimmed = raw.trim();
    let (big_endian, body) = match trimmed.chars().next() {
        Some('>') => (true, &trimmed[1..]),
        Some('<' | '=' | '|') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let dtype = parse_body(raw, body)?;
    if big_endian && dtype.item_size() > 1 && !matches!(dtype, DType::Bytes(_)) {
        return Err(TypeError::unsupported(raw, "non-native byte order"));
    }
    Ok(dtype)
}

fn parse_body(raw: &str, body: &str) -> Result<DType, TypeError> {
    let dtype = match body {
        "bool" | "bool_" | "?" | "b1" => DType::Bool,
        "int8" | "i1" | "byte" | "b" => DType::I8,
        "int16" | "i2" | "short" | "h" => DType::I16,
        "int32" | "i4" | "intc" | "i" => DType::I32,
        "int64" | "i8" | "int" | "long" | "longlong" | "intp" | "l" | "q" => DType::I64,
        "uint8" | "u1" | "ubyte" | "B" => DType::U8,
        "uint16" | "u2" | "ushort" | "H" => DType::U16,
        "uint32" | "u4" | "uintc" | "I" => DType::U32,
        "uint64" | "u8" | "uint" | "ulong" | "ulonglong" | "uintp" | "L" | "Q" => DType::U64,
        "float32" | "f4" | "single" | "f" => DType::F32,
        "float64" | "f8" | "double" | "float" | "d" => DType::F64,
        "complex64" | "c8" | "csingle" | "F" => DType::Complex64,
        "complex128" | "c16" | "cdouble" | "complex" | "D" => DType::Complex128,
        "float16" | "f2" | "half" | "e" => {
            return Err(TypeError::unsupported(raw, "half-precision floats are not supported"));
        }
        "float96" | "float128" | "f12" | "f16" | "longdouble" | "g" | "complex192"
        | "complex256" | "c24" | "c32" | "clongdouble" | "G" => {
            return Err(TypeError::unsupported(raw, "extended-precision floats are not supported"));
        }
        "object" | "object_" | "O" => {
            return Err(TypeError::unsupported(raw, "dynamic objects are not supported"));
        }
        "void" | "V" => {
            return Err(TypeError::unsupported(raw, "describe records field by field"));
        }
        _ => return parse_parametric(raw, body),
    };
    Ok(dtype)
}

fn parse_parametric(raw: &str, body: &str) -> Result<DType, TypeError> {
    for (prefix, is_datetime) in [
        ("datetime64", true),
        ("timedelta64", false),
        ("M8", true),
        ("m8", false),
    ] {
        let Some(rest) = body.strip_prefix(prefix) else {
            continue;
        };
        let unit = parse_unit_suffix(raw, rest)?;
        return Ok(if is_datetime {
            DType::DateTime64(unit)
        } else {
            DType::TimeDelta64(unit)
        });
    }

    for prefix in ["bytes", "S", "a"] {
        let Some(digits) = body.strip_prefix(prefix) else {
            continue;
        };
        return match digits.parse::<usize>() {
            Ok(0) => Err(TypeError::unsupported(raw, "zero-length byte strings are not supported")),
            Ok(len) => Ok(DType::Bytes(len)),
            Err(_) if digits.is_empty() => Err(TypeError::unsupported(
                raw,
                "byte strings need an explicit length",
            )),
            Err(_) => Err(TypeError::unsupported(raw, "unrecognized dtype name")),
        };
    }

    if body.starts_with('U') || body.starts_with("str") || body.starts_with("unicode") {
        return Err(TypeError::unsupported(raw, "unicode strings are not supported"));
    }
    Err(TypeError::unsupported(raw, "unrecognized dtype name"))
}

fn parse_unit_suffix(raw: &str, rest: &str) -> Result<TimeUnit, TypeError> {
    if rest.is_empty() {
        return Ok(TimeUnit::Generic);
    }
    let inner = rest
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .ok_or_else(|| TypeError::unsupported(raw, "malformed time unit"))?;
    if inner.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(TypeError::unsupported(raw, "time unit multipliers are not supported"));
    }
    TimeUnit::parse(inner).ok_or_else(|| TypeError::unsupported(raw, "unknown time unit"))
}
