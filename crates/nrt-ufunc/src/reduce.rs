use std::cmp::Ordering;

use nrt_dtype::{
    Complex, DType, Descr, Scalar, promote_for_mean_reduction, promote_for_sum_reduction,
};
use nrt_ndarray::{ArrayValue, MemoryOrder, normalize_axis};

use crate::kernels::{BinaryOp, DomainError, LoopSignature};
use crate::registry::{Kernel, lookup};
use crate::{UFuncError, UfuncResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Prod,
    Min,
    Max,
    ArgMin,
    ArgMax,
    Mean,
    Var,
    Std,
    Any,
    All,
}

impl ReduceOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Prod => "prod",
            Self::Min => "min",
            Self::Max => "max",
            Self::ArgMin => "argmin",
            Self::ArgMax => "argmax",
            Self::Mean => "mean",
            Self::Var => "var",
            Self::Std => "std",
            Self::Any => "any",
            Self::All => "all",
        }
    }

    /// Resolves a reduction name: one of the aggregate names, or a binary
    /// ufunc with a reduction (`add`, `multiply`, `minimum`, `maximum`,
    /// `logical_and`, `logical_or`).
    pub fn resolve(name: &str) -> Result<Self, UFuncError> {
        let direct = match name {
            "sum" => Some(Self::Sum),
            "prod" => Some(Self::Prod),
            "min" | "amin" => Some(Self::Min),
            "max" | "amax" => Some(Self::Max),
            "argmin" => Some(Self::ArgMin),
            "argmax" => Some(Self::ArgMax),
            "mean" => Some(Self::Mean),
            "var" => Some(Self::Var),
            "std" => Some(Self::Std),
            "any" => Some(Self::Any),
            "all" => Some(Self::All),
            _ => None,
        };
        if let Some(op) = direct {
            return Ok(op);
        }

        let spec = lookup(name).ok_or_else(|| UFuncError::UnknownUfunc(name.to_string()))?;
        match spec.kernel {
            Kernel::Binary(BinaryOp::Add) => Ok(Self::Sum),
            Kernel::Binary(BinaryOp::Multiply) => Ok(Self::Prod),
            Kernel::Binary(BinaryOp::Minimum) => Ok(Self::Min),
            Kernel::Binary(BinaryOp::Maximum) => Ok(Self::Max),
            Kernel::Binary(BinaryOp::LogicalAnd) => Ok(Self::All),
            Kernel::Binary(BinaryOp::LogicalOr) => Ok(Self::Any),
            _ => Err(UFuncError::NotReducible(spec.name.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReduceOptions {
    /// `None` collapses every axis.
    pub axis: Option<isize>,
    /// Keep reduced axes with extent 1.
    pub keepdims: bool,
    /// Delta degrees of freedom for `var` / `std`.
    pub ddof: usize,
}

impl ReduceOptions {
    #[must_use]
    pub fn along(axis: isize) -> Self {
        Self {
            axis: Some(axis),
            ..Self::default()
        }
    }
}

pub fn reduce(op: &str, array: &ArrayValue, axis: Option<isize>) -> Result<UfuncResult, UFuncError> {
    reduce_with(
        op,
        array,
        &ReduceOptions {
            axis,
            ..ReduceOptions::default()
        },
    )
}

/// Variance with `ddof` delta degrees of freedom.
pub fn reduce_var(array: &ArrayValue, axis: Option<isize>, ddof: usize) -> Result<UfuncResult, UFuncError> {
    reduce_with("var", array, &ReduceOptions { axis, keepdims: false, ddof })
}

pub fn reduce_std(array: &ArrayValue, axis: Option<isize>, ddof: usize) -> Result<UfuncResult, UFuncError> {
    reduce_with("std", array, &ReduceOptions { axis, keepdims: false, ddof })
}

/// Reduces `array` with `op` over `options.axis` (every axis when `None`).
///
/// Without `keepdims`, a full reduction yields a scalar and an axis
/// reduction yields an array of the remaining axes.
pub fn reduce_with(
    op: &str,
    array: &ArrayValue,
    options: &ReduceOptions,
) -> Result<UfuncResult, UFuncError> {
    let op = ReduceOp::resolve(op)?;
    let Some(dtype) = array.dtype() else {
        return Err(UFuncError::no_loop(op.as_str(), [array.descr()]));
    };
    let reducer = Reducer::new(op, dtype, options.ddof, array.size() == 0)?;
    let values = array.to_scalars();
    let shape = array.shape();
    log::trace!("reduce {} over {shape:?} axis={:?} into {}", op.as_str(), options.axis, reducer.out);

    let Some(axis) = options.axis else {
        let lane: Vec<&Scalar> = values.iter().collect();
        let value = reducer.lane(&lane)?;
        return if options.keepdims {
            let kept = vec![1; shape.len()];
            Ok(UfuncResult::Array(ArrayValue::from_scalars(
                &kept,
                reducer.out,
                &[value],
                MemoryOrder::C,
            )?))
        } else {
            Ok(UfuncResult::Scalar(value))
        };
    };

    let axis = normalize_axis(axis, shape.len())?;
    let axis_len = shape[axis];
    let inner = shape[axis + 1..].iter().product::<usize>();
    let outer = shape[..axis].iter().product::<usize>();

    let mut out_values = Vec::with_capacity(outer * inner);
    let mut lane = Vec::with_capacity(axis_len);
    for outer_idx in 0..outer {
        let base = outer_idx * axis_len * inner;
        for inner_idx in 0..inner {
            lane.clear();
            lane.extend((0..axis_len).map(|k| &values[base + inner_idx + k * inner]));
            out_values.push(reducer.lane(&lane)?);
        }
    }

    let out_shape = reduced_shape(shape, axis, options.keepdims);
    Ok(UfuncResult::Array(ArrayValue::from_scalars(
        &out_shape,
        reducer.out,
        &out_values,
        MemoryOrder::C,
    )?))
}

#[must_use]
fn reduced_shape(shape: &[usize], axis: usize, keepdims: bool) -> Vec<usize> {
    if keepdims {
        shape
            .iter()
            .enumerate()
            .map(|(idx, &dim)| if idx == axis { 1 } else { dim })
            .collect()
    } else {
        shape
            .iter()
            .enumerate()
            .filter_map(|(idx, &dim)| (idx != axis).then_some(dim))
            .collect()
    }
}

/// Reduction of one lane, with the input and result dtypes fixed up front.
struct Reducer {
    op: ReduceOp,
    input: DType,
    out: DType,
    ddof: usize,
    // min/max fold through the elementwise kernel
    fold: Option<(BinaryOp, LoopSignature)>,
}

impl Reducer {
    /// `empty` marks an input without elements; its sum keeps the input
    /// dtype instead of the widened accumulator.
    fn new(op: ReduceOp, input: DType, ddof: usize, empty: bool) -> Result<Self, UFuncError> {
        let no_loop = || UFuncError::no_loop(op.as_str(), [&Descr::from(input)]);
        let numeric = input == DType::Bool || input.is_numeric();
        let (out, fold) = match op {
            ReduceOp::Sum if numeric || matches!(input, DType::TimeDelta64(_)) => {
                let out = if empty {
                    input
                } else {
                    promote_for_sum_reduction(input)
                };
                (out, None)
            }
            ReduceOp::Prod if numeric => (promote_for_sum_reduction(input), None),
            ReduceOp::Min | ReduceOp::Max => {
                let kernel = if op == ReduceOp::Min {
                    BinaryOp::Minimum
                } else {
                    BinaryOp::Maximum
                };
                let sig = kernel.signature(input, input).ok_or_else(no_loop)?;
                (sig.outputs[0], Some((kernel, sig)))
            }
            ReduceOp::ArgMin | ReduceOp::ArgMax if numeric || input.is_temporal() => {
                (DType::I64, None)
            }
            ReduceOp::Mean if numeric => (promote_for_mean_reduction(input), None),
            ReduceOp::Var | ReduceOp::Std if numeric => {
                let out = match promote_for_mean_reduction(input) {
                    DType::Complex64 => DType::F32,
                    DType::Complex128 => DType::F64,
                    other => other,
                };
                (out, None)
            }
            ReduceOp::Any | ReduceOp::All if numeric || input.is_temporal() => (DType::Bool, None),
            _ => return Err(no_loop()),
        };
        Ok(Self {
            op,
            input,
            out,
            ddof,
            fold,
        })
    }

    fn lane(&self, lane: &[&Scalar]) -> Result<Scalar, UFuncError> {
        let empty = || UFuncError::EmptyReduction {
            op: self.op.as_str(),
        };
        match self.op {
            ReduceOp::Sum => Ok(self.sum(lane)),
            ReduceOp::Prod => Ok(self.product(lane)),
            ReduceOp::Min | ReduceOp::Max => {
                let Some((kernel, sig)) = &self.fold else {
                    return Err(UFuncError::no_loop(self.op.as_str(), [&Descr::from(self.input)]));
                };
                let (first, rest) = lane.split_first().ok_or_else(empty)?;
                rest.iter().try_fold((*first).clone(), |acc, value| {
                    kernel
                        .eval(sig, &acc, value)
                        .map_err(|DomainError(detail)| UFuncError::Domain {
                            name: self.op.as_str().to_string(),
                            detail,
                        })
                })
            }
            ReduceOp::ArgMin | ReduceOp::ArgMax => {
                let position = arg_extreme(lane, self.op == ReduceOp::ArgMax).ok_or_else(empty)?;
                Ok(Scalar::I64(position as i64))
            }
            ReduceOp::Mean => Ok(self.mean(lane)),
            ReduceOp::Var => Ok(Scalar::from_f64(self.out, self.variance(lane))),
            ReduceOp::Std => Ok(Scalar::from_f64(self.out, self.variance(lane).sqrt())),
            ReduceOp::Any => Ok(Scalar::Bool(lane.iter().any(|v| v.is_truthy() == Some(true)))),
            ReduceOp::All => Ok(Scalar::Bool(lane.iter().all(|v| v.is_truthy() == Some(true)))),
        }
    }

    fn sum(&self, lane: &[&Scalar]) -> Scalar {
        if lane.is_empty() {
            return Scalar::zero(self.out);
        }
        if self.input.is_float() {
            let reals: Vec<f64> = lane.iter().filter_map(|v| v.as_f64()).collect();
            Scalar::from_f64(self.out, pairwise_sum(&reals))
        } else if self.input.is_complex() {
            Scalar::from_complex(self.out, complex_sum(lane))
        } else {
            let total = lane
                .iter()
                .filter_map(|v| v.as_i128())
                .fold(0i128, i128::wrapping_add);
            Scalar::from_i128(self.out, total)
        }
    }

    fn product(&self, lane: &[&Scalar]) -> Scalar {
        if self.input.is_float() {
            Scalar::from_f64(self.out, lane.iter().filter_map(|v| v.as_f64()).product())
        } else if self.input.is_complex() {
            let total = lane
                .iter()
                .filter_map(|v| v.as_complex())
                .fold(Complex::new(1.0, 0.0), |acc, z| acc * z);
            Scalar::from_complex(self.out, total)
        } else {
            // wrap at the accumulator width after every step
            let total = lane.iter().filter_map(|v| v.as_i128()).fold(1i128, |acc, v| {
                Scalar::from_i128(self.out, acc.wrapping_mul(v))
                    .as_i128()
                    .unwrap_or_default()
            });
            Scalar::from_i128(self.out, total)
        }
    }

    fn mean(&self, lane: &[&Scalar]) -> Scalar {
        let n = lane.len() as f64;
        if self.input.is_complex() {
            if lane.is_empty() {
                return Scalar::from_complex(self.out, Complex::new(f64::NAN, 0.0));
            }
            return Scalar::from_complex(self.out, complex_sum(lane).unscale(n));
        }
        if lane.is_empty() {
            return Scalar::from_f64(self.out, f64::NAN);
        }
        let reals: Vec<f64> = lane.iter().filter_map(|v| v.as_f64()).collect();
        Scalar::from_f64(self.out, pairwise_sum(&reals) / n)
    }

    /// Population variance (`ddof = 0`) or the `ddof`-corrected estimate;
    /// complex inputs sum the variances of both components.
    fn variance(&self, lane: &[&Scalar]) -> f64 {
        let divisor = lane.len() as f64 - self.ddof as f64;
        if divisor <= 0.0 {
            return f64::NAN;
        }
        let m2 = if self.input.is_complex() {
            let values: Vec<Complex<f64>> = lane.iter().filter_map(|v| v.as_complex()).collect();
            welford_m2(values.iter().map(|z| z.re)) + welford_m2(values.iter().map(|z| z.im))
        } else {
            welford_m2(lane.iter().filter_map(|v| v.as_f64()))
        };
        m2 / divisor
    }
}

const PW_BLOCKSIZE: usize = 128;

/// Pairwise summation: eight running partials per block of up to
/// `PW_BLOCKSIZE` elements, halving larger inputs recursively.
fn pairwise_sum(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    if n < 8 {
        // -0.0 keeps the sign of an all-negative-zero lane
        return values.iter().fold(-0.0, |acc, &v| acc + v);
    }
    if n <= PW_BLOCKSIZE {
        let mut r = [0.0f64; 8];
        r.copy_from_slice(&values[..8]);
        let mut i = 8;
        while i + 8 <= n {
            for (k, partial) in r.iter_mut().enumerate() {
                *partial += values[i + k];
            }
            i += 8;
        }
        let mut res = ((r[0] + r[1]) + (r[2] + r[3])) + ((r[4] + r[5]) + (r[6] + r[7]));
        for &v in &values[i..] {
            res += v;
        }
        return res;
    }
    let mut half = n / 2;
    half -= half % 8;
    pairwise_sum(&values[..half]) + pairwise_sum(&values[half..])
}

fn complex_sum(lane: &[&Scalar]) -> Complex<f64> {
    let values: Vec<Complex<f64>> = lane.iter().filter_map(|v| v.as_complex()).collect();
    let re: Vec<f64> = values.iter().map(|z| z.re).collect();
    let im: Vec<f64> = values.iter().map(|z| z.im).collect();
    Complex::new(pairwise_sum(&re), pairwise_sum(&im))
}

/// Sum of squared deviations from the mean, accumulated with Welford's
/// update.
fn welford_m2(values: impl Iterator<Item = f64>) -> f64 {
    let mut count = 0.0f64;
    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    for x in values {
        count += 1.0;
        let delta = x - mean;
        mean += delta / count;
        m2 += delta * (x - mean);
    }
    m2
}

/// Position of the first extremal element; the first NaN wins outright.
fn arg_extreme(lane: &[&Scalar], max: bool) -> Option<usize> {
    let is_nan = |v: &Scalar| {
        v.as_complex()
            .is_some_and(|z| z.re.is_nan() || z.im.is_nan())
    };
    if let Some(position) = lane.iter().position(|v| is_nan(v)) {
        return Some(position);
    }
    let wanted = if max { Ordering::Greater } else { Ordering::Less };
    let mut best: Option<(usize, &Scalar)> = None;
    for (idx, &value) in lane.iter().enumerate() {
        match best {
            Some((_, current)) if order(value, current) != Some(wanted) => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

fn order(a: &Scalar, b: &Scalar) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i128(), b.as_i128()) {
        return Some(x.cmp(&y));
    }
    let (x, y) = (a.as_complex()?, b.as_complex()?);
    match x.re.partial_cmp(&y.re)? {
        Ordering::Equal => x.im.partial_cmp(&y.im),
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ReduceOp, ReduceOptions, pairwise_sum, reduce, reduce_std, reduce_var, reduce_with,
        reduced_shape, welford_m2,
    };
    use crate::{UFuncError, UfuncResult};
    use nrt_dtype::{Complex, DType, Scalar};
    use nrt_ndarray::{ArrayValue, MemoryOrder};
    use nrt_runtime::ErrorKind;

    fn scalar(result: UfuncResult) -> Scalar {
        result.into_scalar().expect("scalar result")
    }

    fn array(result: UfuncResult) -> ArrayValue {
        result.into_array().expect("array result")
    }

    fn grid() -> ArrayValue {
        ArrayValue::from_f64(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("grid")
    }

    #[test]
    fn names_resolve_directly_or_through_the_registry() {
        assert_eq!(ReduceOp::resolve("sum"), Ok(ReduceOp::Sum));
        assert_eq!(ReduceOp::resolve("add"), Ok(ReduceOp::Sum));
        assert_eq!(ReduceOp::resolve("maximum"), Ok(ReduceOp::Max));
        assert_eq!(ReduceOp::resolve("logical_or"), Ok(ReduceOp::Any));
        let err = ReduceOp::resolve("sqrt").expect_err("unary ufunc");
        assert!(matches!(err, UFuncError::NotReducible(_)));
        assert_eq!(
            ReduceOp::resolve("median").expect_err("unknown").kind(),
            ErrorKind::UnknownUfunc
        );
    }

    #[test]
    fn full_reductions() {
        let a = grid();
        assert_eq!(scalar(reduce("sum", &a, None).expect("sum")), Scalar::F64(21.0));
        assert_eq!(scalar(reduce("prod", &a, None).expect("prod")), Scalar::F64(720.0));
        assert_eq!(scalar(reduce("min", &a, None).expect("min")), Scalar::F64(1.0));
        assert_eq!(scalar(reduce("max", &a, None).expect("max")), Scalar::F64(6.0));
        assert_eq!(scalar(reduce("argmax", &a, None).expect("argmax")), Scalar::I64(5));
        assert_eq!(scalar(reduce("mean", &a, None).expect("mean")), Scalar::F64(3.5));
        let Scalar::F64(var) = scalar(reduce("var", &a, None).expect("var")) else {
            panic!("float variance");
        };
        assert!((var - 35.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn axis_reductions_and_keepdims() {
        let a = grid();
        let rows = array(reduce("sum", &a, Some(1)).expect("sum rows"));
        assert_eq!(rows.shape(), &[2]);
        assert_eq!(rows.to_scalars(), vec![Scalar::F64(6.0), Scalar::F64(15.0)]);

        let cols = array(reduce("add", &a, Some(-2)).expect("sum cols"));
        assert_eq!(cols.to_scalars(), [5.0, 7.0, 9.0].map(Scalar::F64).to_vec());

        let kept = array(
            reduce_with(
                "max",
                &a,
                &ReduceOptions {
                    axis: Some(0),
                    keepdims: true,
                    ddof: 0,
                },
            )
            .expect("keepdims"),
        );
        assert_eq!(kept.shape(), &[1, 3]);

        let all = array(
            reduce_with(
                "sum",
                &a,
                &ReduceOptions {
                    axis: None,
                    keepdims: true,
                    ddof: 0,
                },
            )
            .expect("keepdims none"),
        );
        assert_eq!(all.shape(), &[1, 1]);
        assert_eq!(reduced_shape(&[2, 3, 4], 1, false), vec![2, 4]);
    }

    #[test]
    fn axis_out_of_range_is_index_error() {
        let err = reduce("sum", &grid(), Some(2)).expect_err("bad axis");
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
        assert!(reduce("sum", &grid(), Some(-3)).is_err());
    }

    #[test]
    fn empty_inputs_use_identities_or_fail() {
        let empty = ArrayValue::zeros(&[0], DType::F64).expect("empty");
        assert_eq!(scalar(reduce("sum", &empty, None).expect("sum")), Scalar::F64(0.0));
        assert_eq!(scalar(reduce("prod", &empty, None).expect("prod")), Scalar::F64(1.0));
        assert_eq!(scalar(reduce("any", &empty, None).expect("any")), Scalar::Bool(false));
        assert_eq!(scalar(reduce("all", &empty, None).expect("all")), Scalar::Bool(true));
        let Scalar::F64(mean) = scalar(reduce("mean", &empty, None).expect("mean")) else {
            panic!("float mean");
        };
        assert!(mean.is_nan());
        for op in ["min", "max", "argmin", "argmax", "maximum"] {
            let err = reduce(op, &empty, None).expect_err(op);
            assert_eq!(err.kind(), ErrorKind::EmptyReduction, "{op}");
        }

        let cols = ArrayValue::zeros(&[0, 3], DType::I32).expect("0x3");
        let sums = array(reduce("sum", &cols, Some(0)).expect("sum over empty axis"));
        assert_eq!(sums.to_scalars(), vec![Scalar::I32(0); 3]);
        assert_eq!(sums.dtype(), Some(DType::I32));
        assert!(reduce("max", &cols, Some(0)).is_err());
        let none = array(reduce("max", &cols, Some(1)).expect("no lanes"));
        assert_eq!(none.shape(), &[0]);
    }

    #[test]
    fn empty_sums_are_zero_of_the_input_dtype() {
        for dtype in [DType::Bool, DType::I8, DType::I32, DType::U16, DType::F32, DType::Complex64] {
            let empty = ArrayValue::zeros(&[0], dtype).expect("empty");
            assert_eq!(
                scalar(reduce("sum", &empty, None).expect("sum")),
                Scalar::zero(dtype),
                "{dtype}"
            );
            assert_eq!(
                scalar(reduce("add", &empty, None).expect("add.reduce")),
                Scalar::zero(dtype),
                "{dtype}"
            );
        }
        let ones = ArrayValue::from_scalars(&[2], DType::I32, &[Scalar::I32(1), Scalar::I32(2)], MemoryOrder::C)
            .expect("i32");
        assert_eq!(scalar(reduce("sum", &ones, None).expect("sum")), Scalar::I64(3));
    }

    #[test]
    fn empty_float_sums_are_positive_zero() {
        let empty = ArrayValue::zeros(&[0], DType::F64).expect("empty");
        let Scalar::F64(total) = scalar(reduce("sum", &empty, None).expect("sum")) else {
            panic!("float sum");
        };
        assert!(total.is_sign_positive());

        let lanes = ArrayValue::zeros(&[2, 0], DType::F64).expect("2x0");
        for value in array(reduce("sum", &lanes, Some(1)).expect("sum rows")).to_scalars() {
            let Scalar::F64(total) = value else {
                panic!("float lane");
            };
            assert!(total.is_sign_positive());
        }

        assert!(pairwise_sum(&[]).is_sign_positive());
        assert!(pairwise_sum(&[-0.0, -0.0]).is_sign_negative());
    }

    #[test]
    fn integer_sums_widen_and_wrap() {
        let bools = ArrayValue::from_scalars(
            &[3],
            DType::Bool,
            &[Scalar::Bool(true), Scalar::Bool(false), Scalar::Bool(true)],
            MemoryOrder::C,
        )
        .expect("bools");
        assert_eq!(scalar(reduce("sum", &bools, None).expect("sum")), Scalar::I64(2));

        let small = ArrayValue::from_scalars(&[2], DType::I8, &[Scalar::I8(100), Scalar::I8(100)], MemoryOrder::C)
            .expect("i8");
        assert_eq!(scalar(reduce("sum", &small, None).expect("sum")), Scalar::I64(200));
        assert_eq!(scalar(reduce("mean", &small, None).expect("mean")), Scalar::F64(100.0));

        let big = ArrayValue::from_i64(&[2], &[i64::MAX, 1]).expect("i64");
        assert_eq!(scalar(reduce("sum", &big, None).expect("sum")), Scalar::I64(i64::MIN));
        let big = ArrayValue::from_i64(&[2], &[i64::MAX, 2]).expect("i64");
        assert_eq!(scalar(reduce("prod", &big, None).expect("prod")), Scalar::I64(-2));
    }

    #[test]
    fn nan_propagates_and_argmax_returns_first_nan() {
        let a = ArrayValue::from_f64(&[4], &[1.0, f64::NAN, 7.0, f64::NAN]).expect("nan");
        let Scalar::F64(max) = scalar(reduce("max", &a, None).expect("max")) else {
            panic!("float max");
        };
        assert!(max.is_nan());
        assert_eq!(scalar(reduce("argmax", &a, None).expect("argmax")), Scalar::I64(1));
        assert_eq!(scalar(reduce("argmin", &a, None).expect("argmin")), Scalar::I64(1));

        let ties = ArrayValue::from_i64(&[5], &[3, 9, 1, 9, 1]).expect("ties");
        assert_eq!(scalar(reduce("argmax", &ties, None).expect("argmax")), Scalar::I64(1));
        assert_eq!(scalar(reduce("argmin", &ties, None).expect("argmin")), Scalar::I64(2));
    }

    #[test]
    fn variance_with_ddof() {
        let a = ArrayValue::from_f64(&[4], &[2.0, 4.0, 4.0, 6.0]).expect("a");
        let float = |result: UfuncResult| match scalar(result) {
            Scalar::F64(v) => v,
            other => panic!("expected float64, got {other:?}"),
        };
        assert!((float(reduce_var(&a, None, 0).expect("population")) - 2.0).abs() < 1e-12);
        assert!((float(reduce_var(&a, None, 1).expect("sample")) - 8.0 / 3.0).abs() < 1e-12);
        assert!((float(reduce_std(&a, None, 0).expect("std")) - 2f64.sqrt()).abs() < 1e-12);
        let Scalar::F64(undefined) = scalar(reduce_var(&a, None, 4).expect("ddof = n")) else {
            panic!("float");
        };
        assert!(undefined.is_nan());
    }

    #[test]
    fn complex_reductions() {
        let z = ArrayValue::from_scalars(
            &[2],
            DType::Complex128,
            &[
                Scalar::Complex128(Complex::new(1.0, 1.0)),
                Scalar::Complex128(Complex::new(3.0, -1.0)),
            ],
            MemoryOrder::C,
        )
        .expect("complex");
        assert_eq!(
            scalar(reduce("sum", &z, None).expect("sum")),
            Scalar::Complex128(Complex::new(4.0, 0.0))
        );
        assert_eq!(scalar(reduce("var", &z, None).expect("var")), Scalar::F64(2.0));
        assert_eq!(scalar(reduce("argmax", &z, None).expect("argmax")), Scalar::I64(1));
    }

    #[test]
    fn byte_strings_do_not_reduce() {
        let bytes = ArrayValue::zeros(&[2], DType::Bytes(4)).expect("bytes");
        let err = reduce("sum", &bytes, None).expect_err("bytes");
        assert_eq!(err.kind(), ErrorKind::DType);
    }

    #[test]
    fn pairwise_sum_is_accurate_on_long_inputs() {
        let values = vec![0.1f64; 10_000];
        let pairwise = pairwise_sum(&values);
        assert!((pairwise - 1000.0).abs() < 1e-9);
        assert_eq!(pairwise_sum(&[1.0, 2.0, 3.0]), 6.0);
        assert_eq!(pairwise_sum(&(1..=200).map(f64::from).collect::<Vec<_>>()), 20100.0);
    }

    #[test]
    fn welford_matches_two_pass() {
        let values = [1e9 + 4.0, 1e9 + 7.0, 1e9 + 13.0, 1e9 + 16.0];
        assert!((welford_m2(values.into_iter()) / 4.0 - 22.5).abs() < 1e-6);
    }
}
