use nrt_dtype::{DType, Scalar, can_cast_same_kind};
use nrt_ndarray::{ArrayError, ArrayValue, MemoryOrder, broadcast_shapes, element_count};
use nrt_runtime::{
    DecisionAction, DecisionLedger, ExecutionMode, RuntimeConfig, record_decision,
};

use crate::kernels::{DomainError, LoopSignature};
use crate::reduce::{ReduceOptions, reduce_with};
use crate::registry::{UfuncSpec, lookup};
use crate::{Operand, UFuncError, UfuncResult};

/// Entry point for named ufunc calls. Owns the runtime configuration it
/// checks capabilities against and the ledger of its own decisions.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    config: RuntimeConfig,
    ledger: DecisionLedger,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            ledger: DecisionLedger::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.config.mode
    }

    pub fn set_mode(&mut self, mode: ExecutionMode) {
        self.config.mode = mode;
    }

    #[must_use]
    pub fn ledger(&self) -> &DecisionLedger {
        &self.ledger
    }

    /// Applies ufunc `name` elementwise over the broadcast of `operands`.
    ///
    /// With `out`, results are cast (same-kind) into the given arrays, which
    /// must match the broadcast shape exactly, and the written arrays are
    /// returned. Nothing is written when any check or element fails.
    pub fn dispatch(
        &mut self,
        name: &str,
        operands: &[Operand],
        out: Option<&mut [ArrayValue]>,
    ) -> Result<UfuncResult, UFuncError> {
        let outcome = self.run(name, operands, out);
        self.note(name, &outcome, |result| format!("result shape {:?}", result.shape()));
        outcome
    }

    /// Axis reduction through the same capability and ledger path.
    pub fn reduce(
        &mut self,
        op: &str,
        array: &ArrayValue,
        options: &ReduceOptions,
    ) -> Result<UfuncResult, UFuncError> {
        let outcome = reduce_with(op, array, options);
        self.note(op, &outcome, |result| format!("reduced to shape {:?}", result.shape()));
        outcome
    }

    fn note(
        &mut self,
        op: &str,
        outcome: &Result<UfuncResult, UFuncError>,
        describe: impl FnOnce(&UfuncResult) -> String,
    ) {
        if !self.config.record_decisions {
            return;
        }
        let (action, note) = match outcome {
            Ok(result) => (DecisionAction::Allow, describe(result)),
            Err(err) => (DecisionAction::Reject(err.kind()), err.to_string()),
        };
        record_decision(&mut self.ledger, op, self.config.mode, action, note);
    }

    fn check_capabilities(&self, spec: &UfuncSpec) -> Result<(), UFuncError> {
        if !spec.supports(self.config.mode) {
            return Err(UFuncError::UnsupportedMode {
                name: spec.name.to_string(),
                mode: self.config.mode,
            });
        }
        if let Some(caveat) = spec.blocked_on(&self.config.platform) {
            return Err(UFuncError::PlatformCaveat {
                name: spec.name.to_string(),
                os: caveat.os.to_string(),
                pointer_width: caveat.pointer_width,
                reason: caveat.reason,
            });
        }
        Ok(())
    }

    fn run(
        &self,
        name: &str,
        operands: &[Operand],
        out: Option<&mut [ArrayValue]>,
    ) -> Result<UfuncResult, UFuncError> {
        let spec = lookup(name).ok_or_else(|| UFuncError::UnknownUfunc(name.to_string()))?;
        self.check_capabilities(spec)?;
        if operands.len() != spec.arity() {
            return Err(UFuncError::Arity {
                name: spec.name.to_string(),
                expected: spec.arity(),
                actual: operands.len(),
            });
        }

        let has_array = operands.iter().any(Operand::is_array);
        if has_array && spec.requires_output && out.is_none() {
            return Err(UFuncError::OutputRequired {
                name: spec.name.to_string(),
            });
        }
        let out_count = out.as_deref().map(<[ArrayValue]>::len);
        if out_count.is_some_and(|count| count != spec.nout()) {
            return Err(UFuncError::OutputCount {
                name: spec.name.to_string(),
                expected: spec.nout(),
                actual: out_count.unwrap_or_default(),
            });
        }

        let shapes: Vec<&[usize]> = operands.iter().map(Operand::shape).collect();
        let shape = broadcast_shapes(&shapes)?;

        let descrs: Vec<_> = operands.iter().map(Operand::descr).collect();
        let dtypes: Option<Vec<DType>> = descrs.iter().map(|d| d.as_dtype()).collect();
        let sig = dtypes
            .and_then(|dtypes| spec.kernel.signature(&dtypes))
            .ok_or_else(|| UFuncError::no_loop(spec.name, &descrs))?;
        log::debug!(
            "dispatch {} mode={} shape={shape:?} loop={sig}",
            spec.name,
            self.config.mode.as_str()
        );

        if let Some(outs) = out.as_deref() {
            check_outputs(spec.name, &sig, &shape, outs)?;
        }

        let results = broadcast_eval(spec, &sig, operands, &shape)?;

        match out {
            Some(outs) => {
                for (dst, values) in outs.iter_mut().zip(&results) {
                    dst.assign_scalars(values)?;
                }
                Ok(match outs {
                    [first] => UfuncResult::Array(first.clone()),
                    [first, second] => UfuncResult::ArrayPair(first.clone(), second.clone()),
                    _ => unreachable_arity(spec)?,
                })
            }
            None if !has_array => {
                let mut values = results.into_iter().filter_map(|mut v| v.pop());
                match (values.next(), values.next()) {
                    (Some(first), None) => Ok(UfuncResult::Scalar(first)),
                    (Some(first), Some(second)) => Ok(UfuncResult::Pair(first, second)),
                    _ => unreachable_arity(spec),
                }
            }
            None => {
                let mut arrays = results
                    .iter()
                    .zip(&sig.outputs)
                    .map(|(values, &dtype)| {
                        ArrayValue::from_scalars(&shape, dtype, values, MemoryOrder::C)
                    })
                    .collect::<Result<Vec<_>, ArrayError>>()?
                    .into_iter();
                match (arrays.next(), arrays.next()) {
                    (Some(first), None) => Ok(UfuncResult::Array(first)),
                    (Some(first), Some(second)) => Ok(UfuncResult::ArrayPair(first, second)),
                    _ => unreachable_arity(spec),
                }
            }
        }
    }
}

fn unreachable_arity<T>(spec: &UfuncSpec) -> Result<T, UFuncError> {
    Err(UFuncError::OutputCount {
        name: spec.name.to_string(),
        expected: spec.nout(),
        actual: 0,
    })
}

fn check_outputs(
    name: &str,
    sig: &LoopSignature,
    shape: &[usize],
    outs: &[ArrayValue],
) -> Result<(), UFuncError> {
    for (dst, &result) in outs.iter().zip(&sig.outputs) {
        if dst.shape() != shape {
            return Err(UFuncError::OutputShape {
                expected: shape.to_vec(),
                actual: dst.shape().to_vec(),
            });
        }
        let castable = dst
            .dtype()
            .is_some_and(|target| can_cast_same_kind(result, target));
        if !castable {
            return Err(UFuncError::OutputCast {
                name: name.to_string(),
                from: result.to_string(),
                to: dst.descr().to_string(),
            });
        }
        if !dst.is_writeable() {
            return Err(ArrayError::ReadOnly.into());
        }
    }
    Ok(())
}

#[must_use]
fn contiguous_strides_elems(shape: &[usize]) -> Vec<usize> {
    if shape.is_empty() {
        return Vec::new();
    }

    let mut strides = vec![0usize; shape.len()];
    let mut stride = 1usize;
    for (idx, &dim) in shape.iter().enumerate().rev() {
        strides[idx] = stride;
        stride = stride.saturating_mul(dim);
    }
    strides
}

/// Per-axis element step of a source aligned to the trailing axes of the
/// output; stretched (extent 1) axes step by 0.
#[must_use]
fn aligned_broadcast_axis_steps(
    out_ndim: usize,
    src_shape: &[usize],
    src_strides: &[usize],
) -> Vec<usize> {
    if out_ndim == 0 {
        return Vec::new();
    }

    let mut axis_steps = vec![0usize; out_ndim];
    let offset = out_ndim - src_shape.len();

    for (axis, (&dim, &stride)) in src_shape.iter().zip(src_strides).enumerate() {
        axis_steps[axis + offset] = if dim == 1 { 0 } else { stride };
    }

    axis_steps
}

/// Runs the kernel at every position of `shape`, returning one row-major
/// value list per output.
fn broadcast_eval(
    spec: &UfuncSpec,
    sig: &LoopSignature,
    operands: &[Operand],
    shape: &[usize],
) -> Result<Vec<Vec<Scalar>>, UFuncError> {
    let inputs = operands
        .iter()
        .zip(&sig.inputs)
        .map(|(operand, &dtype)| {
            operand
                .values()
                .iter()
                .map(|value| value.cast(dtype))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let out_count = element_count(shape)?;
    let steps: Vec<Vec<usize>> = operands
        .iter()
        .map(|operand| {
            let src = operand.shape();
            aligned_broadcast_axis_steps(shape.len(), src, &contiguous_strides_elems(src))
        })
        .collect();
    log::trace!("{}: {} element(s) through {:?}", spec.name, out_count, spec.kernel);

    let mut first = Vec::with_capacity(out_count);
    let mut second = Vec::with_capacity(if spec.nout() == 2 { out_count } else { 0 });
    let mut out_multi = vec![0usize; shape.len()];
    let mut cursors = vec![0usize; operands.len()];
    let mut args: Vec<&Scalar> = Vec::with_capacity(operands.len());

    for flat in 0..out_count {
        args.clear();
        args.extend(inputs.iter().zip(&cursors).map(|(values, &at)| &values[at]));
        let (value, extra) = spec
            .kernel
            .eval(sig, &args)
            .map_err(|DomainError(detail)| UFuncError::Domain {
                name: spec.name.to_string(),
                detail,
            })?;
        first.push(value);
        second.extend(extra);

        if flat + 1 == out_count || shape.is_empty() {
            continue;
        }

        // Advance the output index as an odometer, moving each source cursor
        // by its axis step instead of re-deriving it from the multi-index.
        for axis in (0..shape.len()).rev() {
            out_multi[axis] += 1;
            for (cursor, step) in cursors.iter_mut().zip(&steps) {
                *cursor += step[axis];
            }

            if out_multi[axis] < shape[axis] {
                break;
            }

            out_multi[axis] = 0;
            for (cursor, step) in cursors.iter_mut().zip(&steps) {
                *cursor -= step[axis] * shape[axis];
            }
        }
    }

    let mut results = vec![first];
    if spec.nout() == 2 {
        results.push(second);
    }
    Ok(results)
}
