use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use nrt_dtype::{DType, Scalar};
use nrt_ndarray::{ArrayError, ArrayValue};

use crate::RandomError;
use crate::mt19937::Mt19937;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
const MIX_CONST1: u64 = 0xBF58_476D_1CE4_E5B9;
const MIX_CONST2: u64 = 0x94D0_49BB_1331_11EB;

static ENTROPY_COUNTER: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static THREAD_STATE: RefCell<RandomState> = RefCell::new(RandomState::new());
}

/// One generator domain: an MT19937 key plus the cached second Gaussian of
/// the polar method.
///
/// The state starts Unseeded. `seed`/`seed_u64` seed it deterministically;
/// otherwise the first draw seeds it from process entropy. It is not
/// `Clone`: a second domain comes from [`RandomState::spawn`] or from a
/// snapshot.
#[derive(Debug, Default)]
pub struct RandomState {
    pub(crate) engine: Option<Mt19937>,
    pub(crate) gauss: Option<f64>,
}

impl RandomState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        let mut state = Self::new();
        state.seed_u64(seed);
        state
    }

    #[must_use]
    pub fn is_seeded(&self) -> bool {
        self.engine.is_some()
    }

    /// Seeds from a bool or integer scalar. Floats, complex, temporal,
    /// bytes, records and negative integers are rejected and leave the
    /// state untouched.
    pub fn seed(&mut self, seed: &Scalar) -> Result<(), RandomError> {
        let value = match seed.dtype() {
            Some(dt) if dt == DType::Bool || dt.is_integer() => seed.as_i128(),
            _ => None,
        };
        let value = value.ok_or_else(|| RandomError::InvalidSeed(seed.to_string()))?;
        let value = u64::try_from(value).map_err(|_| RandomError::InvalidSeed(value.to_string()))?;
        self.seed_u64(value);
        Ok(())
    }

    /// Seeds below 2^32 use `init_genrand`; wider seeds are split into
    /// little-endian 32-bit words for `init_by_array`.
    pub fn seed_u64(&mut self, seed: u64) {
        let engine = match u32::try_from(seed) {
            Ok(narrow) => Mt19937::from_u32_seed(narrow),
            Err(_) => Mt19937::from_words(&[seed as u32, (seed >> 32) as u32]),
        };
        log::debug!("random state seeded with {seed}");
        self.engine = Some(engine);
        self.gauss = None;
    }

    pub(crate) fn engine(&mut self) -> &mut Mt19937 {
        self.engine.get_or_insert_with(|| {
            let words = entropy_words();
            log::debug!("random state seeded from entropy");
            Mt19937::from_words(&words)
        })
    }

    /// A new, independent domain re-seeded from four words drawn from this
    /// one. The child shares neither key nor Gaussian cache with the parent.
    pub fn spawn(&mut self) -> Self {
        let engine = self.engine();
        let words: [u32; 4] = std::array::from_fn(|_| engine.next_u32());
        log::debug!("spawned random state from parent draws");
        Self {
            engine: Some(Mt19937::from_words(&words)),
            gauss: None,
        }
    }

    /// In-place Fisher-Yates over a one-dimensional writeable array.
    /// Fewer than two elements consume no draws.
    pub fn shuffle(&mut self, array: &mut ArrayValue) -> Result<(), RandomError> {
        if array.ndim() != 1 {
            return Err(RandomError::NotOneDimensional { ndim: array.ndim() });
        }
        if !array.is_writeable() {
            return Err(ArrayError::ReadOnly.into());
        }
        let len = array.size();
        if len < 2 {
            return Ok(());
        }
        let engine = self.engine();
        for i in (1..len).rev() {
            let j = engine.interval(i as u64) as usize;
            array.swap_flat(i, j)?;
        }
        Ok(())
    }

    /// Same permutation stream as [`RandomState::shuffle`], over a slice.
    pub fn shuffle_slice<T>(&mut self, items: &mut [T]) {
        if items.len() < 2 {
            return;
        }
        let engine = self.engine();
        for i in (1..items.len()).rev() {
            let j = engine.interval(i as u64) as usize;
            items.swap(i, j);
        }
    }
}

/// Runs `f` against this thread's default domain, created Unseeded on first
/// use. Domains are never shared between threads.
///
/// Calling back into `with_thread_state` or `install_thread_state` from
/// inside `f` fails with [`RandomError::ThreadStateBusy`].
pub fn with_thread_state<R>(f: impl FnOnce(&mut RandomState) -> R) -> Result<R, RandomError> {
    THREAD_STATE.with(|cell| {
        let mut state = cell.try_borrow_mut().map_err(|_| RandomError::ThreadStateBusy)?;
        Ok(f(&mut state))
    })
}

/// Replaces this thread's default domain, returning the previous one.
pub fn install_thread_state(state: RandomState) -> Result<RandomState, RandomError> {
    THREAD_STATE.with(|cell| {
        let mut current = cell.try_borrow_mut().map_err(|_| RandomError::ThreadStateBusy)?;
        Ok(std::mem::replace(&mut *current, state))
    })
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(MIX_CONST1);
    z = (z ^ (z >> 27)).wrapping_mul(MIX_CONST2);
    z ^ (z >> 31)
}

fn entropy_words() -> [u32; 4] {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos() as u64);
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    let count = ENTROPY_COUNTER.fetch_add(1, Ordering::Relaxed);
    let hi = splitmix64(nanos ^ hasher.finish().rotate_left(17));
    let lo = splitmix64(hi ^ count.wrapping_mul(GOLDEN_GAMMA));
    [lo as u32, (lo >> 32) as u32, hi as u32, (hi >> 32) as u32]
}
