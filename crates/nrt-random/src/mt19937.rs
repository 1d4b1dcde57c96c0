const MT_N: usize = 624;
const MT_M: usize = 397;
const MT_MATRIX_A: u32 = 0x9908_b0df;
const MT_UPPER_MASK: u32 = 0x8000_0000;
const MT_LOWER_MASK: u32 = 0x7fff_ffff;
const MT_INIT_MULT: u32 = 1_812_433_253;
const MT_KEY_SEED: u32 = 19_650_218;
const MT_KEY_MULT_A: u32 = 1_664_525;
const MT_KEY_MULT_B: u32 = 1_566_083_941;

pub(crate) const STATE_WORDS: usize = MT_N;

/// MT19937 with the legacy `RandomState` seeding routines.
///
/// `pos == 624` means the next draw twists the whole key first.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Mt19937 {
    key: Vec<u32>,
    pos: usize,
}

impl Mt19937 {
    /// `init_genrand`.
    pub(crate) fn from_u32_seed(seed: u32) -> Self {
        let mut key = vec![0u32; MT_N];
        key[0] = seed;
        for i in 1..MT_N {
            key[i] = MT_INIT_MULT
                .wrapping_mul(key[i - 1] ^ (key[i - 1] >> 30))
                .wrapping_add(i as u32);
        }
        Self { key, pos: MT_N }
    }

    /// `init_by_array` over 32-bit words.
    pub(crate) fn from_words(words: &[u32]) -> Self {
        let mut state = Self::from_u32_seed(MT_KEY_SEED);
        let mt = &mut state.key;
        let len = words.len().max(1);
        let (mut i, mut j) = (1usize, 0usize);
        for _ in 0..MT_N.max(len) {
            let prev = mt[i - 1] ^ (mt[i - 1] >> 30);
            let word = words.get(j).copied().unwrap_or(0);
            mt[i] = (mt[i] ^ prev.wrapping_mul(MT_KEY_MULT_A))
                .wrapping_add(word)
                .wrapping_add(j as u32);
            i += 1;
            j += 1;
            if i >= MT_N {
                mt[0] = mt[MT_N - 1];
                i = 1;
            }
            if j >= len {
                j = 0;
            }
        }
        for _ in 0..MT_N - 1 {
            let prev = mt[i - 1] ^ (mt[i - 1] >> 30);
            mt[i] = (mt[i] ^ prev.wrapping_mul(MT_KEY_MULT_B)).wrapping_sub(i as u32);
            i += 1;
            if i >= MT_N {
                mt[0] = mt[MT_N - 1];
                i = 1;
            }
        }
        mt[0] = MT_UPPER_MASK;
        state.pos = MT_N;
        state
    }

    /// Restores a key and position; `None` when either is out of range.
    pub(crate) fn from_raw_state(key: &[u32], pos: usize) -> Option<Self> {
        if key.len() != MT_N || pos > MT_N {
            return None;
        }
        Some(Self {
            key: key.to_vec(),
            pos,
        })
    }

    pub(crate) fn raw_state(&self) -> (&[u32], usize) {
        (&self.key, self.pos)
    }

    fn twist(&mut self) {
        let mt = &mut self.key;
        let mix = |upper: u32, lower: u32, far: u32| {
            let y = (upper & MT_UPPER_MASK) | (lower & MT_LOWER_MASK);
            far ^ (y >> 1) ^ if y & 1 != 0 { MT_MATRIX_A } else { 0 }
        };
        for kk in 0..(MT_N - MT_M) {
            mt[kk] = mix(mt[kk], mt[kk + 1], mt[kk + MT_M]);
        }
        for kk in (MT_N - MT_M)..(MT_N - 1) {
            mt[kk] = mix(mt[kk], mt[kk + 1], mt[kk + MT_M - MT_N]);
        }
        mt[MT_N - 1] = mix(mt[MT_N - 1], mt[0], mt[MT_M - 1]);
    }

    fn temper(mut y: u32) -> u32 {
        y ^= y >> 11;
        y ^= (y << 7) & 0x9D2C_5680;
        y ^= (y << 15) & 0xEFC6_0000;
        y ^= y >> 18;
        y
    }

    pub(crate) fn next_u32(&mut self) -> u32 {
        if self.pos >= MT_N {
            self.twist();
            self.pos = 0;
        }
        let y = self.key[self.pos];
        self.pos += 1;
        Self::temper(y)
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    /// `genrand_res53`: 27 + 26 bits into a double in [0, 1).
    pub(crate) fn next_f64(&mut self) -> f64 {
        let a = f64::from(self.next_u32() >> 5);
        let b = f64::from(self.next_u32() >> 6);
        (a * 67_108_864.0 + b) * (1.0 / 9_007_199_254_740_992.0)
    }

    /// Uniform integer in `[0, max]` by masked rejection. Ranges that fit in
    /// 32 bits consume one word per attempt.
    pub(crate) fn interval(&mut self, max: u64) -> u64 {
        if max == 0 {
            return 0;
        }
        let mask = u64::MAX >> max.leading_zeros();
        if max <= u64::from(u32::MAX) {
            loop {
                let value = u64::from(self.next_u32()) & mask;
                if value <= max {
                    return value;
                }
            }
        }
        loop {
            let value = self.next_u64() & mask;
            if value <= max {
                return value;
            }
        }
    }
}
