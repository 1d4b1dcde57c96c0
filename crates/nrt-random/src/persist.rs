use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::mt19937::{Mt19937, STATE_WORDS};
use crate::{RandomError, RandomState};

const ALGORITHM: &str = "MT19937";
const BLOB_MAGIC: &[u8; 4] = b"NRMT";
const BLOB_VERSION: u16 = 1;
const FLAG_SEEDED: u8 = 0b01;
const FLAG_GAUSS: u8 = 0b10;
const HEADER_LEN: usize = 4 + 2 + 1 + 2 + 8;
const DIGEST_LEN: usize = 32;

/// Structured copy of a [`RandomState`]. An empty `key` stands for an
/// Unseeded state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomStateSnapshot {
    pub algorithm: String,
    pub key: Vec<u32>,
    pub pos: usize,
    pub gauss: Option<f64>,
}

impl RandomStateSnapshot {
    pub fn to_json(&self) -> Result<String, RandomError> {
        serde_json::to_string(self).map_err(|err| RandomError::corrupt(err.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, RandomError> {
        serde_json::from_str(raw).map_err(|err| RandomError::corrupt(err.to_string()))
    }
}

impl RandomState {
    #[must_use]
    pub fn snapshot(&self) -> RandomStateSnapshot {
        let (key, pos) = self
            .engine
            .as_ref()
            .map_or((Vec::new(), 0), |engine| {
                let (key, pos) = engine.raw_state();
                (key.to_vec(), pos)
            });
        RandomStateSnapshot {
            algorithm: ALGORITHM.to_string(),
            key,
            pos,
            gauss: self.gauss,
        }
    }

    pub fn restore(snapshot: &RandomStateSnapshot) -> Result<Self, RandomError> {
        if snapshot.algorithm != ALGORITHM {
            return Err(RandomError::corrupt(format!(
                "unsupported algorithm '{}'",
                snapshot.algorithm
            )));
        }
        if snapshot.key.is_empty() {
            if snapshot.gauss.is_some() {
                return Err(RandomError::corrupt("unseeded state carries a cached gaussian"));
            }
            return Ok(Self::new());
        }
        let engine = Mt19937::from_raw_state(&snapshot.key, snapshot.pos).ok_or_else(|| {
            RandomError::corrupt(format!(
                "key must hold {STATE_WORDS} words with pos <= {STATE_WORDS}"
            ))
        })?;
        Ok(Self {
            engine: Some(engine),
            gauss: snapshot.gauss,
        })
    }

    /// Opaque text form: base64 over magic, version, flags, position,
    /// cached Gaussian and key words, followed by their SHA-256.
    #[must_use]
    pub fn to_blob(&self) -> String {
        let mut flags = 0u8;
        if self.engine.is_some() {
            flags |= FLAG_SEEDED;
        }
        if self.gauss.is_some() {
            flags |= FLAG_GAUSS;
        }
        let (key, pos) = self
            .engine
            .as_ref()
            .map_or((&[][..], 0), Mt19937::raw_state);

        let mut bytes = Vec::with_capacity(HEADER_LEN + 4 * key.len() + DIGEST_LEN);
        bytes.extend_from_slice(BLOB_MAGIC);
        bytes.extend_from_slice(&BLOB_VERSION.to_le_bytes());
        bytes.push(flags);
        bytes.extend_from_slice(&(pos as u16).to_le_bytes());
        bytes.extend_from_slice(&self.gauss.unwrap_or(0.0).to_le_bytes());
        for word in key {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        let digest = Sha256::digest(&bytes);
        bytes.extend_from_slice(&digest);
        BASE64.encode(bytes)
    }

    pub fn from_blob(blob: &str) -> Result<Self, RandomError> {
        let bytes = BASE64
            .decode(blob.trim())
            .map_err(|err| RandomError::corrupt(format!("invalid base64: {err}")))?;
        if bytes.len() < HEADER_LEN + DIGEST_LEN {
            return Err(RandomError::corrupt("blob is truncated"));
        }
        let (body, digest) = bytes.split_at(bytes.len() - DIGEST_LEN);
        if Sha256::digest(body).as_slice() != digest {
            return Err(RandomError::corrupt("checksum mismatch"));
        }
        let (header, key_bytes) = body.split_at(HEADER_LEN);
        if &header[..4] != BLOB_MAGIC {
            return Err(RandomError::corrupt("bad magic"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != BLOB_VERSION {
            return Err(RandomError::corrupt(format!("unsupported blob version {version}")));
        }
        let flags = header[6];
        let pos = usize::from(u16::from_le_bytes([header[7], header[8]]));
        let mut gauss_bytes = [0u8; 8];
        gauss_bytes.copy_from_slice(&header[9..HEADER_LEN]);
        let gauss = (flags & FLAG_GAUSS != 0).then(|| f64::from_le_bytes(gauss_bytes));

        if flags & FLAG_SEEDED == 0 {
            if !key_bytes.is_empty() || gauss.is_some() {
                return Err(RandomError::corrupt("unseeded blob carries state"));
            }
            return Ok(Self::new());
        }
        if key_bytes.len() != 4 * STATE_WORDS {
            return Err(RandomError::corrupt("key length mismatch"));
        }
        let key: Vec<u32> = key_bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        let engine = Mt19937::from_raw_state(&key, pos)
            .ok_or_else(|| RandomError::corrupt("position out of range"))?;
        log::debug!("random state restored from blob");
        Ok(Self {
            engine: Some(engine),
            gauss,
        })
    }
}
