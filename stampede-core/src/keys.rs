//! Deterministic key generation and the pre-generated value pool.
//!
//! Sequential keys are a collision-free function of `(key_size, index)`; the
//! stage stepper advances the index across stage boundaries so that no two
//! stages ever write the same key.

use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Returns the fixed key used by same-key writes and by read setup.
///
/// Deterministic for a given size, so every machine in a run agrees on it.
#[must_use]
pub fn same_key(size: usize) -> Bytes {
    Bytes::from(vec![b'a'; size])
}

/// Returns the `index`-th sequential key, zero-padded to `size` bytes.
///
/// Indexes whose decimal form exceeds `size` digits produce a longer key
/// rather than wrapping, so keys stay distinct for any index.
#[must_use]
pub fn sequential_key(size: usize, index: i64) -> Bytes {
    Bytes::from(format!("{index:0size$}").into_bytes())
}

/// A fixed pool of pre-generated random values.
///
/// Values are generated once per run and cycled by request index, so the
/// generator hot path never allocates payloads.
#[derive(Debug, Clone)]
pub struct ValuePool {
    values: Vec<Bytes>,
}

impl ValuePool {
    /// Generates `sample_size` random alphanumeric values of `value_size`
    /// bytes each. A `sample_size` of zero is treated as one.
    #[must_use]
    pub fn generate(value_size: usize, sample_size: usize) -> Self {
        let mut rng = rand::thread_rng();
        let values = (0..sample_size.max(1))
            .map(|_| {
                let v: Vec<u8> = (&mut rng)
                    .sample_iter(&Alphanumeric)
                    .take(value_size)
                    .collect();
                Bytes::from(v)
            })
            .collect();
        Self { values }
    }

    /// Returns the pool value for a request index, cycling by
    /// `index % sample_size`.
    #[must_use]
    #[allow(clippy::cast_sign_loss)] // callers only pass non-negative indexes
    pub fn pick(&self, index: i64) -> Bytes {
        self.values[index.rem_euclid(self.values.len() as i64) as usize].clone()
    }

    /// Number of values in the pool.
    #[must_use]
    pub fn sample_size(&self) -> usize {
        self.values.len()
    }
}
