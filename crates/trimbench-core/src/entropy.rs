//! Random data used to overwrite discarded regions.

use crate::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;

/// Size of the reusable random chunk.
pub const ENTROPY_SIZE: usize = 4096;

/// A chunk of random bytes, gathered once and reused for every write.
#[derive(Clone)]
pub struct EntropyBuffer {
    bytes: Box<[u8; ENTROPY_SIZE]>,
}

impl EntropyBuffer {
    /// Fill the chunk from the operating system's random source.
    ///
    /// # Errors
    ///
    /// [`Error::Entropy`] if the OS source fails.
    pub fn from_os() -> Result<Self> {
        Self::from_rng(&mut OsRng)
    }

    /// Fill the chunk from `rng`.
    ///
    /// # Errors
    ///
    /// [`Error::Entropy`] if `rng` fails.
    pub fn from_rng<R: RngCore + ?Sized>(rng: &mut R) -> Result<Self> {
        let mut bytes = Box::new([0u8; ENTROPY_SIZE]);
        rng.try_fill_bytes(bytes.as_mut_slice())
            .map_err(|e| Error::Entropy(e.to_string()))?;
        Ok(Self { bytes })
    }

    /// The random bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }
}

impl std::fmt::Debug for EntropyBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntropyBuffer")
            .field("len", &ENTROPY_SIZE)
            .finish_non_exhaustive()
    }
}
