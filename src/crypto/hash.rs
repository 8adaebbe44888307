use sha2::{Digest, Sha256};

/// A SHA-256 context that supports snapshotting: `clone_and_finalize`
/// leaves the running state untouched so hashing can continue. This is
/// what lets the server verify the client's `Finished` against the
/// transcript hash *before* the client's `Finished` and then extend the
/// same transcript for its own.
#[derive(Clone)]
pub struct Hash {
    hasher: Sha256,
}

impl Hash {
    pub fn new() -> Self {
        Hash {
            hasher: Sha256::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Finalize a clone of the state and return the digest, keeping the
    /// running state usable.
    pub fn clone_and_finalize(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.hasher.clone().finalize());
        out
    }
}

impl Default for Hash {
    fn default() -> Self {
        Hash::new()
    }
}
