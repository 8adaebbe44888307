use crate::crypto::Hash;

/// Recorder for the handshake transcript.
///
/// Two views are kept in lockstep: a running SHA-256 digest (consumed by
/// `Finished`) and the concatenated raw message bytes (consumed by
/// `CertificateVerify`, whose signature covers the bytes rather than a
/// hash). `HelloRequest`, `HelloVerifyRequest` and the cookieless
/// `ClientHello` never enter either view; the caller enforces that.
pub(crate) struct Transcript {
    digest: Hash,
    bytes: Vec<u8>,
}

impl Transcript {
    pub fn new() -> Self {
        Transcript {
            digest: Hash::new(),
            bytes: Vec::new(),
        }
    }

    /// Fold a complete handshake message (header plus body) into both
    /// views.
    pub fn update(&mut self, message: &[u8]) {
        self.digest.update(message);
        self.bytes.extend_from_slice(message);
    }

    /// The digest over everything folded so far, without disturbing the
    /// running state.
    pub fn snapshot_digest(&self) -> [u8; 32] {
        self.digest.clone_and_finalize()
    }

    /// The concatenated raw messages folded so far.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
