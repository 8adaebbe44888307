use crate::crypto::key_expansion;
use crate::message::{CipherSuite, CompressionMethod, ProtocolVersion, Random, SessionId};
use crate::Error;

/// The per-peer negotiated state.
///
/// Owned by the handshake while it runs; once `active` is set the
/// handshake is complete and ownership conceptually transfers to the
/// record layer, which reads the key material through [`Session::key_block`].
pub struct Session {
    session_id: SessionId,
    protocol_version: ProtocolVersion,
    cipher_suite: CipherSuite,
    compression_method: CompressionMethod,
    master_secret: Option<[u8; 48]>,
    client_random: Option<Random>,
    server_random: Option<Random>,
    read_epoch: u16,
    write_epoch: u16,
    send_raw_public_key: bool,
    receive_raw_public_key: bool,
    active: bool,
}

impl Session {
    pub(crate) fn new() -> Self {
        Session {
            session_id: SessionId::empty(),
            protocol_version: ProtocolVersion::DTLS1_2,
            cipher_suite: CipherSuite::SSL_NULL_WITH_NULL_NULL,
            compression_method: CompressionMethod::Null,
            master_secret: None,
            client_random: None,
            server_random: None,
            read_epoch: 0,
            write_epoch: 0,
            send_raw_public_key: false,
            receive_raw_public_key: false,
            active: false,
        }
    }

    /// The server-assigned session id.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    /// The negotiated cipher suite.
    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    pub fn client_random(&self) -> Option<&Random> {
        self.client_random.as_ref()
    }

    pub fn server_random(&self) -> Option<&Random> {
        self.server_random.as_ref()
    }

    /// The current read epoch, incremented on each valid inbound
    /// `ChangeCipherSpec`.
    pub fn read_epoch(&self) -> u16 {
        self.read_epoch
    }

    /// The current write epoch, incremented on each outbound
    /// `ChangeCipherSpec`.
    pub fn write_epoch(&self) -> u16 {
        self.write_epoch
    }

    /// True when the server's certificate payload is a raw public key.
    pub fn send_raw_public_key(&self) -> bool {
        self.send_raw_public_key
    }

    /// True when the client's certificate payload is a raw public key.
    pub fn receive_raw_public_key(&self) -> bool {
        self.receive_raw_public_key
    }

    /// Set once the server's `Finished` has been appended to the
    /// terminal flight.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Expand `length` bytes of key material for the record layer, using
    /// the TLS 1.2 PRF with the "key expansion" label.
    pub fn key_block(&self, length: usize) -> Result<Vec<u8>, Error> {
        let master_secret = self
            .master_secret
            .as_ref()
            .ok_or_else(|| Error::CryptoError("Master secret not derived yet".to_string()))?;
        let client_random = self
            .client_random
            .ok_or_else(|| Error::CryptoError("Client random not set".to_string()))?;
        let server_random = self
            .server_random
            .ok_or_else(|| Error::CryptoError("Server random not set".to_string()))?;

        key_expansion(
            master_secret,
            &client_random.to_bytes(),
            &server_random.to_bytes(),
            length,
        )
        .map_err(Error::CryptoError)
    }

    pub(crate) fn master_secret(&self) -> Option<&[u8; 48]> {
        self.master_secret.as_ref()
    }

    pub(crate) fn set_session_id(&mut self, session_id: SessionId) {
        self.session_id = session_id;
    }

    pub(crate) fn set_cipher_suite(&mut self, cipher_suite: CipherSuite) {
        self.cipher_suite = cipher_suite;
    }

    pub(crate) fn set_master_secret(&mut self, master_secret: [u8; 48]) {
        self.master_secret = Some(master_secret);
    }

    pub(crate) fn set_client_random(&mut self, random: Random) {
        self.client_random = Some(random);
    }

    pub(crate) fn set_server_random(&mut self, random: Random) {
        self.server_random = Some(random);
    }

    pub(crate) fn increment_read_epoch(&mut self) {
        self.read_epoch += 1;
    }

    pub(crate) fn increment_write_epoch(&mut self) {
        self.write_epoch += 1;
    }

    pub(crate) fn set_send_raw_public_key(&mut self, raw: bool) {
        self.send_raw_public_key = raw;
    }

    pub(crate) fn set_receive_raw_public_key(&mut self, raw: bool) {
        self.receive_raw_public_key = raw;
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}
