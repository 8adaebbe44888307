// Server-side DTLS 1.2 handshake flow:
//
// 1. Client sends ClientHello (no cookie)
// 2. Server answers with HelloVerifyRequest carrying a stateless cookie
// 3. Client resends ClientHello with the cookie
// 4. Server sends ServerHello, Certificate*, ServerKeyExchange*,
//    CertificateRequest*, ServerHelloDone
// 5. Client sends Certificate*, ClientKeyExchange, CertificateVerify*,
//    ChangeCipherSpec, Finished
// 6. Server verifies Finished, then sends ChangeCipherSpec, Finished
//
// Starred messages depend on the negotiated key exchange and the client
// authentication setting.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use p256::ecdsa::VerifyingKey;
use smallvec::{smallvec, SmallVec};
use tinyvec::ArrayVec;

use crate::cookie::CookieGenerator;
use crate::crypto::{self, EcdheKeyExchange};
use crate::flight::Flight;
use crate::fragment::FragmentBuffer;
use crate::message::{
    serialize_message, AlertDescription, AlertMessage, Certificate, CertificateRequest,
    CertificateType, CertificateVerify, ChangeCipherSpec, CipherSuite, ClientHello,
    ClientKeyExchange, CompressionMethod, ContentType, CurveType, DigitallySigned,
    DistinguishedName, EcdhParams, ExchangeKeys, Finished, Header, HelloVerifyRequest,
    KeyExchangeAlgorithm, MessageType, NamedCurve, ProtocolVersion, Random, ServerHello,
    ServerKeyExchange, SessionId, SignatureAndHashAlgorithm,
};
use crate::transcript::Transcript;
use crate::{Config, Error, Record, Session};

/// Cap on reassembly buffers held at once, against peers that spray
/// future message_seq values.
const MAX_PENDING_MESSAGES: usize = 16;

/// Largest handshake message accepted for reassembly. Generous for the
/// constrained profile (certificate chains included) while bounding the
/// allocation a single header can demand.
const MAX_HANDSHAKE_LENGTH: usize = 64 * 1024;

/// Commands from the handshake core to the record layer.
///
/// The core never encrypts; it tells the record layer when to install
/// the negotiated keys for the next epoch. Key material is read from the
/// [`Session`] via [`Session::key_block`].
pub trait RecordLayer {
    /// Install the read keys for the next epoch. Called when a valid
    /// `ChangeCipherSpec` arrives from the client, before the read epoch
    /// increments.
    fn install_read_state(&mut self, session: &Session);

    /// Install the write keys for the next epoch. Called when the server
    /// emits its own `ChangeCipherSpec`, before the write epoch
    /// increments.
    fn install_write_state(&mut self, session: &Session);
}

/// No-op record layer for callers that track epochs themselves.
impl RecordLayer for () {
    fn install_read_state(&mut self, _session: &Session) {}
    fn install_write_state(&mut self, _session: &Session) {}
}

/// Current state of the server handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
    /// Await the first ClientHello (cookie usually absent).
    AwaitClientHello,
    /// HelloVerifyRequest sent; await the ClientHello echoing the cookie.
    AwaitCookieClientHello,
    /// Server flight sent; await client Certificate or ClientKeyExchange.
    AwaitCertificateOrKeyExchange,
    /// ClientKeyExchange processed; await CertificateVerify or the
    /// ChangeCipherSpec when the client sent no certificate.
    AwaitCertificateVerifyOrCcs,
    /// CertificateVerify processed; only ChangeCipherSpec may follow.
    AwaitChangeCipherSpec,
    /// Read state installed; await the client's Finished.
    AwaitFinished,
    /// Terminal flight sent, session active.
    Done,
    /// Torn down after close_notify or a peer fatal alert.
    Closed,
}

/// The server-side handshake state machine for one peer.
///
/// Drive it by feeding decrypted records into
/// [`process_record`](ServerHandshake::process_record); deliver any
/// returned [`Flight`] through the record layer. The machine never
/// blocks and owns no I/O.
pub struct ServerHandshake {
    peer: SocketAddr,
    config: Arc<Config>,
    cookies: Arc<CookieGenerator>,
    record_layer: Box<dyn RecordLayer>,

    state: ServerState,
    session: Session,
    transcript: Transcript,

    /// Ephemeral EC key, populated when the key exchange is ECDHE.
    ecdhe: Option<EcdheKeyExchange>,

    /// The client's public key, extracted from its certificate.
    client_public_key: Option<VerifyingKey>,

    /// message_seq of the client Certificate we processed, for duplicate
    /// suppression.
    client_certificate_seq: Option<u16>,

    /// Whether a valid CertificateVerify was received.
    certificate_verify_seen: bool,

    /// Next message_seq for outbound handshake messages.
    next_send_seq: u16,

    /// Next expected message_seq from the peer.
    next_recv_seq: u16,

    /// Reassembly buffers for received handshake messages, keyed by
    /// message_seq. Doubles as the queue for out-of-order messages:
    /// complete buffers beyond the next expected seq wait here until it
    /// is their turn.
    pending: BTreeMap<u16, FragmentBuffer>,

    /// The terminal flight, retained for replayed-Finished handling.
    last_flight: Option<Flight>,
}

impl ServerHandshake {
    /// Create a handshake for one peer.
    ///
    /// The cookie generator is shared across all handshakes of a server
    /// (its secret is what makes cookies stateless); configuration and
    /// key material are read-shared the same way.
    pub fn new(
        peer: SocketAddr,
        config: Arc<Config>,
        cookies: Arc<CookieGenerator>,
        record_layer: Box<dyn RecordLayer>,
    ) -> Self {
        ServerHandshake {
            peer,
            config,
            cookies,
            record_layer,
            state: ServerState::AwaitClientHello,
            session: Session::new(),
            transcript: Transcript::new(),
            ecdhe: None,
            client_public_key: None,
            client_certificate_seq: None,
            certificate_verify_seen: false,
            next_send_seq: 0,
            next_recv_seq: 0,
            pending: BTreeMap::new(),
            last_flight: None,
        }
    }

    /// The negotiated session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Take the session once the handshake finalized; the record layer
    /// becomes its owner.
    pub fn into_session(self) -> Session {
        self.session
    }

    /// True once the terminal flight has been sent.
    pub fn is_done(&self) -> bool {
        matches!(self.state, ServerState::Done)
    }

    /// A flight containing `HelloRequest`, for server-initiated
    /// handshakes. The message carries message_seq 0 and does not enter
    /// the transcript.
    pub fn start_handshake(&mut self) -> Flight {
        let mut flight = Flight::new();
        flight.add_handshake(self.session.write_epoch(), MessageType::HelloRequest, 0, &[], None);
        flight
    }

    /// Process one decrypted record from the peer.
    ///
    /// Returns the flight to transmit, if this record completed a step.
    /// A fatal error carries the alert to deliver before teardown.
    pub fn process_record(&mut self, record: Record) -> Result<Option<Flight>, Error> {
        if self.state == ServerState::Closed {
            return Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                "Record received after teardown",
            ));
        }

        match record.content_type {
            ContentType::Handshake => self.process_handshake_record(&record),
            ContentType::ChangeCipherSpec => self.process_change_cipher_spec(&record),
            ContentType::Alert => self.process_alert(&record),
            ContentType::ApplicationData | ContentType::Unknown(_) => Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                format!("Unexpected record type: {:?}", record.content_type),
            )),
        }
    }

    fn process_handshake_record(&mut self, record: &Record) -> Result<Option<Flight>, Error> {
        // The client did not see our terminal flight if it repeats its
        // Finished: re-emit the stored flight verbatim.
        if let Some(last_flight) = &self.last_flight {
            let is_finished_repeat = Header::parse(&record.fragment)
                .map(|(_, h)| h.msg_type == MessageType::Finished)
                .unwrap_or(false);

            if is_finished_repeat {
                debug!("Client repeated its Finished; retransmitting terminal flight");
                return Ok(Some(last_flight.clone()));
            }
            return Ok(None);
        }

        // A record may pack several handshake fragments back to back.
        let mut rest = record.fragment.as_slice();
        while !rest.is_empty() {
            let Ok((after_header, header)) = Header::parse(rest) else {
                trace!("Dropping truncated handshake header");
                return Ok(None);
            };

            let fragment_length = header.fragment_length as usize;
            if after_header.len() < fragment_length {
                trace!("Dropping truncated handshake fragment");
                return Ok(None);
            }
            let body = &after_header[..fragment_length];
            rest = &after_header[fragment_length..];

            // Old duplicates were already processed.
            if header.message_seq < self.next_recv_seq {
                trace!(
                    "Ignoring duplicate handshake seq {} (expecting {})",
                    header.message_seq,
                    self.next_recv_seq
                );
                continue;
            }

            if header.length as usize > MAX_HANDSHAKE_LENGTH {
                warn!("Handshake message of {} bytes refused", header.length);
                continue;
            }

            if !self.pending.contains_key(&header.message_seq)
                && self.pending.len() >= MAX_PENDING_MESSAGES
            {
                warn!("Reassembly buffers full; dropping seq {}", header.message_seq);
                continue;
            }

            let buffer = self
                .pending
                .entry(header.message_seq)
                .or_insert_with(|| FragmentBuffer::new(&header));
            if !buffer.add(&header, body) {
                trace!("Dropping contradictory fragment for seq {}", header.message_seq);
            }
        }

        self.drain_pending()
    }

    /// Deliver complete messages in message_seq order. Retried after
    /// every successful advance so queued out-of-order messages get
    /// their turn.
    fn drain_pending(&mut self) -> Result<Option<Flight>, Error> {
        let mut out: Option<Flight> = None;

        loop {
            let complete = self
                .pending
                .get(&self.next_recv_seq)
                .map(|b| b.is_complete())
                .unwrap_or(false);
            if !complete {
                break;
            }

            let buffer = self.pending.remove(&self.next_recv_seq).unwrap();
            let message_seq = self.next_recv_seq;
            self.next_recv_seq += 1;

            let flight =
                self.dispatch_handshake(buffer.msg_type(), buffer.body(), message_seq)?;

            if let Some(flight) = flight {
                if out.is_some() {
                    warn!("Multiple flights produced in one drain; keeping the last");
                }
                out = Some(flight);
            }

            if self.state == ServerState::Done || self.state == ServerState::Closed {
                break;
            }
        }

        Ok(out)
    }

    fn dispatch_handshake(
        &mut self,
        msg_type: MessageType,
        body: &[u8],
        message_seq: u16,
    ) -> Result<Option<Flight>, Error> {
        trace!("Handshake message {:?} (seq {})", msg_type, message_seq);

        match (self.state, msg_type) {
            (
                ServerState::AwaitClientHello | ServerState::AwaitCookieClientHello,
                MessageType::ClientHello,
            ) => self.received_client_hello(body, message_seq),

            (ServerState::AwaitCertificateOrKeyExchange, MessageType::Certificate) => {
                self.received_client_certificate(body, message_seq)?;
                Ok(None)
            }

            (ServerState::AwaitCertificateOrKeyExchange, MessageType::ClientKeyExchange) => {
                self.received_client_key_exchange(body, message_seq)?;
                self.state = ServerState::AwaitCertificateVerifyOrCcs;
                Ok(None)
            }

            (ServerState::AwaitCertificateVerifyOrCcs, MessageType::CertificateVerify) => {
                self.received_certificate_verify(body, message_seq)?;
                self.state = ServerState::AwaitChangeCipherSpec;
                Ok(None)
            }

            (ServerState::AwaitFinished, MessageType::Finished) => {
                let flight = self.received_client_finished(body, message_seq)?;
                Ok(Some(flight))
            }

            _ => Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                format!("Unexpected {:?} in state {:?}", msg_type, self.state),
            )),
        }
    }

    fn received_client_hello(
        &mut self,
        body: &[u8],
        message_seq: u16,
    ) -> Result<Option<Flight>, Error> {
        let (_, ch) = ClientHello::parse(body)?;

        // The server speaks exactly DTLS 1.2; anything older is refused.
        if !ch.client_version.is_at_least_dtls12() {
            return Err(Error::fatal(
                AlertDescription::ProtocolVersion,
                format!("Client offered {:?}, server requires DTLS 1.2", ch.client_version),
            ));
        }

        // Only null compression is negotiable, so the client must offer it.
        if !ch
            .compression_methods
            .iter()
            .any(|m| *m == CompressionMethod::Null)
        {
            return Err(Error::fatal(
                AlertDescription::HandshakeFailure,
                "Client did not offer null compression",
            ));
        }

        if !self.cookies.verify(&self.peer, &ch) {
            debug!("Missing or stale cookie from {}; sending HelloVerifyRequest", self.peer);
            return Ok(Some(self.send_hello_verify_request(&ch)));
        }

        // Cookie checks out: this ClientHello opens the transcript. The
        // earlier cookieless exchange stays outside it per RFC 6347.
        self.transcript_incoming(MessageType::ClientHello, message_seq, body);

        let cipher_suite = self.negotiate_cipher_suite(&ch)?;
        debug!("Negotiated cipher suite {:?}", cipher_suite);
        self.session.set_cipher_suite(cipher_suite);
        self.session.set_client_random(ch.random);
        self.session.set_server_random(Random::new());
        self.session.set_session_id(fresh_session_id());

        let key_exchange = cipher_suite.key_exchange_algorithm();

        // Certificate type negotiation, one direction per extension the
        // client sent. The chosen type is echoed in the ServerHello.
        let client_cert_type = ch
            .client_certificate_types()
            .map(|types| negotiate_certificate_type(&types));
        if client_cert_type == Some(CertificateType::RawPublicKey) {
            self.session.set_receive_raw_public_key(true);
        }

        let server_cert_type = ch
            .server_certificate_types()
            .map(|types| negotiate_certificate_type(&types));
        if server_cert_type == Some(CertificateType::RawPublicKey) {
            self.session.set_send_raw_public_key(true);
        }

        if key_exchange == KeyExchangeAlgorithm::EcDiffieHellman {
            let named_curve = negotiate_named_curve(&ch)?;
            debug!("Negotiated curve {:?}", named_curve);
            let ecdhe = EcdheKeyExchange::new(named_curve).map_err(Error::CryptoError)?;
            self.ecdhe = Some(ecdhe);
        }

        let flight = self.send_server_flight(key_exchange, client_cert_type, server_cert_type)?;
        self.state = ServerState::AwaitCertificateOrKeyExchange;
        Ok(Some(flight))
    }

    fn send_hello_verify_request(&mut self, ch: &ClientHello) -> Flight {
        let cookie = self.cookies.generate(&self.peer, ch);

        let hvr = HelloVerifyRequest::new(ProtocolVersion::DTLS1_2, cookie);
        let mut body = Vec::new();
        hvr.serialize(&mut body);

        // HelloVerifyRequest and its triggering ClientHello never enter
        // the transcript.
        let mut flight = Flight::new();
        flight.add_handshake(
            self.session.write_epoch(),
            MessageType::HelloVerifyRequest,
            self.next_send_seq,
            &body,
            None,
        );
        self.next_send_seq += 1;

        self.state = ServerState::AwaitCookieClientHello;
        flight
    }

    fn send_server_flight(
        &mut self,
        key_exchange: KeyExchangeAlgorithm,
        client_cert_type: Option<CertificateType>,
        server_cert_type: Option<CertificateType>,
    ) -> Result<Flight, Error> {
        debug!("Sending ServerHello flight");

        let epoch = self.session.write_epoch();
        let ec_suite = key_exchange == KeyExchangeAlgorithm::EcDiffieHellman;
        let mut flight = Flight::new();

        // ServerHello
        let mut ext_buf = Vec::new();
        let server_hello = ServerHello::new(
            ProtocolVersion::DTLS1_2,
            *self.session.server_random().expect("server random set"),
            *self.session.session_id(),
            self.session.cipher_suite(),
            CompressionMethod::Null,
        )
        .with_extensions(&mut ext_buf, client_cert_type, server_cert_type, ec_suite);

        let mut body = Vec::new();
        server_hello.serialize(&mut body);
        flight.add_handshake(
            epoch,
            MessageType::ServerHello,
            self.next_send_seq,
            &body,
            Some(&mut self.transcript),
        );
        self.next_send_seq += 1;

        if ec_suite {
            // Certificate
            let body = self.build_server_certificate()?;
            flight.add_handshake(
                epoch,
                MessageType::Certificate,
                self.next_send_seq,
                &body,
                Some(&mut self.transcript),
            );
            self.next_send_seq += 1;

            // ServerKeyExchange
            let body = self.build_server_key_exchange()?;
            flight.add_handshake(
                epoch,
                MessageType::ServerKeyExchange,
                self.next_send_seq,
                &body,
                Some(&mut self.transcript),
            );
            self.next_send_seq += 1;
        }

        // CertificateRequest, when the client must authenticate. PSK
        // handshakes authenticate through the key itself.
        if self.config.client_authentication_required()
            && key_exchange != KeyExchangeAlgorithm::Psk
        {
            let body = self.build_certificate_request();
            flight.add_handshake(
                epoch,
                MessageType::CertificateRequest,
                self.next_send_seq,
                &body,
                Some(&mut self.transcript),
            );
            self.next_send_seq += 1;
        }

        // ServerHelloDone terminates the flight with an empty body.
        flight.add_handshake(
            epoch,
            MessageType::ServerHelloDone,
            self.next_send_seq,
            &[],
            Some(&mut self.transcript),
        );
        self.next_send_seq += 1;

        Ok(flight)
    }

    fn build_server_certificate(&self) -> Result<Vec<u8>, Error> {
        let certificates = self.config.certificates();
        if certificates.is_empty() {
            return Err(Error::ConfigError(
                "ECDHE negotiated but no certificate configured".to_string(),
            ));
        }

        let certificate = if self.session.send_raw_public_key() {
            let spki =
                crypto::subject_public_key_info(&certificates[0]).map_err(Error::CryptoError)?;
            Certificate::RawPublicKey(spki)
        } else {
            Certificate::X509Chain(certificates.iter().cloned().collect())
        };

        let mut body = Vec::new();
        certificate.serialize(&mut body);
        Ok(body)
    }

    fn build_server_key_exchange(&self) -> Result<Vec<u8>, Error> {
        let ecdhe = self
            .ecdhe
            .as_ref()
            .expect("ECDHE context initialized during negotiation");

        let client_random = self.session.client_random().expect("client random set");
        let server_random = self.session.server_random().expect("server random set");

        // Signature covers client_random || server_random || params.
        let params = EcdhParams::new(
            CurveType::NamedCurve,
            ecdhe.named_curve(),
            ecdhe.public_point(),
            None,
        );

        let mut signed_data = Vec::new();
        signed_data.extend_from_slice(&client_random.to_bytes());
        signed_data.extend_from_slice(&server_random.to_bytes());
        params.serialize(&mut signed_data, false);

        let signing_key =
            crypto::load_signing_key(self.config.private_key()).map_err(Error::CryptoError)?;
        let signature =
            crypto::sign_ecdsa_sha256(&signing_key, &signed_data).map_err(Error::CryptoError)?;

        let signed = DigitallySigned::new(SignatureAndHashAlgorithm::ecdsa_sha256(), &signature);
        let ske = ServerKeyExchange {
            params: EcdhParams::new(
                CurveType::NamedCurve,
                ecdhe.named_curve(),
                ecdhe.public_point(),
                Some(signed),
            ),
        };

        let mut body = Vec::new();
        ske.serialize(&mut body);
        Ok(body)
    }

    fn build_certificate_request(&self) -> Vec<u8> {
        let mut certificate_authorities: SmallVec<[Vec<u8>; 8]> = SmallVec::new();
        for anchor in self.config.trust_anchors() {
            match crypto::subject_name(anchor) {
                Ok(name) => certificate_authorities.push(name),
                Err(e) => warn!("Skipping unparseable trust anchor: {}", e),
            }
        }

        let cr = CertificateRequest::new(
            smallvec![crate::message::ClientCertificateType::ECDSA_SIGN],
            smallvec![SignatureAndHashAlgorithm::ecdsa_sha256()],
            certificate_authorities
                .iter()
                .map(|name| DistinguishedName(name))
                .collect(),
        );

        let mut body = Vec::new();
        cr.serialize(&mut body);
        body
    }

    fn received_client_certificate(
        &mut self,
        body: &[u8],
        message_seq: u16,
    ) -> Result<(), Error> {
        // Discard a duplicate of the message we already processed.
        if self.client_certificate_seq == Some(message_seq) {
            return Ok(());
        }

        let raw = self.session.receive_raw_public_key();
        let (_, certificate) = Certificate::parse(body, raw)?;

        match &certificate {
            Certificate::X509Chain(chain) if chain.is_empty() => {
                // The client answered the CertificateRequest with an
                // empty chain; the mandatory-auth check will reject it
                // at Finished time if authentication is required.
                debug!("Client sent an empty certificate chain");
            }
            Certificate::X509Chain(chain) => {
                crypto::verify_certificate_chain(chain, self.config.trust_anchors()).map_err(
                    |e| {
                        Error::fatal(
                            AlertDescription::HandshakeFailure,
                            format!("Client certificate verification failed: {}", e),
                        )
                    },
                )?;

                let public_key = crypto::public_key_from_certificate(&chain[0]).map_err(|e| {
                    Error::fatal(
                        AlertDescription::HandshakeFailure,
                        format!("Unusable client public key: {}", e),
                    )
                })?;
                self.client_public_key = Some(public_key);
            }
            Certificate::RawPublicKey(spki) => {
                // A bare SubjectPublicKeyInfo carries no chain to walk;
                // trust in it comes from CertificateVerify possession
                // proof plus whatever out-of-band binding the caller has.
                let public_key = crypto::public_key_from_spki(spki).map_err(|e| {
                    Error::fatal(
                        AlertDescription::HandshakeFailure,
                        format!("Unusable client public key: {}", e),
                    )
                })?;
                self.client_public_key = Some(public_key);
            }
        }

        self.client_certificate_seq = Some(message_seq);
        self.transcript_incoming(MessageType::Certificate, message_seq, body);
        Ok(())
    }

    fn received_client_key_exchange(
        &mut self,
        body: &[u8],
        message_seq: u16,
    ) -> Result<(), Error> {
        let key_exchange = self.session.cipher_suite().key_exchange_algorithm();
        let (_, cke) = ClientKeyExchange::parse(body, key_exchange)?;

        let premaster = match cke.exchange_keys {
            ExchangeKeys::PskIdentity(identity) => {
                let identity = std::str::from_utf8(identity).map_err(|_| {
                    Error::fatal(
                        AlertDescription::HandshakeFailure,
                        "PSK identity is not valid UTF-8",
                    )
                })?;

                let Some(psk) = self.config.preshared_key(identity) else {
                    return Err(Error::fatal(
                        AlertDescription::HandshakeFailure,
                        format!("No preshared key for identity: {}", identity),
                    ));
                };
                trace!("PSK identity {:?} resolved", identity);
                crypto::psk_premaster_secret(psk)
            }
            ExchangeKeys::EcdhPublic(point) => {
                let ecdhe = self.ecdhe.as_ref().ok_or_else(|| {
                    Error::CryptoError("ECDHE context missing".to_string())
                })?;
                ecdhe.shared_secret(point).map_err(|e| {
                    Error::fatal(
                        AlertDescription::HandshakeFailure,
                        format!("ECDH agreement failed: {}", e),
                    )
                })?
            }
            ExchangeKeys::Null => Vec::new(),
        };

        let client_random = self.session.client_random().expect("client random set");
        let server_random = self.session.server_random().expect("server random set");

        let master_secret = crypto::calculate_master_secret(
            &premaster,
            &client_random.to_bytes(),
            &server_random.to_bytes(),
        )
        .map_err(Error::CryptoError)?;

        let mut ms = [0u8; 48];
        ms.copy_from_slice(&master_secret);
        self.session.set_master_secret(ms);

        self.transcript_incoming(MessageType::ClientKeyExchange, message_seq, body);
        Ok(())
    }

    fn received_certificate_verify(
        &mut self,
        body: &[u8],
        message_seq: u16,
    ) -> Result<(), Error> {
        let (_, cv) = CertificateVerify::parse(body)?;

        let Some(public_key) = &self.client_public_key else {
            return Err(Error::fatal(
                AlertDescription::HandshakeFailure,
                "CertificateVerify without a usable client certificate",
            ));
        };

        if cv.signed.algorithm != SignatureAndHashAlgorithm::ecdsa_sha256() {
            return Err(Error::fatal(
                AlertDescription::HandshakeFailure,
                format!("Unsupported CertificateVerify algorithm: {:?}", cv.signed.algorithm),
            ));
        }

        // The signature covers the raw transcript bytes up to and
        // including ClientKeyExchange; this message itself is folded in
        // only afterwards.
        crypto::verify_ecdsa_sha256(public_key, self.transcript.bytes(), cv.signed.signature)
            .map_err(|e| {
                Error::fatal(
                    AlertDescription::HandshakeFailure,
                    format!("CertificateVerify verification failed: {}", e),
                )
            })?;

        debug!("Client CertificateVerify verified");
        self.certificate_verify_seen = true;
        self.transcript_incoming(MessageType::CertificateVerify, message_seq, body);
        Ok(())
    }

    fn process_change_cipher_spec(&mut self, record: &Record) -> Result<Option<Flight>, Error> {
        if !matches!(
            self.state,
            ServerState::AwaitCertificateVerifyOrCcs | ServerState::AwaitChangeCipherSpec
        ) {
            return Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                format!("ChangeCipherSpec in state {:?}", self.state),
            ));
        }

        let Ok((_, _ccs)) = ChangeCipherSpec::parse(&record.fragment) else {
            trace!("Dropping malformed ChangeCipherSpec");
            return Ok(None);
        };

        debug!("Client ChangeCipherSpec; installing read state");
        self.record_layer.install_read_state(&self.session);
        self.session.increment_read_epoch();
        self.state = ServerState::AwaitFinished;
        Ok(None)
    }

    fn received_client_finished(
        &mut self,
        body: &[u8],
        message_seq: u16,
    ) -> Result<Flight, Error> {
        // The client must have authenticated when we demanded it.
        let key_exchange = self.session.cipher_suite().key_exchange_algorithm();
        if key_exchange == KeyExchangeAlgorithm::EcDiffieHellman
            && self.config.client_authentication_required()
            && (self.client_certificate_seq.is_none() || !self.certificate_verify_seen)
        {
            return Err(Error::fatal(
                AlertDescription::HandshakeFailure,
                "Client did not send required authentication messages",
            ));
        }

        let (_, finished) = Finished::parse(body)?;

        let master_secret = *self
            .session
            .master_secret()
            .ok_or_else(|| Error::CryptoError("Master secret not derived".to_string()))?;

        // The client's Finished is verified against the transcript as it
        // stood *before* that message; our own Finished then covers the
        // transcript extended with the client's.
        let handshake_hash = self.transcript.snapshot_digest();
        let expected = crypto::verify_data(&master_secret, true, &handshake_hash)
            .map_err(Error::CryptoError)?;

        if finished.verify_data != expected {
            return Err(Error::fatal(
                AlertDescription::DecryptError,
                "Client Finished verification failed",
            ));
        }
        debug!("Client Finished verified");

        self.transcript_incoming(MessageType::Finished, message_seq, body);

        let mut flight = Flight::new();

        // ChangeCipherSpec first, then switch our write state.
        flight.add_change_cipher_spec(self.session.write_epoch());
        self.record_layer.install_write_state(&self.session);
        self.session.increment_write_epoch();

        // Our Finished goes out under the new epoch.
        let handshake_hash = self.transcript.snapshot_digest();
        let verify_data = crypto::verify_data(&master_secret, false, &handshake_hash)
            .map_err(Error::CryptoError)?;

        let mut body = Vec::new();
        Finished::new(verify_data).serialize(&mut body);
        flight.add_handshake(
            self.session.write_epoch(),
            MessageType::Finished,
            self.next_send_seq,
            &body,
            Some(&mut self.transcript),
        );
        self.next_send_seq += 1;

        self.session.set_active(true);
        self.state = ServerState::Done;

        // Not rescheduled on a timer, but kept for replayed Finished.
        flight.set_retransmission_needed(false);
        self.last_flight = Some(flight.clone());

        debug!("Handshake with {} complete", self.peer);
        Ok(flight)
    }

    fn process_alert(&mut self, record: &Record) -> Result<Option<Flight>, Error> {
        let Ok((_, alert)) = AlertMessage::parse(&record.fragment) else {
            trace!("Dropping malformed alert");
            return Ok(None);
        };

        if alert.description == AlertDescription::CloseNotify {
            debug!("close_notify from {}; closing", self.peer);
            let mut flight = Flight::new();
            flight.add_alert(self.session.write_epoch(), AlertMessage::close_notify());
            self.state = ServerState::Closed;
            return Ok(Some(flight));
        }

        warn!("Peer alert {:?}; tearing down", alert.description);
        self.state = ServerState::Closed;
        Ok(None)
    }

    /// Fold a received handshake message into the transcript, in its
    /// canonical unfragmented wire form.
    fn transcript_incoming(&mut self, msg_type: MessageType, message_seq: u16, body: &[u8]) {
        let mut full = Vec::with_capacity(Header::LENGTH + body.len());
        serialize_message(msg_type, message_seq, body, &mut full);
        self.transcript.update(&full);
    }

    /// Pick the first client-offered suite the server can actually run,
    /// never the null suite.
    fn negotiate_cipher_suite(&self, ch: &ClientHello) -> Result<CipherSuite, Error> {
        for suite in ch.cipher_suites.iter() {
            match suite {
                CipherSuite::TLS_PSK_WITH_AES_128_CCM_8 => return Ok(*suite),
                CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8
                    if !self.config.certificates().is_empty() =>
                {
                    return Ok(*suite)
                }
                _ => {}
            }
        }

        Err(Error::fatal(
            AlertDescription::HandshakeFailure,
            "No mutually acceptable cipher suite",
        ))
    }
}

/// First entry in the client's list whose parameters the server knows.
/// A missing extension is fatal once an EC suite has been selected.
fn negotiate_named_curve(ch: &ClientHello) -> Result<NamedCurve, Error> {
    let Some(curves) = ch.supported_elliptic_curves() else {
        return Err(Error::fatal(
            AlertDescription::HandshakeFailure,
            "EC suite chosen but supported_elliptic_curves extension missing",
        ));
    };

    curves
        .iter()
        .copied()
        .find(|c| c.is_supported())
        .ok_or_else(|| {
            Error::fatal(
                AlertDescription::HandshakeFailure,
                "No proposed elliptic curve supported",
            )
        })
}

/// Intersect the client's certificate type list with what we support
/// and take the client's first supported preference. X.509 is the
/// fallback for a list with no usable entry.
fn negotiate_certificate_type(types: &ArrayVec<[CertificateType; 8]>) -> CertificateType {
    types
        .iter()
        .copied()
        .find(|t| matches!(t, CertificateType::X509 | CertificateType::RawPublicKey))
        .unwrap_or(CertificateType::X509)
}

fn fresh_session_id() -> SessionId {
    use rand::RngCore;
    let mut id = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut id);
    SessionId::try_new(&id).expect("32 bytes fit a session id")
}
