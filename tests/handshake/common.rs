//! Shared helpers: a minimal in-test DTLS client that builds the wire
//! messages a real peer would send and tracks the handshake transcript.

#![allow(unused)]

use std::net::SocketAddr;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tinyvec::array_vec;

use cambium::crypto;
use cambium::message::{
    CipherSuite, CompressionMethod, ContentType, Cookie, Extension, ExtensionType, Header,
    MessageType, ProtocolVersion, Random, SessionId,
};
use cambium::{Config, CookieGenerator, Flight, Record, ServerHandshake};

/// Handshake message type codes, for assertions on raw fragments.
pub const CLIENT_HELLO: u8 = 1;
pub const SERVER_HELLO: u8 = 2;
pub const HELLO_VERIFY_REQUEST: u8 = 3;
pub const CERTIFICATE: u8 = 11;
pub const SERVER_KEY_EXCHANGE: u8 = 12;
pub const CERTIFICATE_REQUEST: u8 = 13;
pub const SERVER_HELLO_DONE: u8 = 14;
pub const CERTIFICATE_VERIFY: u8 = 15;
pub const CLIENT_KEY_EXCHANGE: u8 = 16;
pub const FINISHED: u8 = 20;

pub fn peer() -> SocketAddr {
    "192.0.2.1:5684".parse().unwrap()
}

pub fn new_server(config: Config) -> ServerHandshake {
    ServerHandshake::new(
        peer(),
        Arc::new(config),
        Arc::new(CookieGenerator::new()),
        Box::new(()),
    )
}

/// Serialize a handshake message (header plus body) the way a peer
/// would put it on the wire, unfragmented.
pub fn hs_message(msg_type: u8, message_seq: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(12 + body.len());
    out.push(msg_type);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(&message_seq.to_be_bytes());
    out.extend_from_slice(&[0, 0, 0]); // fragment_offset
    out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(body);
    out
}

/// Wrap a handshake fragment into a decrypted record.
pub fn hs_record(epoch: u16, sequence: u64, fragment: Vec<u8>) -> Record {
    Record {
        content_type: ContentType::Handshake,
        epoch,
        sequence,
        fragment,
    }
}

pub fn ccs_record(sequence: u64) -> Record {
    Record {
        content_type: ContentType::ChangeCipherSpec,
        epoch: 0,
        sequence,
        fragment: vec![1],
    }
}

/// Split the records of a flight into parsed handshake messages:
/// `(msg_type, message_seq, body)`.
pub fn flight_messages(flight: &Flight) -> Vec<(u8, u16, Vec<u8>)> {
    let mut out = Vec::new();
    for record in flight.records() {
        if record.content_type != ContentType::Handshake {
            continue;
        }
        let (rest, header) = Header::parse(&record.fragment).expect("handshake header");
        out.push((
            header.msg_type.as_u8(),
            header.message_seq,
            rest[..header.fragment_length as usize].to_vec(),
        ));
    }
    out
}

pub fn flight_message_types(flight: &Flight) -> Vec<u8> {
    flight_messages(flight).iter().map(|(t, _, _)| *t).collect()
}

/// A minimal client side of the handshake, enough to drive the server
/// through every scenario: it builds wire messages, mirrors the
/// transcript, and derives the same key material.
pub struct TestClient {
    pub random: Random,
    pub cookie: Cookie,
    pub cipher_suites: Vec<CipherSuite>,
    pub curves_extension: Option<Vec<u8>>,
    pub cert_type_extensions: Vec<(ExtensionType, Vec<u8>)>,
    pub version: ProtocolVersion,
    pub next_seq: u16,
    pub record_seq: u64,
    pub transcript: Vec<u8>,
    pub master_secret: Option<Vec<u8>>,
    pub last_client_verify_data: Option<[u8; 12]>,
}

impl TestClient {
    pub fn new(cipher_suites: Vec<CipherSuite>) -> Self {
        TestClient {
            random: Random::new(),
            cookie: Cookie::empty(),
            cipher_suites,
            curves_extension: None,
            cert_type_extensions: Vec::new(),
            version: ProtocolVersion::DTLS1_2,
            next_seq: 0,
            record_seq: 0,
            transcript: Vec::new(),
            master_secret: None,
            last_client_verify_data: None,
        }
    }

    /// Offer secp256r1 in the supported_elliptic_curves extension.
    pub fn with_secp256r1(mut self) -> Self {
        self.curves_extension = Some(vec![0x00, 0x02, 0x00, 0x17]);
        self
    }

    /// Offer a certificate type list (values per RFC 7250).
    pub fn with_certificate_types(mut self, extension_type: ExtensionType, types: &[u8]) -> Self {
        let mut data = vec![types.len() as u8];
        data.extend_from_slice(types);
        self.cert_type_extensions.push((extension_type, data));
        self
    }

    /// The serialized ClientHello body with the current cookie.
    pub fn client_hello_body(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.version.as_u16().to_be_bytes());
        body.extend_from_slice(&self.random.to_bytes());
        body.push(0); // session_id length
        body.push(self.cookie.len() as u8);
        body.extend_from_slice(&self.cookie);
        body.extend_from_slice(&(self.cipher_suites.len() as u16 * 2).to_be_bytes());
        for suite in &self.cipher_suites {
            body.extend_from_slice(&suite.as_u16().to_be_bytes());
        }
        body.push(1); // one compression method
        body.push(CompressionMethod::Null.as_u8());

        let mut extensions = Vec::new();
        if let Some(curves) = &self.curves_extension {
            extensions.extend_from_slice(&0x000Au16.to_be_bytes());
            extensions.extend_from_slice(&(curves.len() as u16).to_be_bytes());
            extensions.extend_from_slice(curves);
        }
        for (extension_type, data) in &self.cert_type_extensions {
            extensions.extend_from_slice(&extension_type.as_u16().to_be_bytes());
            extensions.extend_from_slice(&(data.len() as u16).to_be_bytes());
            extensions.extend_from_slice(data);
        }
        if !extensions.is_empty() {
            body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
            body.extend_from_slice(&extensions);
        }

        body
    }

    /// Send a handshake message, appending it to the mirrored transcript
    /// unless told otherwise (the cookieless ClientHello stays outside).
    pub fn send(
        &mut self,
        server: &mut ServerHandshake,
        msg_type: u8,
        body: &[u8],
        epoch: u16,
        in_transcript: bool,
    ) -> Result<Option<Flight>, cambium::Error> {
        let fragment = hs_message(msg_type, self.next_seq, body);
        self.next_seq += 1;
        if in_transcript {
            self.transcript.extend_from_slice(&fragment);
        }
        let sequence = self.record_seq;
        self.record_seq += 1;
        server.process_record(hs_record(epoch, sequence, fragment))
    }

    /// Send the cookieless ClientHello and absorb the returned
    /// HelloVerifyRequest cookie.
    pub fn hello_exchange(&mut self, server: &mut ServerHandshake) -> Flight {
        let body = self.client_hello_body();
        let flight = self
            .send(server, CLIENT_HELLO, &body, 0, false)
            .expect("first ClientHello")
            .expect("HelloVerifyRequest flight");

        let messages = flight_messages(&flight);
        assert_eq!(messages.len(), 1, "expected exactly one HelloVerifyRequest");
        let (msg_type, _, hvr_body) = &messages[0];
        assert_eq!(*msg_type, HELLO_VERIFY_REQUEST);

        // version(2) || cookie_len(1) || cookie
        let cookie_len = hvr_body[2] as usize;
        self.cookie = Cookie::try_new(&hvr_body[3..3 + cookie_len]).unwrap();
        flight
    }

    /// Send the ClientHello carrying the cookie; returns the server
    /// flight and mirrors it into the transcript.
    pub fn cookie_hello(&mut self, server: &mut ServerHandshake) -> Flight {
        let body = self.client_hello_body();
        let flight = self
            .send(server, CLIENT_HELLO, &body, 0, true)
            .expect("cookie ClientHello")
            .expect("server flight");

        for record in flight.records() {
            if record.content_type == ContentType::Handshake {
                self.transcript.extend_from_slice(&record.fragment);
            }
        }
        flight
    }

    /// Derive the master secret from a premaster, mirroring the server.
    pub fn derive_master_secret(&mut self, premaster: &[u8], server_random: &[u8]) {
        let master = crypto::calculate_master_secret(
            premaster,
            &self.random.to_bytes(),
            server_random,
        )
        .unwrap();
        self.master_secret = Some(master);
    }

    /// The client Finished verify data over the current transcript.
    pub fn client_verify_data(&self) -> [u8; 12] {
        let hash: [u8; 32] = Sha256::digest(&self.transcript).into();
        crypto::verify_data(self.master_secret.as_ref().unwrap(), true, &hash).unwrap()
    }

    /// Check a server Finished against the mirrored transcript (which
    /// must already include the client's Finished).
    pub fn check_server_finished(&mut self, flight: &Flight) {
        let messages = flight_messages(flight);
        let (_, _, body) = messages
            .iter()
            .find(|(t, _, _)| *t == FINISHED)
            .expect("server Finished present");

        let hash: [u8; 32] = Sha256::digest(&self.transcript).into();
        let expected =
            crypto::verify_data(self.master_secret.as_ref().unwrap(), false, &hash).unwrap();
        assert_eq!(body.as_slice(), &expected, "server Finished verify_data");
    }

    /// Send CCS then Finished, returning the terminal flight. The
    /// caller must have derived the master secret first.
    pub fn finish(&mut self, server: &mut ServerHandshake) -> Flight {
        let sequence = self.record_seq;
        self.record_seq += 1;
        server
            .process_record(ccs_record(sequence))
            .expect("ChangeCipherSpec accepted");

        let verify_data = self.client_verify_data();
        self.last_client_verify_data = Some(verify_data);
        let flight = self
            .send(server, FINISHED, &verify_data, 1, true)
            .expect("client Finished")
            .expect("terminal flight");
        flight
    }

    /// Extract a field from the server flight by message type.
    pub fn server_message<'a>(flight: &'a [(u8, u16, Vec<u8>)], msg_type: u8) -> Option<&'a [u8]> {
        flight
            .iter()
            .find(|(t, _, _)| *t == msg_type)
            .map(|(_, _, body)| body.as_slice())
    }
}

/// Server random (32 bytes) out of a ServerHello body.
pub fn server_hello_random(server_hello_body: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&server_hello_body[2..34]);
    out
}

/// Generate a self-signed ECDSA P-256 certificate for tests.
pub fn generate_certificate(common_name: &str) -> (Vec<u8>, Vec<u8>) {
    let params = rcgen::CertificateParams::new(vec![common_name.to_string()]);
    let cert = rcgen::Certificate::from_params(params).unwrap();
    (
        cert.serialize_der().unwrap(),
        cert.serialize_private_key_der(),
    )
}
