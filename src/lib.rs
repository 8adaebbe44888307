//! cambium — server-side DTLS 1.2 handshake core
//!
//! cambium is the handshake state machine of a constrained-device
//! security layer (CoAP-over-DTLS). It is sans-IO: an outer driver owns
//! the UDP socket and the record layer (encryption, sequence numbers,
//! replay protection), demultiplexes records to per-peer
//! [`ServerHandshake`] instances, and transmits the [`Flight`]s the core
//! returns.
//!
//! # Scope
//! - Server handshake only: `ClientHello` → `HelloVerifyRequest` →
//!   `ClientHello`+cookie → server flight → client auth flight →
//!   `ChangeCipherSpec`/`Finished` both ways.
//! - Stateless cookie DoS mitigation (RFC 6347 §4.2.1).
//! - Transcript hashing, PRF key derivation, `Finished` verification.
//! - Fragment reassembly and out-of-order buffering of handshake
//!   messages.
//! - Bit-exact wire codec for every message the server produces or
//!   consumes.
//!
//! Cipher suites: `TLS_PSK_WITH_AES_128_CCM_8` and
//! `TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8` (plus the never-negotiable null
//! suite). No renegotiation, no session resumption, no DTLS 1.0/1.3,
//! null compression only.
//!
//! # Driving the machine
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cambium::{Config, CookieGenerator, Record, ServerHandshake};
//!
//! fn deliver(_flight: &cambium::Flight) { /* hand to record layer */ }
//!
//! # fn next_record() -> Record { unimplemented!() }
//! let config = Arc::new(
//!     Config::builder()
//!         .add_preshared_key("device-1", b"secret".to_vec())
//!         .build()
//!         .unwrap(),
//! );
//! let cookies = Arc::new(CookieGenerator::new());
//!
//! let mut handshake = ServerHandshake::new(
//!     "192.0.2.1:5684".parse().unwrap(),
//!     config,
//!     cookies,
//!     Box::new(()),
//! );
//!
//! loop {
//!     let record = next_record(); // decrypted by the record layer
//!     match handshake.process_record(record) {
//!         Ok(Some(flight)) => deliver(&flight),
//!         Ok(None) => {}
//!         Err(e) => {
//!             // Fatal: the alert goes on the wire before teardown.
//!             let _alert = e.alert();
//!             break;
//!         }
//!     }
//!     if handshake.is_done() {
//!         break;
//!     }
//! }
//! ```
//!
//! Concurrency: one `ServerHandshake` per peer, entered serially. The
//! only shared state between handshakes is the [`CookieGenerator`]
//! secret and the configuration, both read-only after setup.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::upper_case_acronyms)]

#[macro_use]
extern crate log;

pub mod crypto;
pub mod message;

mod util;

mod config;
pub use config::{Config, ConfigBuilder};

mod error;
pub use error::Error;

mod cookie;
pub use cookie::CookieGenerator;

mod flight;
pub use flight::{Flight, FlightRecord};

mod session;
pub use session::Session;

mod server;
pub use server::{RecordLayer, ServerHandshake};

mod fragment;
mod transcript;

use message::ContentType;

/// One decrypted record handed to the core by the record layer.
#[derive(Debug, Clone)]
pub struct Record {
    /// The record's content type.
    pub content_type: ContentType,
    /// The epoch the record was received under.
    pub epoch: u16,
    /// The record-layer sequence number.
    pub sequence: u64,
    /// The decrypted record payload.
    pub fragment: Vec<u8>,
}

impl Record {
    /// Convenience constructor for a handshake record.
    pub fn handshake(epoch: u16, sequence: u64, fragment: Vec<u8>) -> Self {
        Record {
            content_type: ContentType::Handshake,
            epoch,
            sequence,
            fragment,
        }
    }
}
