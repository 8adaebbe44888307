//! Cryptographic primitives for the handshake: the TLS 1.2 PRF,
//! transcript hashing, ephemeral ECDH, ECDSA signing/verification and
//! premaster secret construction.
//!
//! Record-layer ciphers are intentionally absent; the record layer owns
//! encryption and consumes the key block exported by [`crate::Session`].

mod hash;
mod key_exchange;
mod prf;
mod signing;

pub use hash::Hash;
pub use key_exchange::{psk_premaster_secret, EcdheKeyExchange};
pub use prf::{calculate_master_secret, key_expansion, prf_tls12, verify_data};
pub use signing::{
    load_signing_key, public_key_from_certificate, public_key_from_spki, sign_ecdsa_sha256,
    subject_name, subject_public_key_info, verify_certificate_chain, verify_ecdsa_sha256,
};
