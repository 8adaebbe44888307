use std::net::SocketAddr;

use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

use crate::message::{ClientHello, Cookie};

type HmacSha256 = Hmac<Sha256>;

/// Stateless cookie generation and verification for
/// `HelloVerifyRequest` (RFC 6347 §4.2.1).
///
/// The cookie binds the client's address and hello parameters to an
/// HMAC under a process-wide secret, so no per-client state exists until
/// a client proves it can receive at its claimed address. The secret is
/// generated at construction; `rotate` installs a fresh one while
/// verification keeps accepting the previous secret, so handshakes in
/// flight across a rotation still complete.
pub struct CookieGenerator {
    secret: [u8; 32],
    previous: Option<[u8; 32]>,
}

impl CookieGenerator {
    pub fn new() -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);

        CookieGenerator {
            secret,
            previous: None,
        }
    }

    /// Replace the secret, keeping the old one for verification of
    /// cookies issued before the rotation.
    pub fn rotate(&mut self) {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);

        self.previous = Some(std::mem::replace(&mut self.secret, secret));
    }

    pub(crate) fn generate(&self, peer: &SocketAddr, hello: &ClientHello) -> Cookie {
        compute(&self.secret, peer, hello)
    }

    pub(crate) fn verify(&self, peer: &SocketAddr, hello: &ClientHello) -> bool {
        if hello.cookie.is_empty() {
            return false;
        }

        if *compute(&self.secret, peer, hello) == *hello.cookie {
            return true;
        }

        match &self.previous {
            Some(previous) => *compute(previous, peer, hello) == *hello.cookie,
            None => false,
        }
    }
}

impl Default for CookieGenerator {
    fn default() -> Self {
        CookieGenerator::new()
    }
}

/// cookie = HMAC(secret, peer address || version || client_random ||
/// session_id || cipher_suites || compression_methods)
fn compute(secret: &[u8], peer: &SocketAddr, hello: &ClientHello) -> Cookie {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");

    mac.update(peer.to_string().as_bytes());
    mac.update(&[hello.client_version.major(), hello.client_version.minor()]);
    mac.update(&hello.random.to_bytes());
    mac.update(&hello.session_id);
    for suite in &hello.cipher_suites {
        mac.update(&suite.as_u16().to_be_bytes());
    }
    for method in &hello.compression_methods {
        mac.update(&[method.as_u8()]);
    }

    let tag = mac.finalize().into_bytes();
    Cookie::try_new(&tag[..32]).expect("HMAC-SHA256 output fits a cookie")
}
