use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::{ecdh::EphemeralSecret, EncodedPoint, PublicKey};
use rand::rngs::OsRng;

use crate::message::NamedCurve;

/// Server-side ephemeral ECDH state for one handshake.
///
/// Only P-256 is implemented; curve negotiation guarantees this is the
/// curve that reaches us.
pub struct EcdheKeyExchange {
    named_curve: NamedCurve,
    secret: EphemeralSecret,
    public_point: Vec<u8>,
}

impl EcdheKeyExchange {
    /// Generate a fresh ephemeral key on the negotiated curve.
    pub fn new(named_curve: NamedCurve) -> Result<Self, String> {
        if named_curve != NamedCurve::Secp256r1 {
            return Err(format!("Unsupported curve: {:?}", named_curve));
        }

        let secret = EphemeralSecret::random(&mut OsRng);
        let public_point = PublicKey::from(&secret)
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();

        Ok(EcdheKeyExchange {
            named_curve,
            secret,
            public_point,
        })
    }

    pub fn named_curve(&self) -> NamedCurve {
        self.named_curve
    }

    /// The server's ephemeral public point, uncompressed SEC1 encoding.
    pub fn public_point(&self) -> &[u8] {
        &self.public_point
    }

    /// Run the ECDH agreement against the client's point. The premaster
    /// secret is the X coordinate of the shared point, in the curve's
    /// field size with leading zeros preserved (32 bytes for P-256).
    pub fn shared_secret(&self, peer_point: &[u8]) -> Result<Vec<u8>, String> {
        let encoded_point = EncodedPoint::from_bytes(peer_point)
            .map_err(|_| "Invalid peer public key encoding".to_string())?;

        let public_key_opt = PublicKey::from_encoded_point(&encoded_point);
        if public_key_opt.is_none().into() {
            return Err("Peer public key is not a point on P-256".to_string());
        }
        let public_key = public_key_opt.unwrap();

        let shared_secret = self.secret.diffie_hellman(&public_key);
        Ok(shared_secret.raw_secret_bytes().as_slice().to_vec())
    }
}

/// PSK premaster secret (RFC 4279 §2):
/// `uint16(len) || zero_bytes(len) || uint16(len) || psk`.
pub fn psk_premaster_secret(psk: &[u8]) -> Vec<u8> {
    let len = psk.len() as u16;

    let mut out = Vec::with_capacity(4 + 2 * psk.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend(std::iter::repeat(0).take(psk.len()));
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(psk);
    out
}
