//! Wire codec for the DTLS 1.2 handshake messages the server produces
//! and consumes.
//!
//! Every message has a `parse` (nom) and a `serialize` counterpart that are
//! bit-exact inverses of each other on the formats in RFC 6347 / RFC 5246.

mod alert;
mod certificate;
mod certificate_request;
mod certificate_verify;
mod change_cipher_spec;
mod client_hello;
mod client_key_exchange;
mod digitally_signed;
mod extension;
mod finished;
mod handshake;
mod hello_verify_request;
mod id;
mod named_curve;
mod random;
mod server_hello;
mod server_key_exchange;

pub use alert::{AlertDescription, AlertLevel, AlertMessage};
pub use certificate::Certificate;
pub use certificate_request::{CertificateRequest, DistinguishedName};
pub use certificate_verify::CertificateVerify;
pub use change_cipher_spec::ChangeCipherSpec;
pub use client_hello::ClientHello;
pub use client_key_exchange::{ClientKeyExchange, ExchangeKeys};
pub use digitally_signed::DigitallySigned;
pub use extension::{Extension, ExtensionType};
pub use finished::Finished;
pub use handshake::Header;
pub(crate) use handshake::serialize_message;
pub use hello_verify_request::HelloVerifyRequest;
pub use id::{Cookie, SessionId};
pub use named_curve::{CurveType, NamedCurve};
pub use random::Random;
pub use server_hello::ServerHello;
pub use server_key_exchange::{EcdhParams, ServerKeyExchange};

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

/// DTLS record content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Unknown(u8),
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Unknown(value) => *value,
        }
    }
}

/// Handshake message type (RFC 5246 §7.4, RFC 6347 §4.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    HelloRequest,
    ClientHello,
    ServerHello,
    HelloVerifyRequest,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    Unknown(u8),
}

impl MessageType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => MessageType::HelloRequest,
            1 => MessageType::ClientHello,
            2 => MessageType::ServerHello,
            3 => MessageType::HelloVerifyRequest,
            11 => MessageType::Certificate,
            12 => MessageType::ServerKeyExchange,
            13 => MessageType::CertificateRequest,
            14 => MessageType::ServerHelloDone,
            15 => MessageType::CertificateVerify,
            16 => MessageType::ClientKeyExchange,
            20 => MessageType::Finished,
            _ => MessageType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::HelloRequest => 0,
            MessageType::ClientHello => 1,
            MessageType::ServerHello => 2,
            MessageType::HelloVerifyRequest => 3,
            MessageType::Certificate => 11,
            MessageType::ServerKeyExchange => 12,
            MessageType::CertificateRequest => 13,
            MessageType::ServerHelloDone => 14,
            MessageType::CertificateVerify => 15,
            MessageType::ClientKeyExchange => 16,
            MessageType::Finished => 20,
            MessageType::Unknown(value) => *value,
        }
    }

    pub(crate) fn parse(input: &[u8]) -> IResult<&[u8], MessageType> {
        let (input, value) = be_u8(input)?;
        Ok((input, MessageType::from_u8(value)))
    }
}

/// DTLS protocol version. The on-wire encoding is the one's complement
/// of the TLS version, so *smaller* values are *newer*.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    DTLS1_0,
    DTLS1_2,
    Unknown(u16),
}

impl ProtocolVersion {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0xFEFF => ProtocolVersion::DTLS1_0,
            0xFEFD => ProtocolVersion::DTLS1_2,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::DTLS1_0 => 0xFEFF,
            ProtocolVersion::DTLS1_2 => 0xFEFD,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    /// The major version byte (254 for DTLS).
    pub fn major(&self) -> u8 {
        (self.as_u16() >> 8) as u8
    }

    /// The minor version byte (253 for DTLS 1.2).
    pub fn minor(&self) -> u8 {
        self.as_u16() as u8
    }

    /// True when this version is at least DTLS 1.2. Because of the
    /// complemented encoding this is a *less-or-equal* comparison.
    pub fn is_at_least_dtls12(&self) -> bool {
        self.as_u16() <= ProtocolVersion::DTLS1_2.as_u16()
    }

    pub(crate) fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, value) = be_u16(input)?;
        Ok((input, ProtocolVersion::from_u16(value)))
    }
}

/// The cipher suites this server knows about.
///
/// `SSL_NULL_WITH_NULL_NULL` is carried in the supported list but is never
/// negotiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    SSL_NULL_WITH_NULL_NULL,
    TLS_PSK_WITH_AES_128_CCM_8,
    TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8,
    Unknown(u16),
}

impl CipherSuite {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0000 => CipherSuite::SSL_NULL_WITH_NULL_NULL,
            0xC0A8 => CipherSuite::TLS_PSK_WITH_AES_128_CCM_8,
            0xC0AE => CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8,
            _ => CipherSuite::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CipherSuite::SSL_NULL_WITH_NULL_NULL => 0x0000,
            CipherSuite::TLS_PSK_WITH_AES_128_CCM_8 => 0xC0A8,
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8 => 0xC0AE,
            CipherSuite::Unknown(value) => *value,
        }
    }

    /// The key exchange algorithm implied by the suite.
    pub fn key_exchange_algorithm(&self) -> KeyExchangeAlgorithm {
        match self {
            CipherSuite::SSL_NULL_WITH_NULL_NULL => KeyExchangeAlgorithm::Null,
            CipherSuite::TLS_PSK_WITH_AES_128_CCM_8 => KeyExchangeAlgorithm::Psk,
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8 => {
                KeyExchangeAlgorithm::EcDiffieHellman
            }
            CipherSuite::Unknown(_) => KeyExchangeAlgorithm::Unknown,
        }
    }

    pub(crate) fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, CipherSuite::from_u16(value)))
    }
}

impl Default for CipherSuite {
    fn default() -> Self {
        CipherSuite::SSL_NULL_WITH_NULL_NULL
    }
}

/// Key exchange algorithms reachable through the supported suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeAlgorithm {
    Null,
    Psk,
    EcDiffieHellman,
    Unknown,
}

/// Compression methods. Only the null method is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Null,
    Unknown(u8),
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => CompressionMethod::Null,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CompressionMethod::Null => 0x00,
            CompressionMethod::Unknown(value) => *value,
        }
    }

    pub(crate) fn parse(input: &[u8]) -> IResult<&[u8], CompressionMethod> {
        let (input, value) = be_u8(input)?;
        Ok((input, CompressionMethod::from_u8(value)))
    }
}

impl Default for CompressionMethod {
    fn default() -> Self {
        CompressionMethod::Null
    }
}

/// Hash algorithm identifiers (RFC 5246 §7.4.1.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum HashAlgorithm {
    SHA256,
    Unknown(u8),
}

impl HashAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            4 => HashAlgorithm::SHA256,
            _ => HashAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HashAlgorithm::SHA256 => 4,
            HashAlgorithm::Unknown(value) => *value,
        }
    }
}

/// Signature algorithm identifiers (RFC 5246 §7.4.1.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum SignatureAlgorithm {
    ECDSA,
    Unknown(u8),
}

impl SignatureAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            3 => SignatureAlgorithm::ECDSA,
            _ => SignatureAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            SignatureAlgorithm::ECDSA => 3,
            SignatureAlgorithm::Unknown(value) => *value,
        }
    }
}

/// A (hash, signature) algorithm pair as carried in `CertificateRequest`,
/// `ServerKeyExchange` and `CertificateVerify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureAndHashAlgorithm {
    pub hash: HashAlgorithm,
    pub signature: SignatureAlgorithm,
}

impl SignatureAndHashAlgorithm {
    pub fn new(hash: HashAlgorithm, signature: SignatureAlgorithm) -> Self {
        SignatureAndHashAlgorithm { hash, signature }
    }

    /// The only scheme this profile signs with: ECDSA over SHA-256.
    pub fn ecdsa_sha256() -> Self {
        SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::ECDSA)
    }

    pub fn from_u16(value: u16) -> Self {
        SignatureAndHashAlgorithm {
            hash: HashAlgorithm::from_u8((value >> 8) as u8),
            signature: SignatureAlgorithm::from_u8(value as u8),
        }
    }

    pub fn to_u16(&self) -> u16 {
        ((self.hash.as_u8() as u16) << 8) | self.signature.as_u8() as u16
    }

    pub(crate) fn parse(input: &[u8]) -> IResult<&[u8], SignatureAndHashAlgorithm> {
        let (input, value) = be_u16(input)?;
        Ok((input, SignatureAndHashAlgorithm::from_u16(value)))
    }
}

impl Default for SignatureAndHashAlgorithm {
    fn default() -> Self {
        SignatureAndHashAlgorithm::ecdsa_sha256()
    }
}

/// Client certificate types for `CertificateRequest` (RFC 5246 §7.4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ClientCertificateType {
    ECDSA_SIGN,
    Unknown(u8),
}

impl ClientCertificateType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            64 => ClientCertificateType::ECDSA_SIGN,
            _ => ClientCertificateType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ClientCertificateType::ECDSA_SIGN => 64,
            ClientCertificateType::Unknown(value) => *value,
        }
    }
}

impl Default for ClientCertificateType {
    fn default() -> Self {
        ClientCertificateType::ECDSA_SIGN
    }
}

/// Certificate payload types negotiated via the certificate type
/// extensions (X.509 or a bare SubjectPublicKeyInfo).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateType {
    X509,
    RawPublicKey,
    Unknown(u8),
}

impl CertificateType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => CertificateType::X509,
            2 => CertificateType::RawPublicKey,
            _ => CertificateType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CertificateType::X509 => 0,
            CertificateType::RawPublicKey => 2,
            CertificateType::Unknown(value) => *value,
        }
    }
}

impl Default for CertificateType {
    fn default() -> Self {
        CertificateType::X509
    }
}

/// EC point formats (RFC 8422 §5.1.2). Only uncompressed is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ECPointFormat {
    Uncompressed,
    Unknown(u8),
}

impl ECPointFormat {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ECPointFormat::Uncompressed,
            _ => ECPointFormat::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ECPointFormat::Uncompressed => 0,
            ECPointFormat::Unknown(value) => *value,
        }
    }
}

impl Default for ECPointFormat {
    fn default() -> Self {
        ECPointFormat::Uncompressed
    }
}
