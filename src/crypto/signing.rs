use der::{Decode, Encode};
use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use pkcs8::{DecodePrivateKey, DecodePublicKey};
use sha2::{Digest, Sha256};
use x509_cert::Certificate as X509Certificate;

/// Parse an ECDSA P-256 private key from DER bytes.
///
/// PKCS#8 is tried first (the common format), then SEC1 (the OpenSSL
/// `EC PRIVATE KEY` format).
pub fn load_signing_key(key_der: &[u8]) -> Result<SigningKey, String> {
    if let Ok(key) = SigningKey::from_pkcs8_der(key_der) {
        return Ok(key);
    }

    if let Ok(secret) = p256::SecretKey::from_sec1_der(key_der) {
        return Ok(SigningKey::from(&secret));
    }

    Err("Failed to parse private key as PKCS#8 or SEC1 DER".to_string())
}

/// Sign `data` with ECDSA P-256 over SHA-256, returning a DER signature.
pub fn sign_ecdsa_sha256(key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, String> {
    let hash = Sha256::digest(data);

    let signature: Signature = key
        .sign_prehash(hash.as_slice())
        .map_err(|_| "Signing failed".to_string())?;

    let der = signature.to_der();
    Ok(der.as_bytes().to_vec())
}

/// Verify a DER-encoded ECDSA P-256/SHA-256 signature over `data`.
pub fn verify_ecdsa_sha256(
    key: &VerifyingKey,
    data: &[u8],
    signature_der: &[u8],
) -> Result<(), String> {
    let hash = Sha256::digest(data);

    let signature = Signature::from_der(signature_der)
        .map_err(|_| "Invalid signature encoding".to_string())?;

    key.verify_prehash(hash.as_slice(), &signature)
        .map_err(|_| "ECDSA signature verification failed".to_string())
}

/// Extract the verifying key from a DER SubjectPublicKeyInfo blob
/// (the raw-public-key certificate payload).
pub fn public_key_from_spki(spki_der: &[u8]) -> Result<VerifyingKey, String> {
    let public_key = p256::PublicKey::from_public_key_der(spki_der)
        .map_err(|e| format!("Unsupported public key: {}", e))?;
    Ok(VerifyingKey::from(public_key))
}

/// Extract the verifying key from a DER X.509 certificate.
pub fn public_key_from_certificate(cert_der: &[u8]) -> Result<VerifyingKey, String> {
    let spki = subject_public_key_info(cert_der)?;
    public_key_from_spki(&spki)
}

/// The DER SubjectPublicKeyInfo of a certificate, used as the body of a
/// raw-public-key `Certificate` message.
pub fn subject_public_key_info(cert_der: &[u8]) -> Result<Vec<u8>, String> {
    let cert = X509Certificate::from_der(cert_der)
        .map_err(|e| format!("Failed to parse certificate: {}", e))?;

    cert.tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| format!("Failed to encode SubjectPublicKeyInfo: {}", e))
}

/// The DER-encoded subject name of a certificate, for the
/// `certificate_authorities` list of `CertificateRequest`.
pub fn subject_name(cert_der: &[u8]) -> Result<Vec<u8>, String> {
    let cert = X509Certificate::from_der(cert_der)
        .map_err(|e| format!("Failed to parse certificate: {}", e))?;

    cert.tbs_certificate
        .subject
        .to_der()
        .map_err(|e| format!("Failed to encode subject name: {}", e))
}

/// Verify a certificate chain (leaf first) against a set of trusted DER
/// certificates.
///
/// Each certificate must be signed by its successor; the last one must
/// either be an anchor byte-for-byte or verify against an anchor's key.
/// The profile is ECDSA-P256/SHA-256 throughout, so no algorithm
/// negotiation happens here.
pub fn verify_certificate_chain(
    chain: &[Vec<u8>],
    trust_anchors: &[Vec<u8>],
) -> Result<(), String> {
    let Some(last) = chain.last() else {
        return Err("Empty certificate chain".to_string());
    };

    for pair in chain.windows(2) {
        verify_issued_by(&pair[0], &pair[1])?;
    }

    if trust_anchors.iter().any(|anchor| anchor == last) {
        return Ok(());
    }

    for anchor in trust_anchors {
        if verify_issued_by(last, anchor).is_ok() {
            return Ok(());
        }
    }

    Err("No trust anchor matches the certificate chain".to_string())
}

fn verify_issued_by(cert_der: &[u8], issuer_der: &[u8]) -> Result<(), String> {
    let cert = X509Certificate::from_der(cert_der)
        .map_err(|e| format!("Failed to parse certificate: {}", e))?;

    let tbs = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| format!("Failed to encode TBSCertificate: {}", e))?;

    let signature = cert
        .signature
        .as_bytes()
        .ok_or_else(|| "Invalid certificate signature bitstring".to_string())?;

    let issuer_key = public_key_from_certificate(issuer_der)?;
    verify_ecdsa_sha256(&issuer_key, &tbs, signature)
}
