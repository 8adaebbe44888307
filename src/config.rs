use std::collections::HashMap;

use crate::crypto;
use crate::Error;

/// Server configuration, injected into each handshake.
#[derive(Clone, Default)]
pub struct Config {
    client_authentication_required: bool,
    certificates: Vec<Vec<u8>>,
    private_key: Vec<u8>,
    trust_anchors: Vec<Vec<u8>>,
    preshared_keys: HashMap<String, Vec<u8>>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            client_authentication_required: false,
            certificates: Vec::new(),
            private_key: Vec::new(),
            trust_anchors: Vec::new(),
            preshared_keys: HashMap::new(),
        }
    }

    /// Whether the client must authenticate with a certificate.
    ///
    /// Drives `CertificateRequest` emission and the mandatory-auth check
    /// when the client's `Finished` arrives.
    #[inline(always)]
    pub fn client_authentication_required(&self) -> bool {
        self.client_authentication_required
    }

    /// The server's X.509 chain in DER, leaf first.
    #[inline(always)]
    pub fn certificates(&self) -> &[Vec<u8>] {
        &self.certificates
    }

    /// The ECDSA private key matching the end-entity certificate, DER.
    #[inline(always)]
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    /// Trusted DER certificates for client certificate verification.
    #[inline(always)]
    pub fn trust_anchors(&self) -> &[Vec<u8>] {
        &self.trust_anchors
    }

    /// Look up a preshared key by its UTF-8 identity.
    pub fn preshared_key(&self, identity: &str) -> Option<&[u8]> {
        self.preshared_keys.get(identity).map(|k| k.as_slice())
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    client_authentication_required: bool,
    certificates: Vec<Vec<u8>>,
    private_key: Vec<u8>,
    trust_anchors: Vec<Vec<u8>>,
    preshared_keys: HashMap<String, Vec<u8>>,
}

impl ConfigBuilder {
    /// Require the client to authenticate with a certificate.
    ///
    /// Defaults to false.
    pub fn client_authentication_required(mut self, required: bool) -> Self {
        self.client_authentication_required = required;
        self
    }

    /// Set the server's certificate chain (DER, leaf first) and the
    /// matching ECDSA private key (PKCS#8 or SEC1 DER).
    ///
    /// Required for the ECDHE-ECDSA suite; a PSK-only server may leave
    /// it unset.
    pub fn certificate_chain(mut self, certificates: Vec<Vec<u8>>, private_key: Vec<u8>) -> Self {
        self.certificates = certificates;
        self.private_key = private_key;
        self
    }

    /// Add a trusted certificate (DER) for client chain verification.
    pub fn add_trust_anchor(mut self, certificate: Vec<u8>) -> Self {
        self.trust_anchors.push(certificate);
        self
    }

    /// Add a preshared key under its identity.
    pub fn add_preshared_key(mut self, identity: impl Into<String>, key: Vec<u8>) -> Self {
        self.preshared_keys.insert(identity.into(), key);
        self
    }

    /// Build the configuration, validating the private key when a
    /// certificate chain is present.
    pub fn build(self) -> Result<Config, Error> {
        if !self.certificates.is_empty() {
            crypto::load_signing_key(&self.private_key).map_err(Error::ConfigError)?;
        }

        Ok(Config {
            client_authentication_required: self.client_authentication_required,
            certificates: self.certificates,
            private_key: self.private_key,
            trust_anchors: self.trust_anchors,
            preshared_keys: self.preshared_keys,
        })
    }
}
