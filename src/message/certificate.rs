use nom::bytes::complete::take;
use nom::number::complete::be_u24;
use nom::IResult;
use smallvec::SmallVec;

/// The `Certificate` handshake message.
///
/// The body format depends on the negotiated certificate type: an X.509
/// chain (a 24-bit total length followed by 24-bit length-prefixed DER
/// certificates) or a single SubjectPublicKeyInfo blob behind a 24-bit
/// length (raw public key mode, RFC 7250).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Certificate {
    X509Chain(SmallVec<[Vec<u8>; 4]>),
    RawPublicKey(Vec<u8>),
}

impl Certificate {
    /// Parse a certificate body. The wire format is ambiguous between the
    /// two modes, so the caller states which one was negotiated.
    pub fn parse(input: &[u8], raw_public_key: bool) -> IResult<&[u8], Certificate> {
        if raw_public_key {
            let (input, spki_len) = be_u24(input)?;
            let (input, spki) = take(spki_len)(input)?;
            return Ok((input, Certificate::RawPublicKey(spki.to_vec())));
        }

        let (input, total_len) = be_u24(input)?;
        let (input, mut chain_data) = take(total_len)(input)?;

        let mut certificates = SmallVec::new();
        while !chain_data.is_empty() {
            let (rest, cert_len) = be_u24(chain_data)?;
            let (rest, cert) = take(cert_len)(rest)?;
            certificates.push(cert.to_vec());
            chain_data = rest;
        }

        Ok((input, Certificate::X509Chain(certificates)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            Certificate::X509Chain(certificates) => {
                let total_len: usize = certificates.iter().map(|cert| cert.len() + 3).sum();
                output.extend_from_slice(&(total_len as u32).to_be_bytes()[1..]);

                for cert in certificates {
                    output.extend_from_slice(&(cert.len() as u32).to_be_bytes()[1..]);
                    output.extend_from_slice(cert);
                }
            }
            Certificate::RawPublicKey(spki) => {
                output.extend_from_slice(&(spki.len() as u32).to_be_bytes()[1..]);
                output.extend_from_slice(spki);
            }
        }
    }

    /// True for an X.509 body carrying no certificates (a client is
    /// allowed to answer a `CertificateRequest` with an empty chain).
    pub fn is_empty(&self) -> bool {
        match self {
            Certificate::X509Chain(certificates) => certificates.is_empty(),
            Certificate::RawPublicKey(spki) => spki.is_empty(),
        }
    }
}
