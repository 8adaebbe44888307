use std::ops::Deref;

use nom::number::complete::{be_u16, be_u8};
use nom::{bytes::complete::take, IResult};
use smallvec::SmallVec;

use super::{ClientCertificateType, SignatureAndHashAlgorithm};

/// A DER-encoded X.501 distinguished name, as listed in the
/// `certificate_authorities` field.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DistinguishedName<'a>(pub &'a [u8]);

impl Deref for DistinguishedName<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct CertificateRequest<'a> {
    pub certificate_types: SmallVec<[ClientCertificateType; 4]>,
    pub supported_signature_algorithms: SmallVec<[SignatureAndHashAlgorithm; 8]>,
    pub certificate_authorities: SmallVec<[DistinguishedName<'a>; 8]>,
}

impl<'a> CertificateRequest<'a> {
    pub fn new(
        certificate_types: SmallVec<[ClientCertificateType; 4]>,
        supported_signature_algorithms: SmallVec<[SignatureAndHashAlgorithm; 8]>,
        certificate_authorities: SmallVec<[DistinguishedName<'a>; 8]>,
    ) -> Self {
        CertificateRequest {
            certificate_types,
            supported_signature_algorithms,
            certificate_authorities,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], CertificateRequest<'a>> {
        let (input, cert_types_len) = be_u8(input)?;
        let (input, cert_types_data) = take(cert_types_len)(input)?;
        let certificate_types = cert_types_data
            .iter()
            .map(|&b| ClientCertificateType::from_u8(b))
            .collect();

        let (input, sig_algs_len) = be_u16(input)?;
        let (input, sig_algs_data) = take(sig_algs_len)(input)?;
        let supported_signature_algorithms = sig_algs_data
            .chunks_exact(2)
            .map(|chunk| {
                SignatureAndHashAlgorithm::from_u16(u16::from_be_bytes([chunk[0], chunk[1]]))
            })
            .collect();

        let (input, cert_auths_len) = be_u16(input)?;
        let (input, mut auths_data) = take(cert_auths_len)(input)?;
        let mut certificate_authorities = SmallVec::new();

        while !auths_data.is_empty() {
            let (rest, name_len) = be_u16(auths_data)?;
            let (rest, name_data) = take(name_len)(rest)?;
            certificate_authorities.push(DistinguishedName(name_data));
            auths_data = rest;
        }

        Ok((
            input,
            CertificateRequest {
                certificate_types,
                supported_signature_algorithms,
                certificate_authorities,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.certificate_types.len() as u8);
        for cert_type in &self.certificate_types {
            output.push(cert_type.as_u8());
        }

        let sig_algs_len = (self.supported_signature_algorithms.len() * 2) as u16;
        output.extend_from_slice(&sig_algs_len.to_be_bytes());
        for sig_alg in &self.supported_signature_algorithms {
            output.extend_from_slice(&sig_alg.to_u16().to_be_bytes());
        }

        let cert_auths_len: usize = self
            .certificate_authorities
            .iter()
            .map(|name| 2 + name.len())
            .sum();
        output.extend_from_slice(&(cert_auths_len as u16).to_be_bytes());
        for name in &self.certificate_authorities {
            output.extend_from_slice(&(name.len() as u16).to_be_bytes());
            output.extend_from_slice(name);
        }
    }
}
