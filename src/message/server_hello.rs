use nom::error::{Error, ErrorKind};
use nom::Err;
use nom::{bytes::complete::take, number::complete::be_u16, IResult};
use tinyvec::ArrayVec;

use crate::util::many0;

use super::{CertificateType, CipherSuite, CompressionMethod, ECPointFormat, ProtocolVersion};
use super::{Extension, ExtensionType, Random, SessionId};

#[derive(Debug, PartialEq, Eq)]
pub struct ServerHello<'a> {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    pub extensions: ArrayVec<[Extension<'a>; 8]>,
}

impl<'a> ServerHello<'a> {
    pub fn new(
        server_version: ProtocolVersion,
        random: Random,
        session_id: SessionId,
        cipher_suite: CipherSuite,
        compression_method: CompressionMethod,
    ) -> Self {
        ServerHello {
            server_version,
            random,
            session_id,
            cipher_suite,
            compression_method,
            extensions: ArrayVec::new(),
        }
    }

    /// Stage the negotiated extensions into `buf` and reference them.
    ///
    /// The certificate type responses are the single chosen type (the
    /// server form of RFC 7250), and `ec_point_formats` advertises the
    /// uncompressed format when an EC suite was selected.
    pub fn with_extensions(
        mut self,
        buf: &'a mut Vec<u8>,
        client_certificate_type: Option<CertificateType>,
        server_certificate_type: Option<CertificateType>,
        ec_suite: bool,
    ) -> Self {
        buf.clear();

        let mut ranges: ArrayVec<[(ExtensionType, usize, usize); 4]> = ArrayVec::new();

        if let Some(cert_type) = client_certificate_type {
            let start = buf.len();
            buf.push(cert_type.as_u8());
            ranges.push((ExtensionType::ClientCertificateType, start, buf.len()));
        }

        if let Some(cert_type) = server_certificate_type {
            let start = buf.len();
            buf.push(cert_type.as_u8());
            ranges.push((ExtensionType::ServerCertificateType, start, buf.len()));
        }

        if ec_suite {
            let start = buf.len();
            buf.push(1); // format list length
            buf.push(ECPointFormat::Uncompressed.as_u8());
            ranges.push((ExtensionType::EcPointFormats, start, buf.len()));
        }

        for (t, s, e) in ranges {
            self.extensions.push(Extension::new(t, &buf[s..e]));
        }

        self
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerHello<'a>> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id_len) = nom::number::complete::be_u8(input)?;
        let (input, session_id_data) = take(session_id_len)(input)?;
        let session_id = SessionId::try_new(session_id_data)
            .map_err(|_| Err::Failure(Error::new(session_id_data, ErrorKind::LengthValue)))?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;

        let (input, extensions) = if input.is_empty() {
            (input, ArrayVec::new())
        } else {
            let (input, extensions_len) = be_u16(input)?;
            let (input, extensions_data) = take(extensions_len)(input)?;
            let (rest, extensions) = many0(Extension::parse)(extensions_data)?;
            if !rest.is_empty() {
                return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
            }
            (input, extensions)
        };

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.server_version.as_u16().to_be_bytes());
        self.random.serialize(output);
        output.push(self.session_id.len() as u8);
        output.extend_from_slice(&self.session_id);
        output.extend_from_slice(&self.cipher_suite.as_u16().to_be_bytes());
        output.push(self.compression_method.as_u8());

        if !self.extensions.is_empty() {
            let mut extensions_len = 0;
            for ext in &self.extensions {
                extensions_len += 4 + ext.extension_data.len();
            }

            output.extend_from_slice(&(extensions_len as u16).to_be_bytes());
            for ext in &self.extensions {
                ext.serialize(output);
            }
        }
    }
}
