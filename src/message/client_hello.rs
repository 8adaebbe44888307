use nom::error::{Error, ErrorKind};
use nom::Err;
use nom::{
    bytes::complete::take,
    number::complete::{be_u16, be_u8},
    IResult,
};
use tinyvec::ArrayVec;

use crate::util::{many0, many1};

use super::{CertificateType, CipherSuite, CompressionMethod, NamedCurve, ProtocolVersion};
use super::{Cookie, Extension, ExtensionType, Random, SessionId};

#[derive(Debug, PartialEq, Eq)]
pub struct ClientHello<'a> {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cookie: Cookie,
    pub cipher_suites: ArrayVec<[CipherSuite; 32]>,
    pub compression_methods: ArrayVec<[CompressionMethod; 4]>,
    pub extensions: ArrayVec<[Extension<'a>; 16]>,
}

impl<'a> ClientHello<'a> {
    pub fn new(
        client_version: ProtocolVersion,
        random: Random,
        session_id: SessionId,
        cookie: Cookie,
        cipher_suites: ArrayVec<[CipherSuite; 32]>,
        compression_methods: ArrayVec<[CompressionMethod; 4]>,
    ) -> Self {
        ClientHello {
            client_version,
            random,
            session_id,
            cookie,
            cipher_suites,
            compression_methods,
            extensions: ArrayVec::new(),
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientHello<'a>> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = parse_session_id(input)?;
        let (input, cookie) = parse_cookie(input)?;
        let (input, cipher_suites_len) = be_u16(input)?;
        let (input, input_cipher) = take(cipher_suites_len)(input)?;
        let (rest, cipher_suites) = many1(CipherSuite::parse)(input_cipher)?;
        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
        }
        let (input, compression_methods_len) = be_u8(input)?;
        let (input, input_compression) = take(compression_methods_len)(input)?;
        let (rest, compression_methods) = many1(CompressionMethod::parse)(input_compression)?;
        if !rest.is_empty() {
            return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
        }

        let (input, extensions) = parse_extensions(input)?;

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cookie,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.client_version.as_u16().to_be_bytes());
        self.random.serialize(output);
        output.push(self.session_id.len() as u8);
        output.extend_from_slice(&self.session_id);
        output.push(self.cookie.len() as u8);
        output.extend_from_slice(&self.cookie);
        output.extend_from_slice(&(self.cipher_suites.len() as u16 * 2).to_be_bytes());
        for suite in &self.cipher_suites {
            output.extend_from_slice(&suite.as_u16().to_be_bytes());
        }
        output.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            output.push(method.as_u8());
        }

        if !self.extensions.is_empty() {
            let mut extensions_len = 0;
            for ext in &self.extensions {
                // Extension type (2) + extension length (2) + data
                extensions_len += 4 + ext.extension_data.len();
            }

            output.extend_from_slice(&(extensions_len as u16).to_be_bytes());
            for ext in &self.extensions {
                ext.serialize(output);
            }
        }
    }

    /// The `supported_elliptic_curves` extension, when offered.
    pub fn supported_elliptic_curves(&self) -> Option<ArrayVec<[NamedCurve; 16]>> {
        self.find_extension(ExtensionType::SupportedEllipticCurves)?
            .as_supported_elliptic_curves()
    }

    /// The `client_certificate_type` extension, when offered.
    pub fn client_certificate_types(&self) -> Option<ArrayVec<[CertificateType; 8]>> {
        self.find_extension(ExtensionType::ClientCertificateType)?
            .as_certificate_types()
    }

    /// The `server_certificate_type` extension, when offered.
    pub fn server_certificate_types(&self) -> Option<ArrayVec<[CertificateType; 8]>> {
        self.find_extension(ExtensionType::ServerCertificateType)?
            .as_certificate_types()
    }

    fn find_extension(&self, extension_type: ExtensionType) -> Option<&Extension<'a>> {
        self.extensions
            .iter()
            .find(|e| e.extension_type == extension_type)
    }
}

fn parse_session_id(input: &[u8]) -> IResult<&[u8], SessionId> {
    let (input, len) = be_u8(input)?;
    let (input, data) = take(len)(input)?;
    let session_id = SessionId::try_new(data)
        .map_err(|_| Err::Failure(Error::new(data, ErrorKind::LengthValue)))?;
    Ok((input, session_id))
}

fn parse_cookie(input: &[u8]) -> IResult<&[u8], Cookie> {
    let (input, len) = be_u8(input)?;
    let (input, data) = take(len)(input)?;
    let cookie =
        Cookie::try_new(data).map_err(|_| Err::Failure(Error::new(data, ErrorKind::LengthValue)))?;
    Ok((input, cookie))
}

fn parse_extensions(input: &[u8]) -> IResult<&[u8], ArrayVec<[Extension<'_>; 16]>> {
    // The extensions block as a whole is optional.
    if input.is_empty() {
        return Ok((input, ArrayVec::new()));
    }

    let (input, extensions_len) = be_u16(input)?;
    let (input, extensions_data) = take(extensions_len)(input)?;
    let (rest, extensions) = many0(Extension::parse)(extensions_data)?;
    if !rest.is_empty() {
        return Err(Err::Failure(Error::new(rest, ErrorKind::LengthValue)));
    }

    Ok((input, extensions))
}
