use nom::number::complete::{be_u16, be_u8};
use nom::{bytes::complete::take, IResult};
use tinyvec::ArrayVec;

use super::{CertificateType, ECPointFormat, NamedCurve};

#[derive(Debug, PartialEq, Eq)]
pub struct Extension<'a> {
    pub extension_type: ExtensionType,
    pub extension_data: &'a [u8],
}

impl<'a> Extension<'a> {
    pub fn new(extension_type: ExtensionType, extension_data: &'a [u8]) -> Self {
        Extension {
            extension_type,
            extension_data,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Extension<'a>> {
        let (input, extension_type) = ExtensionType::parse(input)?;
        let (input, extension_length) = be_u16(input)?;
        let (input, extension_data) = take(extension_length)(input)?;

        Ok((
            input,
            Extension {
                extension_type,
                extension_data,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.extension_type.as_u16().to_be_bytes());
        output.extend_from_slice(&(self.extension_data.len() as u16).to_be_bytes());
        output.extend_from_slice(self.extension_data);
    }

    /// Interpret this extension as `supported_elliptic_curves`:
    /// a 16-bit list length followed by 16-bit curve ids.
    pub fn as_supported_elliptic_curves(&self) -> Option<ArrayVec<[NamedCurve; 16]>> {
        if self.extension_type != ExtensionType::SupportedEllipticCurves {
            return None;
        }
        let (rest, list_len) = be_u16::<_, nom::error::Error<&[u8]>>(self.extension_data).ok()?;
        let (_, data) = take::<_, _, nom::error::Error<&[u8]>>(list_len)(rest).ok()?;

        let mut curves = ArrayVec::new();
        for chunk in data.chunks_exact(2) {
            if curves.len() == curves.capacity() {
                break;
            }
            curves.push(NamedCurve::from_u16(u16::from_be_bytes([
                chunk[0], chunk[1],
            ])));
        }
        Some(curves)
    }

    /// Interpret this extension as a certificate type list
    /// (client form: 8-bit list length followed by 8-bit types).
    pub fn as_certificate_types(&self) -> Option<ArrayVec<[CertificateType; 8]>> {
        if self.extension_type != ExtensionType::ClientCertificateType
            && self.extension_type != ExtensionType::ServerCertificateType
        {
            return None;
        }
        let (rest, list_len) = be_u8::<_, nom::error::Error<&[u8]>>(self.extension_data).ok()?;
        let (_, data) = take::<_, _, nom::error::Error<&[u8]>>(list_len)(rest).ok()?;

        let mut types = ArrayVec::new();
        for b in data {
            if types.len() == types.capacity() {
                break;
            }
            types.push(CertificateType::from_u8(*b));
        }
        Some(types)
    }

    /// Interpret this extension as `ec_point_formats`
    /// (8-bit list length followed by 8-bit formats).
    pub fn as_ec_point_formats(&self) -> Option<ArrayVec<[ECPointFormat; 4]>> {
        if self.extension_type != ExtensionType::EcPointFormats {
            return None;
        }
        let (rest, list_len) = be_u8::<_, nom::error::Error<&[u8]>>(self.extension_data).ok()?;
        let (_, data) = take::<_, _, nom::error::Error<&[u8]>>(list_len)(rest).ok()?;

        let mut formats = ArrayVec::new();
        for b in data {
            if formats.len() == formats.capacity() {
                break;
            }
            formats.push(ECPointFormat::from_u8(*b));
        }
        Some(formats)
    }
}

impl Default for Extension<'_> {
    fn default() -> Self {
        Extension::new(ExtensionType::Unknown(0), &[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionType {
    SupportedEllipticCurves,
    EcPointFormats,
    SignatureAlgorithms,
    ClientCertificateType,
    ServerCertificateType,
    Unknown(u16),
}

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x000A => ExtensionType::SupportedEllipticCurves,
            0x000B => ExtensionType::EcPointFormats,
            0x000D => ExtensionType::SignatureAlgorithms,
            0x0013 => ExtensionType::ClientCertificateType,
            0x0014 => ExtensionType::ServerCertificateType,
            _ => ExtensionType::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ExtensionType::SupportedEllipticCurves => 0x000A,
            ExtensionType::EcPointFormats => 0x000B,
            ExtensionType::SignatureAlgorithms => 0x000D,
            ExtensionType::ClientCertificateType => 0x0013,
            ExtensionType::ServerCertificateType => 0x0014,
            ExtensionType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ExtensionType> {
        let (input, value) = be_u16(input)?;
        Ok((input, ExtensionType::from_u16(value)))
    }
}

impl Default for ExtensionType {
    fn default() -> Self {
        ExtensionType::Unknown(0)
    }
}
