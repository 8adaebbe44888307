use nom::error::{Error, ErrorKind};
use nom::Err;
use nom::{bytes::complete::take, number::complete::be_u8, IResult};

use super::{CurveType, DigitallySigned, NamedCurve};

/// The ECDHE parameter block of `ServerKeyExchange` (RFC 8422 §5.4):
/// curve descriptor, the server's ephemeral point, and the signature over
/// `client_random || server_random || params`.
#[derive(Debug, PartialEq, Eq)]
pub struct EcdhParams<'a> {
    pub curve_type: CurveType,
    pub named_curve: NamedCurve,
    pub public_key: &'a [u8],
    pub signed: Option<DigitallySigned<'a>>,
}

impl<'a> EcdhParams<'a> {
    pub fn new(
        curve_type: CurveType,
        named_curve: NamedCurve,
        public_key: &'a [u8],
        signed: Option<DigitallySigned<'a>>,
    ) -> Self {
        EcdhParams {
            curve_type,
            named_curve,
            public_key,
            signed,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], EcdhParams<'a>> {
        let (input, curve_type) = CurveType::parse(input)?;
        if curve_type != CurveType::NamedCurve {
            return Err(Err::Failure(Error::new(input, ErrorKind::Alt)));
        }
        let (input, named_curve) = NamedCurve::parse(input)?;
        let (input, point_len) = be_u8(input)?;
        let (input, public_key) = take(point_len)(input)?;

        let (input, signed) = if input.is_empty() {
            (input, None)
        } else {
            let (input, signed) = DigitallySigned::parse(input)?;
            (input, Some(signed))
        };

        Ok((
            input,
            EcdhParams {
                curve_type,
                named_curve,
                public_key,
                signed,
            },
        ))
    }

    /// Serialize the params. With `with_signature` false only the curve
    /// descriptor and point are written, which is the byte sequence the
    /// signature covers.
    pub fn serialize(&self, output: &mut Vec<u8>, with_signature: bool) {
        output.push(self.curve_type.as_u8());
        output.extend_from_slice(&self.named_curve.as_u16().to_be_bytes());
        output.push(self.public_key.len() as u8);
        output.extend_from_slice(self.public_key);

        if with_signature {
            if let Some(signed) = &self.signed {
                signed.serialize(output);
            }
        }
    }
}

/// `ServerKeyExchange`, emitted only for the ECDHE key exchange. PSK
/// handshakes carry no identity hint and therefore no such message.
#[derive(Debug, PartialEq, Eq)]
pub struct ServerKeyExchange<'a> {
    pub params: EcdhParams<'a>,
}

impl<'a> ServerKeyExchange<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerKeyExchange<'a>> {
        let (input, params) = EcdhParams::parse(input)?;
        Ok((input, ServerKeyExchange { params }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.params.serialize(output, true);
    }
}
