use nom::IResult;

use super::DigitallySigned;

/// `CertificateVerify`: the client's signature over the concatenated
/// handshake messages up to and including `ClientKeyExchange`.
#[derive(Debug, PartialEq, Eq)]
pub struct CertificateVerify<'a> {
    pub signed: DigitallySigned<'a>,
}

impl<'a> CertificateVerify<'a> {
    pub fn new(signed: DigitallySigned<'a>) -> Self {
        CertificateVerify { signed }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], CertificateVerify<'a>> {
        let (input, signed) = DigitallySigned::parse(input)?;
        Ok((input, CertificateVerify { signed }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.signed.serialize(output);
    }
}
