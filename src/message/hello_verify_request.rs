use nom::error::{Error, ErrorKind};
use nom::Err;
use nom::{bytes::complete::take, number::complete::be_u8, IResult};

use super::{Cookie, ProtocolVersion};

#[derive(Debug, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub server_version: ProtocolVersion,
    pub cookie: Cookie,
}

impl HelloVerifyRequest {
    pub fn new(server_version: ProtocolVersion, cookie: Cookie) -> Self {
        HelloVerifyRequest {
            server_version,
            cookie,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HelloVerifyRequest> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, cookie_len) = be_u8(input)?;
        let (input, cookie_data) = take(cookie_len)(input)?;
        let cookie = Cookie::try_new(cookie_data)
            .map_err(|_| Err::Failure(Error::new(cookie_data, ErrorKind::LengthValue)))?;

        Ok((
            input,
            HelloVerifyRequest {
                server_version,
                cookie,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.server_version.as_u16().to_be_bytes());
        output.push(self.cookie.len() as u8);
        output.extend_from_slice(&self.cookie);
    }
}
