use nom::error::{Error, ErrorKind};
use nom::Err;
use nom::{
    bytes::complete::take,
    number::complete::{be_u16, be_u8},
    IResult,
};

use super::KeyExchangeAlgorithm;

/// The key-exchange-specific payload of `ClientKeyExchange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKeys<'a> {
    /// PSK identity (RFC 4279 §2): a 16-bit length-prefixed UTF-8 string.
    PskIdentity(&'a [u8]),
    /// The client's ephemeral EC point, uncompressed, behind an 8-bit
    /// length (RFC 8422 §5.7).
    EcdhPublic(&'a [u8]),
    /// The NULL key exchange carries nothing.
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientKeyExchange<'a> {
    pub exchange_keys: ExchangeKeys<'a>,
}

impl<'a> ClientKeyExchange<'a> {
    pub fn new(exchange_keys: ExchangeKeys<'a>) -> Self {
        ClientKeyExchange { exchange_keys }
    }

    /// The body format depends on the negotiated key exchange, so the
    /// caller passes the algorithm derived from the chosen cipher suite.
    pub fn parse(
        input: &'a [u8],
        key_exchange_algorithm: KeyExchangeAlgorithm,
    ) -> IResult<&'a [u8], ClientKeyExchange<'a>> {
        let (input, exchange_keys) = match key_exchange_algorithm {
            KeyExchangeAlgorithm::Psk => {
                let (input, identity_len) = be_u16(input)?;
                let (input, identity) = take(identity_len)(input)?;
                (input, ExchangeKeys::PskIdentity(identity))
            }
            KeyExchangeAlgorithm::EcDiffieHellman => {
                let (input, point_len) = be_u8(input)?;
                let (input, point) = take(point_len)(input)?;
                (input, ExchangeKeys::EcdhPublic(point))
            }
            KeyExchangeAlgorithm::Null => (input, ExchangeKeys::Null),
            KeyExchangeAlgorithm::Unknown => {
                return Err(Err::Failure(Error::new(input, ErrorKind::Alt)));
            }
        };

        Ok((input, ClientKeyExchange { exchange_keys }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match &self.exchange_keys {
            ExchangeKeys::PskIdentity(identity) => {
                output.extend_from_slice(&(identity.len() as u16).to_be_bytes());
                output.extend_from_slice(identity);
            }
            ExchangeKeys::EcdhPublic(point) => {
                output.push(point.len() as u8);
                output.extend_from_slice(point);
            }
            ExchangeKeys::Null => {}
        }
    }
}
