use nom::number::complete::{be_u16, be_u24};
use nom::IResult;

use super::MessageType;

/// The 12-byte DTLS handshake header that precedes every handshake
/// message fragment (RFC 6347 §4.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub msg_type: MessageType,
    pub length: u32,
    pub message_seq: u16,
    pub fragment_offset: u32,
    pub fragment_length: u32,
}

impl Header {
    pub const LENGTH: usize = 12;

    /// Header for an unfragmented message of `length` body bytes.
    pub fn unfragmented(msg_type: MessageType, message_seq: u16, length: usize) -> Self {
        Header {
            msg_type,
            length: length as u32,
            message_seq,
            fragment_offset: 0,
            fragment_length: length as u32,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Header> {
        let (input, msg_type) = MessageType::parse(input)?;
        let (input, length) = be_u24(input)?;
        let (input, message_seq) = be_u16(input)?;
        let (input, fragment_offset) = be_u24(input)?;
        let (input, fragment_length) = be_u24(input)?;

        Ok((
            input,
            Header {
                msg_type,
                length,
                message_seq,
                fragment_offset,
                fragment_length,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.msg_type.as_u8());
        output.extend_from_slice(&self.length.to_be_bytes()[1..]);
        output.extend_from_slice(&self.message_seq.to_be_bytes());
        output.extend_from_slice(&self.fragment_offset.to_be_bytes()[1..]);
        output.extend_from_slice(&self.fragment_length.to_be_bytes()[1..]);
    }
}

/// Serialize a complete (unfragmented) handshake message: header plus body.
pub(crate) fn serialize_message(
    msg_type: MessageType,
    message_seq: u16,
    body: &[u8],
    output: &mut Vec<u8>,
) {
    let header = Header::unfragmented(msg_type, message_seq, body.len());
    header.serialize(output);
    output.extend_from_slice(body);
}
