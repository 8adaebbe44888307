use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};

/// The `ChangeCipherSpec` record body: a single byte with value 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeCipherSpec;

impl ChangeCipherSpec {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ChangeCipherSpec> {
        let (input, value) = be_u8(input)?;
        if value != 1 {
            return Err(Err::Failure(Error::new(input, ErrorKind::Verify)));
        }
        Ok((input, ChangeCipherSpec))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(1);
    }
}
