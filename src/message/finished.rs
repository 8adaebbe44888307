use nom::bytes::complete::take;
use nom::IResult;

/// `Finished`: 12 bytes of PRF output over the transcript hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: [u8; 12],
}

impl Finished {
    pub fn new(verify_data: [u8; 12]) -> Self {
        Finished { verify_data }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Finished> {
        let (input, data) = take(12_usize)(input)?;
        let mut verify_data = [0u8; 12];
        verify_data.copy_from_slice(data);

        Ok((input, Finished { verify_data }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.verify_data);
    }
}
