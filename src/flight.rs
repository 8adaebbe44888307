use crate::message::{
    serialize_message, AlertMessage, ChangeCipherSpec, ContentType, Header, MessageType,
};
use crate::transcript::Transcript;

/// One outbound record of a flight: the plaintext fragment plus the
/// content type and epoch the record layer must send it under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightRecord {
    pub content_type: ContentType,
    pub epoch: u16,
    pub fragment: Vec<u8>,
}

/// An ordered group of records sent (and retransmitted) as a unit.
///
/// The terminal flight of a handshake clears `retransmission_needed`: it
/// is not rescheduled on a timer, but is retained by the state machine
/// and re-emitted verbatim if the client repeats its `Finished`.
#[derive(Debug, Clone)]
pub struct Flight {
    records: Vec<FlightRecord>,
    retransmission_needed: bool,
}

impl Flight {
    pub(crate) fn new() -> Self {
        Flight {
            records: Vec::new(),
            retransmission_needed: true,
        }
    }

    /// Append a handshake message, serialized unfragmented under the
    /// given `message_seq`. When a transcript is passed the full wire
    /// bytes (header plus body) are folded into it.
    pub(crate) fn add_handshake(
        &mut self,
        epoch: u16,
        msg_type: MessageType,
        message_seq: u16,
        body: &[u8],
        transcript: Option<&mut Transcript>,
    ) {
        let mut fragment = Vec::with_capacity(Header::LENGTH + body.len());
        serialize_message(msg_type, message_seq, body, &mut fragment);

        if let Some(transcript) = transcript {
            transcript.update(&fragment);
        }

        self.records.push(FlightRecord {
            content_type: ContentType::Handshake,
            epoch,
            fragment,
        });
    }

    pub(crate) fn add_change_cipher_spec(&mut self, epoch: u16) {
        let mut fragment = Vec::with_capacity(1);
        ChangeCipherSpec.serialize(&mut fragment);

        self.records.push(FlightRecord {
            content_type: ContentType::ChangeCipherSpec,
            epoch,
            fragment,
        });
    }

    pub(crate) fn add_alert(&mut self, epoch: u16, alert: AlertMessage) {
        let mut fragment = Vec::with_capacity(2);
        alert.serialize(&mut fragment);

        self.records.push(FlightRecord {
            content_type: ContentType::Alert,
            epoch,
            fragment,
        });
    }

    pub(crate) fn set_retransmission_needed(&mut self, needed: bool) {
        self.retransmission_needed = needed;
    }

    /// The records of this flight, in transmission order.
    pub fn records(&self) -> &[FlightRecord] {
        &self.records
    }

    /// Whether the caller should schedule this flight for timer-driven
    /// retransmission.
    pub fn retransmission_needed(&self) -> bool {
        self.retransmission_needed
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
