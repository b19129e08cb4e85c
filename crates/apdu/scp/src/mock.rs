//! Scripted transport for unit tests

use std::collections::VecDeque;

use bytes::Bytes;
use scpkit_apdu_core::{CardTransport, TransportError};

#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    /// Responses returned in order
    pub(crate) responses: VecDeque<Bytes>,
    /// Commands that were sent
    pub(crate) commands: Vec<Bytes>,
}

impl MockTransport {
    pub(crate) fn new(responses: impl IntoIterator<Item = Bytes>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            commands: Vec::new(),
        }
    }
}

impl CardTransport for MockTransport {
    type Error = TransportError;

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Self::Error> {
        self.commands.push(Bytes::copy_from_slice(command));
        self.responses.pop_front().ok_or(TransportError::Transmission)
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.commands.clear();
        Ok(())
    }
}
