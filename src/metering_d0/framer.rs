/// Start of a datagram
pub const DATAGRAM_INITIATOR: u8 = b'/';
/// End of a datagram, part of the frame
pub const DATAGRAM_TERMINATOR: u8 = b'!';

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FramerState {
    Idle,
    Collecting,
}

/// Cuts complete `/ ... !` datagrams out of a byte stream.
///
/// Bytes outside of a datagram are dropped. A `/` seen while collecting starts
/// the datagram over, the bytes collected so far are thrown away.
#[derive(Debug)]
pub struct DatagramFramer {
    state: FramerState,
    buffer: String,
}

impl DatagramFramer {
    pub fn new() -> Self {
        DatagramFramer {
            state: FramerState::Idle,
            buffer: String::new(),
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    pub fn reset(&mut self) {
        self.state = FramerState::Idle;
        self.buffer.clear();
    }

    /// Feed one byte, returns the datagram once the terminator arrived
    pub fn push(&mut self, byte: u8) -> Option<String> {
        if byte == DATAGRAM_INITIATOR {
            self.buffer.clear();
            self.buffer.push(to_char(byte));
            self.state = FramerState::Collecting;
            return None;
        }

        if self.state == FramerState::Idle {
            return None;
        }

        self.buffer.push(to_char(byte));

        if byte == DATAGRAM_TERMINATOR {
            self.state = FramerState::Idle;
            return Some(std::mem::take(&mut self.buffer));
        }

        None
    }

    /// Run a whole chunk through the framer and collect every datagram completed by it
    pub fn push_all(&mut self, bytes: &[u8]) -> Vec<String> {
        bytes.iter().filter_map(|b| self.push(*b)).collect()
    }
}

fn to_char(byte: u8) -> char {
    // The line runs with 7 data bits, anything else is line noise
    if byte.is_ascii() {
        byte as char
    } else {
        char::REPLACEMENT_CHARACTER
    }
}
