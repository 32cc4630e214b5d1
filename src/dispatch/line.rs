use std::io::{self, BufRead, BufReader, ErrorKind, Read};

/// What one read attempt on the controller channel produced.
#[derive(Debug, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete line, without its terminator.
    Line(Vec<u8>),
    /// Nothing complete arrived before the read timeout.
    Idle,
    /// The channel is gone.
    Closed,
}

/// Newline framing over a timeout-bounded reader.
///
/// Bytes received before a timeout are kept and completed by later reads,
/// so a slow sender never produces split lines.
pub struct LineReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            pending: Vec::new(),
        }
    }

    /// Read until a newline, a timeout, or the end of the stream.
    ///
    /// A final unterminated line before EOF is still returned as a line.
    /// Errors other than timeouts/interrupts are passed through.
    pub fn next_line(&mut self) -> io::Result<LineEvent> {
        match self.inner.read_until(b'\n', &mut self.pending) {
            Ok(0) if self.pending.is_empty() => Ok(LineEvent::Closed),
            Ok(_) => {
                if self.pending.last() == Some(&b'\n') {
                    self.pending.pop();
                }
                Ok(LineEvent::Line(std::mem::take(&mut self.pending)))
            }
            Err(e) if is_transient(&e) => Ok(LineEvent::Idle),
            Err(e) => Err(e),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}
