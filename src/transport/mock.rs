//! Scripted transport for frame-level tests
use std::collections::VecDeque;

use async_trait::async_trait;

use super::Transport;
use crate::error::AcquisitionError;
use crate::modbus::frame::FN_READ_HOLDING_REGISTERS;

/// Answers each read command with the next scripted response
///
/// Responses become readable only once a read command has been written,
/// so a discard before the write does not lose them. An empty input buffer
/// reads as a timeout.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: VecDeque<Vec<u8>>,
    pending: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    chunk_size: Option<usize>,
    fail_writes: bool,
    fail_after_writes: Option<usize>,
    end_of_file: bool,
    discards: usize,
    reads: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver at most `size` bytes per read
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    pub fn push_response(&mut self, response: Vec<u8>) {
        self.responses.push_back(response);
    }

    /// Leave bytes in the input buffer as if from an earlier exchange
    pub fn inject_stale(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes);
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Accept `count` writes, then fail every later one
    pub fn fail_writes_after(&mut self, count: usize) {
        self.fail_after_writes = Some(count);
    }

    /// Report end of file on every read
    pub fn end_of_file(&mut self, eof: bool) {
        self.end_of_file = eof;
    }

    pub fn written(&self) -> &[Vec<u8>] {
        &self.written
    }

    pub fn discards(&self) -> usize {
        self.discards
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), AcquisitionError> {
        let exhausted = self
            .fail_after_writes
            .is_some_and(|count| self.written.len() >= count);
        if self.fail_writes || exhausted {
            return Err(AcquisitionError::TransportIo(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "link down",
            )));
        }
        self.written.push(bytes.to_vec());
        if bytes.get(1) == Some(&FN_READ_HOLDING_REGISTERS) {
            if let Some(response) = self.responses.pop_front() {
                self.pending.extend(response);
            }
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, AcquisitionError> {
        self.reads += 1;
        if self.end_of_file {
            return Ok(0);
        }
        if self.pending.is_empty() {
            return Err(AcquisitionError::Timeout(1000));
        }
        let limit = self.chunk_size.unwrap_or(usize::MAX).min(buf.len());
        let mut count = 0;
        while count < limit {
            match self.pending.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    fn discard_input(&mut self) -> Result<(), AcquisitionError> {
        self.discards += 1;
        self.pending.clear();
        Ok(())
    }
}
