//! Strict transcoding of non-UTF-8 sources.
//!
//! [`StrictDecodeReader`] turns bytes in any `encoding_rs` encoding into
//! UTF-8 for the CSV reader. A malformed byte sequence is an
//! [`io::ErrorKind::InvalidData`] error, never a U+FFFD substitution, so a
//! corrupt file aborts the load instead of persisting garbled text.
use std::io::{self, Read};

use encoding_rs::{Decoder, DecoderResult, Encoding};

const INPUT_CAPACITY: usize = 8 * 1024;
// Room for the worst-case expansion of a full input buffer.
const OUTPUT_CAPACITY: usize = 3 * INPUT_CAPACITY + 16;

pub(crate) struct StrictDecodeReader<R> {
    inner: R,
    encoding: &'static Encoding,
    decoder: Decoder,
    input: Box<[u8]>,
    input_start: usize,
    input_end: usize,
    output: Box<[u8]>,
    output_start: usize,
    output_end: usize,
    // Bytes handed to the decoder so far, for error messages.
    consumed: u64,
    eof: bool,
    finished: bool,
    pending: Option<io::Error>,
}

impl<R: Read> StrictDecodeReader<R> {
    /// Decode `inner` as `encoding`. A byte order mark, if present, takes
    /// precedence over `encoding` and is stripped.
    pub(crate) fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            decoder: encoding.new_decoder(),
            input: vec![0; INPUT_CAPACITY].into_boxed_slice(),
            input_start: 0,
            input_end: 0,
            output: vec![0; OUTPUT_CAPACITY].into_boxed_slice(),
            output_start: 0,
            output_end: 0,
            consumed: 0,
            eof: false,
            finished: false,
            pending: None,
        }
    }

    fn decode_more(&mut self) -> io::Result<()> {
        if self.input_start == self.input_end && !self.eof {
            let n = self.inner.read(&mut self.input)?;
            self.input_start = 0;
            self.input_end = n;
            self.eof = n == 0;
        }

        let last = self.eof;
        let (result, read, written) = self.decoder.decode_to_utf8_without_replacement(
            &self.input[self.input_start..self.input_end],
            &mut self.output,
            last,
        );
        self.input_start += read;
        self.consumed += read as u64;
        self.output_start = 0;
        self.output_end = written;

        match result {
            DecoderResult::InputEmpty => self.finished = last,
            DecoderResult::OutputFull => {}
            DecoderResult::Malformed(bad, after) => {
                let offset = self
                    .consumed
                    .saturating_sub(u64::from(bad) + u64::from(after));
                self.pending = Some(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "malformed {} sequence at byte {offset}",
                        self.encoding.name()
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for StrictDecodeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.output_start < self.output_end {
                let n = buf.len().min(self.output_end - self.output_start);
                buf[..n].copy_from_slice(&self.output[self.output_start..self.output_start + n]);
                self.output_start += n;
                return Ok(n);
            }
            // Text decoded before a malformed sequence is delivered first.
            if let Some(err) = self.pending.take() {
                self.finished = true;
                return Err(err);
            }
            if self.finished || buf.is_empty() {
                return Ok(0);
            }
            self.decode_more()?;
        }
    }
}
