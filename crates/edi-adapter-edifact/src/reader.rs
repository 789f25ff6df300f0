//! Buffered segment reader
//!
//! Pulls characters from the input one at a time and collects them into a
//! segment buffer up to the next unescaped segment terminator of the
//! active delimiter set. Only the current segment is ever held in memory.

use crate::syntax::Encoding;
use crate::tokenizer::split_on;
use crate::{Error, Result};
use edi_schema::{DelimiterStack, Delimiters};
use std::io::{BufRead, ErrorKind};
use tracing::trace;

pub struct BufferedSegmentReader<'a> {
    input: Box<dyn BufRead + 'a>,
    encoding: Encoding,
    delimiters: DelimiterStack,
    ignore_newlines: bool,
    segment_buffer: String,
    fields: Option<Vec<String>>,
    segment_number: usize,
    offset: u64,
}

impl<'a> BufferedSegmentReader<'a> {
    pub fn new(input: impl BufRead + 'a, delimiters: Delimiters) -> Self {
        Self {
            input: Box::new(input),
            encoding: Encoding::default(),
            delimiters: DelimiterStack::new(delimiters),
            ignore_newlines: false,
            segment_buffer: String::new(),
            fields: None,
            segment_number: 0,
            offset: 0,
        }
    }

    /// Drop CR and LF between and inside segments
    #[must_use]
    pub fn ignore_newlines(mut self, ignore: bool) -> Self {
        self.ignore_newlines = ignore;
        self
    }

    /// Switch character decoding for everything not yet read
    pub fn set_encoding(&mut self, encoding: Encoding) {
        if encoding != self.encoding {
            trace!(?encoding, offset = self.offset, "Switching input encoding");
            self.encoding = encoding;
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The active delimiter set
    pub fn delimiters(&self) -> &Delimiters {
        self.delimiters.current()
    }

    pub fn push_delimiters(&mut self, delimiters: Delimiters) {
        self.delimiters.push(delimiters);
        self.fields = None;
    }

    pub fn pop_delimiters(&mut self) -> Result<Delimiters> {
        self.fields = None;
        Ok(self.delimiters.pop()?)
    }

    /// Number of delimiter sets pushed above the configured one
    pub fn delimiter_depth(&self) -> usize {
        self.delimiters.depth()
    }

    /// Number of segments read so far
    pub fn segment_number(&self) -> usize {
        self.segment_number
    }

    /// Bytes consumed from the input
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Ensure at least `count` characters are buffered and return the buffer.
    ///
    /// With `skip_whitespace`, whitespace in front of an empty buffer is
    /// discarded. The buffer is shorter than `count` only at end of input.
    pub fn peek(&mut self, count: usize, skip_whitespace: bool) -> Result<&str> {
        while self.segment_buffer.chars().count() < count {
            let Some(c) = self.next_char()? else {
                break;
            };
            if skip_whitespace && self.segment_buffer.is_empty() && c.is_whitespace() {
                continue;
            }
            if self.is_ignored_newline(c) {
                continue;
            }
            self.segment_buffer.push(c);
        }
        Ok(&self.segment_buffer)
    }

    /// Read `count` characters verbatim, bypassing segment handling
    pub fn read(&mut self, count: usize) -> Result<String> {
        self.peek(count, false)?;
        self.fields = None;
        Ok(std::mem::take(&mut self.segment_buffer))
    }

    /// Complete the buffered segment up to its terminator.
    ///
    /// Whatever [`peek`](Self::peek) already buffered is kept as the start
    /// of the segment. Returns `false` when the input ended before any
    /// segment text was found.
    pub fn move_to_next_segment(&mut self) -> Result<bool> {
        self.fields = None;
        let delimiters = *self.delimiters.current();
        let terminator = delimiters.segment();
        let escape = delimiters.escape();

        while let Some(c) = self.next_char()? {
            if self.segment_buffer.is_empty() && c.is_whitespace() {
                continue;
            }
            if c != terminator && (self.is_ignored_newline(c) || (delimiters.ignore_crlf() && is_crlf(c)))
            {
                continue;
            }

            if c == terminator {
                let run = escape.map_or(0, |e| trailing_run(&self.segment_buffer, e));
                if run % 2 == 0 {
                    self.segment_number += 1;
                    return Ok(true);
                }
                // Drop the first escape of the run; the terminator is data.
                let start = self.segment_buffer.len() - run * escape.map_or(0, char::len_utf8);
                self.segment_buffer.remove(start);
            }
            self.segment_buffer.push(c);
        }

        if self.segment_buffer.is_empty() {
            return Ok(false);
        }
        self.segment_number += 1;
        Ok(true)
    }

    /// Read the next whole segment, discarding anything buffered
    pub fn next_segment(&mut self) -> Result<Option<String>> {
        self.clear_buffer();
        if self.move_to_next_segment()? {
            Ok(Some(self.segment_buffer.clone()))
        } else {
            Ok(None)
        }
    }

    /// Text of the current segment, without its terminator
    pub fn current_segment(&self) -> &str {
        &self.segment_buffer
    }

    /// The current segment split into escaped field tokens
    pub fn current_segment_fields(&mut self) -> &[String] {
        if self.fields.is_none() {
            let delimiters = self.delimiters.current();
            let mut fields = split_on(&self.segment_buffer, delimiters.field(), delimiters.escape());
            if delimiters.segment() == '\n' {
                if let Some(last) = fields.last_mut() {
                    if last.ends_with('\r') {
                        last.pop();
                    }
                }
            }
            self.fields = Some(fields);
        }
        self.fields.as_deref().unwrap_or_default()
    }

    pub fn clear_buffer(&mut self) {
        self.segment_buffer.clear();
        self.fields = None;
    }

    fn is_ignored_newline(&self, c: char) -> bool {
        self.ignore_newlines && is_crlf(c) && c != self.delimiters.current().segment()
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        loop {
            let byte = match self.input.fill_buf() {
                Ok(buf) => buf.first().copied(),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            };
            if byte.is_some() {
                self.input.consume(1);
                self.offset += 1;
            }
            return Ok(byte);
        }
    }

    fn next_char(&mut self) -> Result<Option<char>> {
        let Some(first) = self.next_byte()? else {
            return Ok(None);
        };

        let c = match self.encoding {
            Encoding::Latin1 => char::from(first),
            Encoding::Ascii if first.is_ascii() => char::from(first),
            Encoding::Ascii => char::REPLACEMENT_CHARACTER,
            Encoding::Utf8 => self.decode_utf8(first)?,
        };
        Ok(Some(c))
    }

    fn decode_utf8(&mut self, first: u8) -> Result<char> {
        let width = match first {
            0x00..=0x7F => return Ok(char::from(first)),
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Ok(char::REPLACEMENT_CHARACTER),
        };

        let mut bytes = [first, 0, 0, 0];
        for slot in bytes.iter_mut().take(width).skip(1) {
            match self.next_byte()? {
                Some(b) => *slot = b,
                None => return Ok(char::REPLACEMENT_CHARACTER),
            }
        }
        Ok(std::str::from_utf8(&bytes[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER))
    }
}

fn is_crlf(c: char) -> bool {
    c == '\r' || c == '\n'
}

/// Number of consecutive `escape` characters at the end of `text`
fn trailing_run(text: &str, escape: char) -> usize {
    text.chars().rev().take_while(|c| *c == escape).count()
}
