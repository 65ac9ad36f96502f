//! Character encoding support for file contents.
//!
//! Encoding names are resolved through the WHATWG label table (`encoding_rs`), so
//! `latin1`, `utf-16le`, `shift_jis` and friends all work. `utf8` is the built-in default
//! and is never looked up.

use crate::error::{Error, Result};
use encoding_rs::{CoderResult, Decoder, Encoding, UTF_16BE, UTF_16LE, UTF_8};
use std::fmt;

/// Name of the default encoding.
pub const DEFAULT_ENCODING: &str = "utf8";

/// A named character encoding able to decode and encode file contents.
#[derive(Clone, PartialEq, Eq)]
pub struct Codec {
    name: String,
    encoding: &'static Encoding,
}

impl Codec {
    /// The default UTF-8 codec.
    pub fn utf8() -> Self {
        Self {
            name: DEFAULT_ENCODING.to_string(),
            encoding: UTF_8,
        }
    }

    /// Resolve a codec by name, failing for anything the label table does not know.
    pub fn for_name(name: &str) -> Result<Self> {
        if name == DEFAULT_ENCODING {
            return Ok(Self::utf8());
        }

        // Labels that resolve to the "replacement" encoding cannot round-trip text.
        let encoding = Encoding::for_label_no_replacement(name.trim().as_bytes())
            .ok_or_else(|| Error::EncodingUnsupported(name.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            encoding,
        })
    }

    /// The name this codec was requested under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical WHATWG name of the encoding.
    pub fn canonical_name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Decode a complete buffer. Malformed sequences become U+FFFD.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, _had_errors) = self.encoding.decode_with_bom_removal(bytes);
        text.into_owned()
    }

    /// Encode text.
    ///
    /// Characters the target encoding cannot represent are written as HTML numeric
    /// character references.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        self.encode_reporting(text).0
    }

    /// Encode text, also reporting whether any character had to be replaced by a
    /// numeric character reference.
    pub fn encode_reporting(&self, text: &str) -> (Vec<u8>, bool) {
        // encoding_rs only decodes UTF-16; its encoders emit UTF-8 for these labels.
        if self.encoding == UTF_16LE {
            return (text.encode_utf16().flat_map(u16::to_le_bytes).collect(), false);
        }
        if self.encoding == UTF_16BE {
            return (text.encode_utf16().flat_map(u16::to_be_bytes).collect(), false);
        }

        let (bytes, _, unmappable) = self.encoding.encode(text);
        (bytes.into_owned(), unmappable)
    }

    /// Start an incremental decode.
    pub fn stream_decoder(&self) -> StreamDecoder {
        StreamDecoder {
            decoder: self.encoding.new_decoder_with_bom_removal(),
            output: String::new(),
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::utf8()
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("name", &self.name)
            .field("encoding", &self.encoding.name())
            .finish()
    }
}

/// Incremental decoder fed one chunk at a time.
///
/// Multi-byte sequences split across chunk boundaries are carried over to the next
/// chunk, so the result equals decoding the concatenated input in one go.
pub struct StreamDecoder {
    decoder: Decoder,
    output: String,
}

impl StreamDecoder {
    /// Decode the next chunk.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.push(chunk, false);
    }

    /// Flush any pending partial sequence and return the decoded text.
    pub fn finish(mut self) -> String {
        self.push(&[], true);
        self.output
    }

    fn push(&mut self, mut input: &[u8], last: bool) {
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(input.len())
                .unwrap_or(input.len().saturating_mul(3).saturating_add(16));
            self.output.reserve(needed);

            let (result, read, _had_errors) =
                self.decoder.decode_to_string(input, &mut self.output, last);
            input = &input[read..];

            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }
}
