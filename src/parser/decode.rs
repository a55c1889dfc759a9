//! Incremental UTF-8 decoding for chunked dump reading.
//!
//! Chunk boundaries land anywhere, including inside a multi-byte character.
//! The decoder carries the incomplete trailing sequence of each chunk into
//! the next one and substitutes U+FFFD for bytes that can never form a valid
//! character, so a corrupt dump degrades instead of aborting the deployment.

use std::str;

/// Streaming UTF-8 decoder with replacement semantics.
///
/// Feed arbitrary byte slices with [`decode`](Utf8Decoder::decode) and call
/// [`finish`](Utf8Decoder::finish) exactly once at end of input to flush a
/// dangling incomplete sequence.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    // Incomplete trailing sequence from the previous chunk, at most 3 bytes.
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `input`, appending text to `out`. Valid text is appended as-is,
    /// definitively invalid byte runs become one U+FFFD each, and a trailing
    /// sequence that could still complete is held for the next call.
    pub fn decode(&mut self, input: &[u8], out: &mut String) {
        if self.pending.is_empty() {
            self.decode_contiguous(input, out);
        } else {
            let mut carried = std::mem::take(&mut self.pending);
            carried.extend_from_slice(input);
            self.decode_contiguous(&carried, out);
        }
    }

    /// Flush the decoder at end of input. A pending incomplete sequence can
    /// no longer complete and becomes a single U+FFFD.
    pub fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            out.push(char::REPLACEMENT_CHARACTER);
            self.pending.clear();
        }
    }

    fn decode_contiguous(&mut self, mut data: &[u8], out: &mut String) {
        loop {
            match str::from_utf8(data) {
                Ok(s) => {
                    out.push_str(s);
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if valid > 0 {
                        out.push_str(&String::from_utf8_lossy(&data[..valid]));
                        data = &data[valid..];
                    }
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            data = &data[len..];
                        }
                        None => {
                            // Prefix of a valid sequence; wait for more bytes.
                            self.pending.extend_from_slice(data);
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> String {
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        for chunk in chunks {
            decoder.decode(chunk, &mut out);
        }
        decoder.finish(&mut out);
        out
    }

    #[test]
    fn test_ascii_passthrough() {
        assert_eq!(decode_all(&[b"SELECT 1;"]), "SELECT 1;");
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        // "héllo" with the two-byte é split between chunks.
        let bytes = "h\u{e9}llo".as_bytes();
        assert_eq!(decode_all(&[&bytes[..2], &bytes[2..]]), "héllo");
    }

    #[test]
    fn test_four_byte_char_split_at_every_offset() {
        let text = "a\u{1F600}b";
        let bytes = text.as_bytes();
        for split in 1..bytes.len() {
            assert_eq!(
                decode_all(&[&bytes[..split], &bytes[split..]]),
                text,
                "split at {split}"
            );
        }
    }

    #[test]
    fn test_invalid_byte_replaced() {
        assert_eq!(decode_all(&[b"a\xFFb"]), "a\u{FFFD}b");
    }

    #[test]
    fn test_lone_continuation_bytes_each_replaced() {
        assert_eq!(decode_all(&[b"\x80\x80"]), "\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn test_truncated_sequence_flushed_as_replacement() {
        // 0xE2 0x82 is a prefix of € that never completes.
        assert_eq!(decode_all(&[b"ok\xE2\x82"]), "ok\u{FFFD}");
    }

    #[test]
    fn test_broken_prefix_then_ascii() {
        // A dangling lead byte followed by ASCII in the next chunk.
        assert_eq!(decode_all(&[b"\xE2", b"ab"]), "\u{FFFD}ab");
    }

    #[test]
    fn test_surrogate_encoding_matches_contiguous() {
        // CESU-8 style surrogate bytes are invalid however they arrive.
        let whole = decode_all(&[b"\xED\xA0\x80"]);
        let split = decode_all(&[b"\xED", b"\xA0\x80"]);
        assert_eq!(whole, split);
    }

    #[test]
    fn test_finish_is_idempotent_after_flush() {
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        decoder.decode(b"\xF0\x9F", &mut out);
        decoder.finish(&mut out);
        decoder.finish(&mut out);
        assert_eq!(out, "\u{FFFD}");
    }
}
