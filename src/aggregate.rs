//! Answer aggregation: incremental, byte-exact reassembly of the reply

use crate::classify::AnswerChunk;

/// Per-turn answer accumulator
///
/// Chunks are appended in arrival order with no trimming or
/// deduplication. Text is revealed as soon as it forms complete UTF-8;
/// bytes of a character split across chunks are held back until the
/// rest arrives.
#[derive(Debug, Default)]
pub struct AnswerAggregator {
    text: String,
    pending: Vec<u8>,
    chunks: usize,
}

impl AnswerAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, returning the newly revealed text (possibly empty)
    pub fn push(&mut self, chunk: &AnswerChunk) -> String {
        self.chunks += 1;
        self.pending.extend_from_slice(&chunk.bytes);

        let mut revealed = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    revealed.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    revealed.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match e.error_len() {
                        // Incomplete trailing sequence: wait for the next chunk
                        None => {
                            self.pending.drain(..valid_up_to);
                            break;
                        }
                        Some(invalid) => {
                            tracing::warn!(bytes = invalid, "Invalid UTF-8 in answer chunk");
                            revealed.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + invalid);
                        }
                    }
                }
            }
        }

        self.text.push_str(&revealed);
        revealed
    }

    /// Text revealed so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of chunks received
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Finish the turn, returning the full answer
    ///
    /// An incomplete character left at stream end is replaced with U+FFFD.
    pub fn finish(mut self) -> String {
        if !self.pending.is_empty() {
            tracing::warn!(
                bytes = self.pending.len(),
                "Answer stream ended inside a UTF-8 sequence"
            );
            self.text.push_str(&String::from_utf8_lossy(&self.pending));
        }
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn chunk(bytes: &[u8]) -> AnswerChunk {
        AnswerChunk {
            bytes: Bytes::copy_from_slice(bytes),
        }
    }

    #[test]
    fn test_concatenates_in_arrival_order() {
        let mut agg = AnswerAggregator::new();
        assert_eq!(agg.push(&chunk(b"Hel")), "Hel");
        assert_eq!(agg.push(&chunk(b"lo, ")), "lo, ");
        assert_eq!(agg.push(&chunk(b"world")), "world");
        assert_eq!(agg.chunk_count(), 3);
        assert_eq!(agg.finish(), "Hello, world");
    }

    #[test]
    fn test_no_trimming_or_dedup() {
        let mut agg = AnswerAggregator::new();
        agg.push(&chunk(b"  a "));
        agg.push(&chunk(b"  a "));
        agg.push(&chunk(b"\n"));
        assert_eq!(agg.finish(), "  a   a \n");
    }

    #[test]
    fn test_split_multibyte_character() {
        // "焼鳥" is e7 84 bc e9 b3 a5
        let bytes = "焼鳥".as_bytes();
        let mut agg = AnswerAggregator::new();
        assert_eq!(agg.push(&chunk(&bytes[..2])), "");
        assert_eq!(agg.push(&chunk(&bytes[2..4])), "焼");
        assert_eq!(agg.text(), "焼");
        assert_eq!(agg.push(&chunk(&bytes[4..])), "鳥");
        assert_eq!(agg.finish(), "焼鳥");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut agg = AnswerAggregator::new();
        assert_eq!(agg.push(&chunk(b"a\xffb")), "a\u{FFFD}b");
        assert_eq!(agg.finish(), "a\u{FFFD}b");
    }

    #[test]
    fn test_truncated_tail_flushed_on_finish() {
        let mut agg = AnswerAggregator::new();
        agg.push(&chunk(&"ok 鳥".as_bytes()[..5]));
        assert_eq!(agg.text(), "ok ");
        assert_eq!(agg.finish(), "ok \u{FFFD}");
    }

    #[test]
    fn test_empty_chunk_is_counted() {
        let mut agg = AnswerAggregator::new();
        assert_eq!(agg.push(&chunk(b"")), "");
        assert_eq!(agg.chunk_count(), 1);
        assert_eq!(agg.finish(), "");
    }
}
