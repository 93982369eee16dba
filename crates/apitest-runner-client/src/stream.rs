//! Incremental decoding of the batch-run response stream: newline-delimited
//! JSON chunks, each decoded independently as it arrives.

use serde_json::Value;

use crate::RunnerClientError;

/// Buffers raw stream chunks and yields one JSON value per complete line.
/// Chunk boundaries carry no meaning: a line may span many chunks and a
/// chunk may carry many lines.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    buffer: Vec<u8>,
}

impl ChunkDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every value completed by it. An undecodable
    /// line is an error: the batch stream aborts rather than skipping.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Value>, RunnerClientError> {
        self.buffer.extend_from_slice(chunk);
        let mut values = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(value) = decode_line(&line[..newline])? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Flush a trailing line the server never terminated.
    pub fn finish(self) -> Result<Option<Value>, RunnerClientError> {
        decode_line(&self.buffer)
    }
}

fn decode_line(line: &[u8]) -> Result<Option<Value>, RunnerClientError> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(trimmed)
        .map(Some)
        .map_err(|error| RunnerClientError::Decode {
            message: format!("undecodable stream chunk: {error}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn one_value_per_line() {
        let mut decoder = ChunkDecoder::new();
        let values = decoder
            .feed(b"{\"name\":\"a\"}\n{\"name\":\"b\"}\n")
            .expect("feed");
        assert_eq!(values, vec![json!({"name": "a"}), json!({"name": "b"})]);
        assert_eq!(decoder.finish().expect("finish"), None);
    }

    #[test]
    fn lines_survive_arbitrary_chunk_boundaries() {
        let mut decoder = ChunkDecoder::new();
        assert!(decoder.feed(b"{\"na").expect("feed").is_empty());
        assert!(decoder.feed(b"me\":\"spl").expect("feed").is_empty());
        let values = decoder.feed(b"it\"}\n").expect("feed");
        assert_eq!(values, vec![json!({"name": "split"})]);
    }

    #[test]
    fn one_chunk_may_carry_many_lines() {
        let mut decoder = ChunkDecoder::new();
        let values = decoder.feed(b"1\n2\n3\n").expect("feed");
        assert_eq!(values, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn trailing_unterminated_line_is_flushed_at_finish() {
        let mut decoder = ChunkDecoder::new();
        assert!(decoder.feed(b"{\"done\":true}").expect("feed").is_empty());
        assert_eq!(decoder.finish().expect("finish"), Some(json!({"done": true})));
    }

    #[test]
    fn blank_lines_and_crlf_are_tolerated() {
        let mut decoder = ChunkDecoder::new();
        let values = decoder.feed(b"{\"a\":1}\r\n\n  \n{\"b\":2}\n").expect("feed");
        assert_eq!(values, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn undecodable_line_aborts_with_a_decode_error() {
        let mut decoder = ChunkDecoder::new();
        let error = decoder.feed(b"{broken\n").expect_err("must fail");
        assert!(matches!(error, RunnerClientError::Decode { .. }));
    }

    #[test]
    fn empty_stream_finishes_clean() {
        let decoder = ChunkDecoder::new();
        assert_eq!(decoder.finish().expect("finish"), None);
    }
}
