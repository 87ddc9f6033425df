//! Newline-delimited JSON processing for streaming chat responses.
//!
//! The chat endpoint answers with one JSON object per line.  This module turns
//! the raw byte stream of such a response into a stream of text fragments.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_FRAGMENTS};
use crate::types::ChatChunk;
use crate::{Error, Result};

/// Process a stream of bytes into a stream of assistant text fragments.
///
/// Each complete line is decoded on its own.  Lines carrying
/// `message.content` yield that string; other lines are skipped.  The first
/// transport, encoding or decode error is yielded once and ends the stream, so
/// fragments produced before it remain valid.  A final line without a
/// trailing newline is still decoded when the body ends.
pub fn process_ndjson<S, E>(byte_stream: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    stream::unfold(
        (stream, Vec::<u8>::new(), false),
        move |(mut stream, mut buffer, mut finished)| async move {
            loop {
                if finished {
                    return None;
                }

                if let Some(line) = take_line(&mut buffer) {
                    match parse_line(&line) {
                        Ok(Some(fragment)) => {
                            STREAM_FRAGMENTS.click();
                            return Some((Ok(fragment), (stream, buffer, finished)));
                        }
                        Ok(None) => continue,
                        Err(err) => {
                            STREAM_ERRORS.click();
                            return Some((Err(err), (stream, buffer, true)));
                        }
                    }
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(err)) => {
                        STREAM_ERRORS.click();
                        return Some((Err(err), (stream, buffer, true)));
                    }
                    None => {
                        // End of body: whatever is left is the last line.
                        finished = true;
                        let line = std::mem::take(&mut buffer);
                        match parse_line(&line) {
                            Ok(Some(fragment)) => {
                                STREAM_FRAGMENTS.click();
                                return Some((Ok(fragment), (stream, buffer, finished)));
                            }
                            Ok(None) => return None,
                            Err(err) => {
                                STREAM_ERRORS.click();
                                return Some((Err(err), (stream, buffer, finished)));
                            }
                        }
                    }
                }
            }
        },
    )
}

/// Remove and return the first complete line (without its newline).
fn take_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let pos = buffer.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(line)
}

/// Decode one line into an optional fragment.
fn parse_line(line: &[u8]) -> Result<Option<String>> {
    let text = std::str::from_utf8(line)?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    // Only text that is not JSON at all is a decode error.
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
        Error::serialization(
            format!("Failed to parse stream line '{text}': {e}"),
            Some(Box::new(e)),
        )
    })?;
    let chunk = ChatChunk::from_value(&value);

    if let Some(message) = chunk.error {
        return Err(Error::streaming(
            format!("server aborted generation: {message}"),
            None,
        ));
    }

    match chunk.fragment() {
        Some(fragment) if !fragment.is_empty() => Ok(Some(fragment.to_string())),
        _ => {
            tracing::trace!(done = chunk.done, "stream line without content");
            Ok(None)
        }
    }
}
