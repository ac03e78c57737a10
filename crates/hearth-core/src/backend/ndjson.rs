//! Newline-delimited JSON decoding.
//!
//! The body is consumed lazily: nothing is read from the network until the
//! caller polls for the next line, so dropping the stream stops the read.

use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use super::ChatChunk;

/// Longest line kept. Anything longer is dropped as malformed.
pub const MAX_LINE_BYTES: usize = 1 << 20;

struct LineState<S> {
    body: Pin<Box<S>>,
    buf: Vec<u8>,
    /// Bytes of `buf` already searched for a newline.
    scanned: usize,
    /// Inside a line that went over the limit; skip up to its newline.
    oversized: bool,
    limit: usize,
    eof: bool,
}

fn take_line(raw: Vec<u8>) -> String {
    String::from_utf8_lossy(&raw)
        .trim_end_matches(['\n', '\r'])
        .to_owned()
}

/// Split a byte stream into lines.
///
/// Lines are cut on `\n` bytes before UTF-8 decoding, so a multi-byte
/// character split across two network chunks is reassembled intact. A last
/// line without a trailing newline is still yielded. After an error the
/// stream ends. Lines over [`MAX_LINE_BYTES`] are skipped.
pub fn lines<S, E>(body: S) -> impl Stream<Item = Result<String, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    lines_with_limit(body, MAX_LINE_BYTES)
}

fn lines_with_limit<S, E>(body: S, limit: usize) -> impl Stream<Item = Result<String, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    let state = LineState {
        body: Box::pin(body),
        buf: Vec::new(),
        scanned: 0,
        oversized: false,
        limit,
        eof: false,
    };
    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(offset) = st.buf[st.scanned..].iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = st.buf.drain(..=st.scanned + offset).collect();
                st.scanned = 0;
                if std::mem::take(&mut st.oversized) {
                    continue;
                }
                if raw.len() > st.limit {
                    warn!(limit = st.limit, "dropping oversized stream line");
                    continue;
                }
                return Some((Ok(take_line(raw)), st));
            }
            st.scanned = st.buf.len();
            if st.buf.len() > st.limit {
                if !st.oversized {
                    warn!(limit = st.limit, "dropping oversized stream line");
                }
                st.oversized = true;
                st.buf.clear();
                st.scanned = 0;
            }
            if st.eof {
                if st.buf.is_empty() || st.oversized {
                    return None;
                }
                let raw = std::mem::take(&mut st.buf);
                return Some((Ok(take_line(raw)), st));
            }
            match st.body.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    st.eof = true;
                    st.buf.clear();
                    st.scanned = 0;
                    return Some((Err(e), st));
                }
                None => st.eof = true,
            }
        }
    })
}

/// Parse one line; `None` for blank, malformed or foreign lines.
pub fn parse_chunk(line: &str) -> Option<ChatChunk> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<ChatChunk>(line) {
        Ok(chunk) => {
            if let Some(error) = &chunk.error {
                warn!(error = %error, "backend reported an in-band error; line ignored");
                return None;
            }
            if chunk.message.is_none() && !chunk.done {
                debug!(line = %line, "dropping line with neither message nor done");
                return None;
            }
            Some(chunk)
        }
        Err(e) => {
            debug!(line = %line, error = %e, "dropping malformed stream line");
            None
        }
    }
}

/// Decode a streamed chat body into chunks, silently skipping lines that do
/// not parse.
pub fn chunks<S, E>(body: S) -> impl Stream<Item = Result<ChatChunk, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    lines(body).filter_map(|line| async move {
        match line {
            Ok(line) => parse_chunk(&line).map(Ok),
            Err(e) => Some(Err(e)),
        }
    })
}
