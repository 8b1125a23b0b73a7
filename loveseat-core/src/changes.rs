//! The `_changes` feed.
//!
//! In batch mode the server answers with a single JSON body listing the changes. In
//! continuous mode the response stays open and the server writes one JSON object per
//! line as documents change, with blank lines as heartbeats. [`ChangesFeed`] turns
//! that body into a [`Stream`] of decoded events.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use serde_json::Value;
use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll, ready},
};

use crate::{
    error::{LoveseatError, LoveseatResult},
    locator::RequestOptions,
    transport::ByteStream,
};

/// The common values of the `feed` parameter of a changes request.
///
/// Any other value can be passed as a raw string through [`ChangesOptions::param`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Normal,
    LongPoll,
    Continuous,
}

impl Feed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Normal => "normal",
            Feed::LongPoll => "longpoll",
            Feed::Continuous => "continuous",
        }
    }
}

/// Parameters of a changes request.
///
/// The `feed` parameter decides how the response is read: `continuous` opens a
/// stream, any other value (or none at all) is read as a single body. It is sent at
/// most once, first, and only if it was set.
///
/// # Example
///
/// ```ignore
/// let options = ChangesOptions::new()
///     .feed(Feed::Continuous)
///     .since("now")
///     .heartbeat(10_000);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangesOptions {
    feed: Option<String>,
    params: Vec<(String, String)>,
}

impl ChangesOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(self, feed: Feed) -> Self {
        self.param("feed", feed.as_str())
    }

    /// Only report changes after this sequence (`"now"` skips the backlog).
    pub fn since(self, since: impl ToString) -> Self {
        self.param("since", since)
    }

    pub fn limit(self, limit: usize) -> Self {
        self.param("limit", limit)
    }

    pub fn include_docs(self, include: bool) -> Self {
        self.param("include_docs", include)
    }

    /// Milliseconds between heartbeat lines in continuous mode.
    pub fn heartbeat(self, millis: u64) -> Self {
        self.param("heartbeat", millis)
    }

    pub fn timeout(self, millis: u64) -> Self {
        self.param("timeout", millis)
    }

    /// Adds any other parameter supported by the server (`filter`, `style`, ...).
    ///
    /// A `feed` key replaces the feed type instead of being appended.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let key = key.into();

        if key == "feed" {
            self.feed = Some(value.to_string());
        } else {
            self.params.push((key, value.to_string()));
        }
        self
    }

    /// Returns the feed type, if one was set.
    pub fn feed_type(&self) -> Option<&str> {
        self.feed.as_deref()
    }

    pub fn is_continuous(&self) -> bool {
        self.feed_type() == Some(Feed::Continuous.as_str())
    }

    pub(crate) fn into_request(self) -> RequestOptions {
        let options = match self.feed {
            Some(feed) => RequestOptions::new().param("feed", feed),
            None => RequestOptions::new(),
        };

        options.params(self.params)
    }
}

/// The result of a changes request.
pub enum Changes {
    /// The decoded body of a `normal` or `longpoll` request.
    Batch(Value),
    /// The open stream of a `continuous` request.
    Continuous(ChangesFeed),
}

impl Changes {
    pub fn into_batch(self) -> Option<Value> {
        match self {
            Changes::Batch(value) => Some(value),
            Changes::Continuous(_) => None,
        }
    }

    pub fn into_feed(self) -> Option<ChangesFeed> {
        match self {
            Changes::Batch(_) => None,
            Changes::Continuous(feed) => Some(feed),
        }
    }
}

impl fmt::Debug for Changes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Changes::Batch(value) => f.debug_tuple("Batch").field(value).finish(),
            Changes::Continuous(_) => f.debug_tuple("Continuous").finish_non_exhaustive(),
        }
    }
}

/// A lazy, unbounded stream of change events read from a continuous feed.
///
/// Each non-empty line of the response body is decoded as UTF-8 and parsed as one
/// JSON object; blank heartbeat lines are skipped. A line that fails to decode yields
/// an `Err` item and the stream carries on with the next line. The stream ends only
/// when the server closes the connection or the body fails; dropping it releases the
/// connection.
pub struct ChangesFeed {
    body: ByteStream,
    buffer: BytesMut,
    finished: bool,
}

impl ChangesFeed {
    pub fn new(body: ByteStream) -> Self {
        Self {
            body,
            buffer: BytesMut::new(),
            finished: false,
        }
    }

    fn next_line(&mut self) -> Option<Bytes> {
        let end = self.buffer.iter().position(|byte| *byte == b'\n')?;

        Some(self.buffer.split_to(end + 1).freeze())
    }
}

/// Decodes one feed line; `Ok(None)` for heartbeats.
fn decode_line(line: &[u8]) -> LoveseatResult<Option<Value>> {
    let text = std::str::from_utf8(line)
        .map_err(|e| LoveseatError::Serialization(format!("feed line is not UTF-8: {e}")))?
        .trim();

    if text.is_empty() {
        return Ok(None);
    }

    Ok(Some(serde_json::from_str(text)?))
}

impl Stream for ChangesFeed {
    type Item = LoveseatResult<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            while let Some(line) = this.next_line() {
                if let Some(event) = decode_line(&line).transpose() {
                    return Poll::Ready(Some(event));
                }
            }

            if this.finished {
                if this.buffer.is_empty() {
                    return Poll::Ready(None);
                }

                let rest = this.buffer.split().freeze();
                return Poll::Ready(decode_line(&rest).transpose());
            }

            match ready!(this.body.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => this.buffer.extend_from_slice(&chunk),
                Some(Err(err)) => {
                    this.finished = true;
                    this.buffer.clear();
                    return Poll::Ready(Some(Err(err)));
                }
                None => this.finished = true,
            }
        }
    }
}

impl fmt::Debug for ChangesFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangesFeed")
            .field("buffered", &self.buffer.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
