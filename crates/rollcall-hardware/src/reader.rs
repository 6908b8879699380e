//! RFID tag reader.
//!
//! The station only needs one primitive from the reader: block until a tag
//! is presented and hand back its text payload. [`LineTagReader`] covers the
//! readers that present each tag as one line of text (keyboard-wedge USB
//! readers, serial bridges, or stdin on a bench); [`ScriptedReader`] replays
//! a fixed list of payloads.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::thread;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use crate::HardwareError;

/// Lines buffered between the reader thread and the station.
const LINE_BUFFER: usize = 16;

/// Raw text read from a tag.
///
/// Opaque to the reader; validation happens in the station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTag(String);

impl RawTag {
    /// Wraps a payload string.
    #[must_use]
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    /// The payload as read, untrimmed.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the tag, returning its payload.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RawTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A source of tag payloads.
#[async_trait]
pub trait TagReader: Send {
    /// Waits until a tag is presented and returns its payload.
    ///
    /// Returns `Ok(None)` once the reader will never yield another tag.
    async fn read_tag(&mut self) -> Result<Option<RawTag>, HardwareError>;
}

#[async_trait]
impl<T: TagReader + ?Sized> TagReader for Box<T> {
    async fn read_tag(&mut self) -> Result<Option<RawTag>, HardwareError> {
        (**self).read_tag().await
    }
}

/// Reader that yields one tag per line of a blocking byte stream.
///
/// The stream is read on its own OS thread and each line is handed over a
/// channel, so dropping a pending [`read_tag`](TagReader::read_tag) or the
/// runtime never waits on the device. The thread exits once the stream ends
/// or the reader is dropped and the next line arrives.
#[derive(Debug)]
pub struct LineTagReader {
    lines: mpsc::Receiver<std::io::Result<String>>,
}

impl LineTagReader {
    /// Starts reading lines from `source` on a dedicated thread.
    pub fn spawn<S>(source: S) -> Result<Self, HardwareError>
    where
        S: Read + Send + 'static,
    {
        let (tx, lines) = mpsc::channel(LINE_BUFFER);
        thread::Builder::new()
            .name("rollcall-reader".into())
            .spawn(move || pump_lines(BufReader::new(source), &tx))?;
        Ok(Self { lines })
    }

    /// Reads tags from standard input.
    pub fn stdin() -> Result<Self, HardwareError> {
        Self::spawn(std::io::stdin())
    }

    /// Opens a character device (or file) that emits one tag per line.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HardwareError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| HardwareError::ReaderOpen {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "Reader device opened");
        Self::spawn(file.into_std().await)
    }
}

fn pump_lines<S: BufRead>(mut source: S, tx: &mpsc::Sender<std::io::Result<String>>) {
    loop {
        let mut line = String::new();
        let item = match source.read_line(&mut line) {
            Ok(0) => {
                debug!("Reader stream ended");
                return;
            }
            Ok(_) => Ok(line),
            Err(e) => {
                warn!(error = %e, "Reader stream failed");
                Err(e)
            }
        };
        let failed = item.is_err();
        if tx.blocking_send(item).is_err() || failed {
            return;
        }
    }
}

#[async_trait]
impl TagReader for LineTagReader {
    #[instrument(skip(self), level = "debug")]
    async fn read_tag(&mut self) -> Result<Option<RawTag>, HardwareError> {
        match self.lines.recv().await {
            Some(line) => {
                let line = line?;
                Ok(Some(RawTag::new(line.trim_end_matches(['\r', '\n']))))
            }
            None => Ok(None),
        }
    }
}

/// Reader that replays a fixed list of payloads, then ends.
#[derive(Debug, Clone, Default)]
pub struct ScriptedReader {
    queue: VecDeque<RawTag>,
}

impl ScriptedReader {
    /// Creates a reader that yields `payloads` in order.
    #[must_use]
    pub fn new<I, S>(payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: payloads.into_iter().map(RawTag::new).collect(),
        }
    }

    /// Number of payloads not read yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

#[async_trait]
impl TagReader for ScriptedReader {
    async fn read_tag(&mut self) -> Result<Option<RawTag>, HardwareError> {
        Ok(self.queue.pop_front())
    }
}
