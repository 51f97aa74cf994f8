//! File selection state
//!
//! Holds the file the user picked most recently. Selection is replaced on
//! every pick and never cleared explicitly.

use bytes::Bytes;
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use thiserror::Error;

/// MIME type used when the client did not report one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Selection errors
#[derive(Error, Debug, PartialEq)]
pub enum SelectionError {
    #[error("File name is not valid UTF-8 after decoding: {0}")]
    InvalidName(String),
}

/// A file chosen by the user
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    /// Original file name, used verbatim as the object key
    pub name: String,
    /// MIME type reported by the client
    pub content_type: String,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Build a file from an upload request.
    ///
    /// `encoded_name` is the raw (percent-encoded) path segment carrying the
    /// file name. Returns `Ok(None)` when the decoded name is empty, which is
    /// how the page signals that nothing was picked. Names that do not decode
    /// to UTF-8 are rejected so distinct names never map to the same key.
    pub fn from_request(
        encoded_name: &str,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> Result<Option<Self>, SelectionError> {
        let name = percent_decode_str(encoded_name)
            .decode_utf8()
            .map_err(|_| SelectionError::InvalidName(encoded_name.to_string()))?
            .into_owned();

        if name.is_empty() {
            return Ok(None);
        }

        let content_type = content_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);

        Ok(Some(Self::new(name, content_type, bytes)))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Currently selected file
#[derive(Debug, Default)]
pub struct FileSelection {
    current: Mutex<Option<SelectedFile>>,
}

impl FileSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a selection event: keep the first file, or none if the event
    /// carried no files. Type and size are not checked.
    pub fn select<I>(&self, files: I) -> Option<SelectedFile>
    where
        I: IntoIterator<Item = SelectedFile>,
    {
        let first = files.into_iter().next();
        *self.current.lock() = first.clone();
        first
    }

    /// The selected file, if any
    pub fn current(&self) -> Option<SelectedFile> {
        self.current.lock().clone()
    }
}
