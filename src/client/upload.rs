use std::path::Path;

use futures::stream::{self, Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method};

use crate::error::ApiError;

/// A multipart upload: one file part plus optional text fields.
#[derive(Debug, Clone)]
pub struct Upload {
    pub field: String,
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
    pub fields: Vec<(String, String)>,
    pub method: Method,
    pub headers: Vec<(String, String)>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: "file".to_string(),
            file_name: file_name.into(),
            mime: None,
            bytes,
            fields: Vec::new(),
            method: Method::POST,
            headers: Vec::new(),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn into_form<F>(self, chunk_bytes: usize, on_progress: F) -> Result<Form, ApiError>
    where
        F: FnMut(u8) + Send + Sync + 'static,
    {
        let length = self.bytes.len() as u64;
        let body = Body::wrap_stream(progress_stream(self.bytes, chunk_bytes, on_progress));

        let mut part = Part::stream_with_length(body, length).file_name(self.file_name);
        if let Some(mime) = &self.mime {
            part = part.mime_str(mime)?;
        }

        let mut form = Form::new().part(self.field, part);
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        Ok(form)
    }
}

/// Percent-complete bookkeeping. Reports only when the integer percentage
/// moves, so callers see a non-decreasing sequence ending at 100.
pub(crate) struct Progress<F> {
    total: usize,
    sent: usize,
    last: Option<u8>,
    callback: F,
}

impl<F: FnMut(u8)> Progress<F> {
    pub(crate) fn new(total: usize, callback: F) -> Self {
        Self {
            total,
            sent: 0,
            last: None,
            callback,
        }
    }

    pub(crate) fn advance(&mut self, bytes: usize) {
        self.sent = (self.sent + bytes).min(self.total);
        let percent = if self.total == 0 {
            100
        } else {
            ((self.sent as u128 * 100) / self.total as u128) as u8
        };

        if self.last.map_or(true, |last| percent > last) {
            self.last = Some(percent);
            (self.callback)(percent);
        }
    }
}

fn progress_stream<F>(
    bytes: Vec<u8>,
    chunk_bytes: usize,
    on_progress: F,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + Sync + 'static
where
    F: FnMut(u8) + Send + Sync + 'static,
{
    let mut chunks: Vec<Vec<u8>> = bytes.chunks(chunk_bytes.max(1)).map(<[u8]>::to_vec).collect();
    if chunks.is_empty() {
        chunks.push(Vec::new());
    }

    let mut progress = Progress::new(bytes.len(), on_progress);
    stream::iter(chunks).map(move |chunk| {
        progress.advance(chunk.len());
        Ok(chunk)
    })
}
