use std::collections::HashMap;

use actix_multipart::Multipart;
use futures_util::TryStreamExt as _;

use crate::error::ApiError;

const OCTET_STREAM: &str = "application/octet-stream";

/// One file part of a multipart body, fully buffered.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn size(&self) -> usize { self.bytes.len() }

    /// Lower-cased extension including the dot, e.g. ".pdf"; empty when absent.
    pub fn extension(&self) -> String {
        match self.filename.rfind('.') {
            Some(idx) => self.filename[idx..].to_ascii_lowercase(),
            None => String::new(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("File size must be less than {}MB (field '{field}')", .limit / (1024 * 1024))]
    TooLarge { field: String, limit: usize },
    #[error("field '{0}' is not valid UTF-8")]
    BadText(String),
    #[error("malformed multipart body: {0}")]
    Malformed(String),
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

/// Decoded multipart body: text fields by name plus every file part in order.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl MultipartForm {
    /// Trimmed text field; empty values count as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Raw text field, kept even when empty.
    pub fn raw(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    pub fn take_file(&mut self, field: &str) -> Option<UploadedFile> {
        let idx = self.files.iter().position(|f| f.field == field)?;
        Some(self.files.remove(idx))
    }

    pub fn take_files(&mut self, field: &str) -> Vec<UploadedFile> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|f| f.field == field);
        self.files = rest;
        taken
    }
}

fn resolve_mime(declared: Option<String>, bytes: &[u8]) -> String {
    match declared {
        Some(m) if m != OCTET_STREAM => m,
        _ => infer::get(bytes)
            .map(|t| t.mime_type().to_string())
            .unwrap_or_else(|| OCTET_STREAM.into()),
    }
}

/// Buffer a multipart body, rejecting any single part above `max_file_bytes`
/// as soon as the limit is crossed.
pub async fn read_multipart(mut payload: Multipart, max_file_bytes: usize) -> Result<MultipartForm, UploadError> {
    let mut form = MultipartForm::default();
    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        log::warn!("multipart error: {e}");
        UploadError::Malformed(e.to_string())
    })? {
        let disposition = field.content_disposition();
        let Some(name) = disposition.get_name().map(str::to_string) else { continue };
        let filename = disposition.get_filename().map(str::to_string);
        let declared = field.content_type().map(|m| m.essence_str().to_string());

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            log::warn!("multipart read error on '{name}': {e}");
            UploadError::Malformed(e.to_string())
        })? {
            if bytes.len() + chunk.len() > max_file_bytes {
                return Err(UploadError::TooLarge { field: name, limit: max_file_bytes });
            }
            bytes.extend_from_slice(&chunk);
        }

        match filename {
            Some(filename) => {
                let mime = resolve_mime(declared, &bytes);
                form.files.push(UploadedFile { field: name, filename, mime, bytes });
            }
            None => {
                let text = String::from_utf8(bytes).map_err(|_| UploadError::BadText(name.clone()))?;
                form.fields.insert(name, text);
            }
        }
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(field: &str, name: &str) -> UploadedFile {
        UploadedFile { field: field.into(), filename: name.into(), mime: OCTET_STREAM.into(), bytes: vec![1] }
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(f("file", "Report.PDF").extension(), ".pdf");
        assert_eq!(f("file", "archive.tar.zip").extension(), ".zip");
        assert_eq!(f("file", "README").extension(), "");
    }

    #[test]
    fn take_files_partitions_by_field() {
        let mut form = MultipartForm {
            fields: HashMap::new(),
            files: vec![f("files", "a"), f("thumbnail", "t"), f("files", "b")],
        };
        let taken = form.take_files("files");
        assert_eq!(taken.len(), 2);
        assert_eq!(form.files.len(), 1);
        assert!(form.take_file("thumbnail").is_some());
        assert!(form.take_file("thumbnail").is_none());
    }

    #[test]
    fn sniffs_when_declared_type_is_generic() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(resolve_mime(Some(OCTET_STREAM.into()), &png), "image/png");
        assert_eq!(resolve_mime(Some("video/mp4".into()), &png), "video/mp4");
        assert_eq!(resolve_mime(None, b"plain"), OCTET_STREAM);
    }
}
