//! Core data types shared across the pipeline

use crate::error::{MorphError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// MIME type used when an upload declares none or an unusable one
pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// File name used when an upload carries none
pub const DEFAULT_FILE_NAME: &str = "upload.png";

/// One user-supplied image, held in memory for the duration of a request
#[derive(Clone)]
pub struct SourceImage {
    bytes: Vec<u8>,
    mime_type: Option<String>,
    file_name: String,
}

impl SourceImage {
    /// Wrap raw upload bytes
    pub fn new<S: Into<String>>(bytes: Vec<u8>, mime_type: Option<String>, file_name: S) -> Self {
        Self {
            bytes,
            mime_type,
            file_name: file_name.into(),
        }
    }

    /// Read an image from disk, guessing the MIME type from its extension
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let mime_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(mime_for_extension)
            .map(str::to_string);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(bytes, mime_type, file_name))
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Declared MIME type, or `image/png` when absent or malformed
    #[must_use]
    pub fn mime_type(&self) -> &str {
        normalize_mime_type(self.mime_type.as_deref())
    }

    /// Declared file name, or `upload.png` when blank
    #[must_use]
    pub fn file_name(&self) -> &str {
        if self.file_name.trim().is_empty() {
            DEFAULT_FILE_NAME
        } else {
            &self.file_name
        }
    }
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceImage")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Accept `type/subtype` plus `; name=value` parameters, fall back to PNG otherwise
#[must_use]
pub fn normalize_mime_type(declared: Option<&str>) -> &str {
    fn is_token(part: &str) -> bool {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c))
    }

    fn is_quoted(value: &str) -> bool {
        value
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .is_some_and(|inner| !inner.contains(|c: char| c == '"' || c == '\\'))
    }

    fn is_parameter(param: &str) -> bool {
        match param.trim().split_once('=') {
            Some((name, value)) => is_token(name) && (is_token(value) || is_quoted(value)),
            None => false,
        }
    }

    let Some(declared) = declared.map(str::trim) else {
        return DEFAULT_MIME_TYPE;
    };
    let mut parts = declared.split(';');
    let essence = parts.next().unwrap_or_default().trim();
    let valid_essence = matches!(
        essence.split_once('/'),
        Some((kind, sub)) if is_token(kind) && is_token(sub)
    );
    if valid_essence && parts.all(is_parameter) {
        declared
    } else {
        DEFAULT_MIME_TYPE
    }
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "tif" | "tiff" => Some("image/tiff"),
        "bmp" => Some("image/bmp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Name of one catalog background; always a plain file name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackgroundEntry(String);

impl BackgroundEntry {
    /// Validate a background identifier
    ///
    /// # Errors
    /// Rejects empty names, `.`/`..`, path separators and NUL bytes so that
    /// joining the name onto the images directory can never leave it.
    pub fn new<S: AsRef<str>>(name: S) -> Result<Self> {
        let name = name.as_ref();
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0'])
            || name.trim() != name;
        if invalid {
            return Err(MorphError::validation(format!(
                "Invalid background identifier: {:?}",
                name
            )));
        }
        Ok(Self(name.to_string()))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackgroundEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BackgroundEntry {
    type Error = MorphError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<BackgroundEntry> for String {
    fn from(entry: BackgroundEntry) -> Self {
        entry.0
    }
}

/// Wire shape of the background catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogListing {
    pub count: usize,
    pub backgrounds: Vec<BackgroundEntry>,
}

impl CatalogListing {
    #[must_use]
    pub fn new(backgrounds: Vec<BackgroundEntry>) -> Self {
        Self {
            count: backgrounds.len(),
            backgrounds,
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.backgrounds.iter().any(|entry| entry.name() == name)
    }
}
