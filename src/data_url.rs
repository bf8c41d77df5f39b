//! `data:` URL parsing and construction
//!
//! The removal backend answers with a self-contained `data:` URL; the pipeline
//! has to turn it back into bytes before compositing, and hands the composed
//! PNG back out in the same form.

use crate::error::{MorphError, Result};
use base64::{engine::general_purpose, Engine};

/// A decoded `data:` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// Media type, `text/plain;charset=US-ASCII` when omitted
    pub media_type: String,
    /// Decoded payload
    pub data: Vec<u8>,
}

impl DataUrl {
    /// Parse `data:[<mediatype>][;base64],<data>`
    ///
    /// # Errors
    /// - Missing `data:` scheme or `,` separator
    /// - Invalid base64 or percent-encoding in the payload
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        let rest = url
            .get(..5)
            .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
            .and_then(|_| url.get(5..))
            .ok_or_else(|| MorphError::composition("processed image is not a data URL"))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| MorphError::composition("data URL has no payload separator"))?;

        let (media_type, is_base64) = match header.rsplit_once(';') {
            Some((media, marker)) if marker.trim().eq_ignore_ascii_case("base64") => (media, true),
            _ => (header, false),
        };

        let data = if is_base64 {
            // Some encoders wrap long payloads; whitespace is not part of the alphabet
            let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            general_purpose::STANDARD
                .decode(compact.as_bytes())
                .map_err(|e| MorphError::composition(format!("invalid base64 payload: {}", e)))?
        } else {
            percent_decode(payload)?
        };

        let media_type = if media_type.trim().is_empty() {
            "text/plain;charset=US-ASCII".to_string()
        } else {
            media_type.trim().to_string()
        };

        Ok(Self { media_type, data })
    }

    /// Build a base64 `data:` URL
    #[must_use]
    pub fn encode(media_type: &str, data: &[u8]) -> String {
        format!(
            "data:{};base64,{}",
            media_type,
            general_purpose::STANDARD.encode(data)
        )
    }
}

fn percent_decode(input: &str) -> Result<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        if b == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| {
                    MorphError::composition(format!("invalid percent-escape at offset {}", i))
                })?;
            out.push(hex);
            i += 3;
        } else {
            out.push(b);
            i += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base64_png() {
        let url = DataUrl::encode("image/png", &[0x89, b'P', b'N', b'G']);
        assert_eq!(url, "data:image/png;base64,iVBORw==");

        let parsed = DataUrl::parse(&url).unwrap();
        assert_eq!(parsed.media_type, "image/png");
        assert_eq!(parsed.data, vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_parse_tolerates_case_and_wrapping() {
        let parsed = DataUrl::parse("DATA:image/png;BASE64,iVBO\nRw==").unwrap();
        assert_eq!(parsed.data, vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_parse_percent_encoded() {
        let parsed = DataUrl::parse("data:,hello%20world").unwrap();
        assert_eq!(parsed.media_type, "text/plain;charset=US-ASCII");
        assert_eq!(parsed.data, b"hello world".to_vec());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(DataUrl::parse("https://example.com/a.png").is_err());
        assert!(DataUrl::parse("data:image/png;base64").is_err());
        assert!(DataUrl::parse("data:image/png;base64,@@@").is_err());
        assert!(DataUrl::parse("data:,bad%zz").is_err());
        assert!(DataUrl::parse("dat").is_err());

        let err = DataUrl::parse("blob:xyz").unwrap_err();
        assert!(matches!(err, MorphError::Composition(_)));
    }
}
