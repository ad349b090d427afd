//! Encoding detection and transcoding.
//!
//! Input bytes are decoded to UTF-8 before parsing, and serialized text is
//! encoded on the way out, both through `encoding_rs`.
//!
//! # Detection order
//!
//! 1. An encoding forced by the caller.
//! 2. A Byte Order Mark.
//! 3. The `encoding` pseudo-attribute of the XML declaration, or a
//!    `<meta charset>` in HTML.
//! 4. UTF-8. Invalid UTF-8 is an error for XML; HTML falls back to
//!    windows-1252 the way browsers do.

use std::borrow::Cow;
use std::fmt;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};

/// An error that occurs during encoding detection or transcoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingError {
    /// A human-readable description of the encoding error.
    pub message: String,
    /// Whether the encoding label itself was not recognized.
    pub unsupported: bool,
}

impl EncodingError {
    fn unsupported(label: &str) -> Self {
        Self {
            message: format!("unsupported encoding: {label}"),
            unsupported: true,
        }
    }

    fn malformed(label: &str) -> Self {
        Self {
            message: format!("input is not valid {label}"),
            unsupported: false,
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding error: {}", self.message)
    }
}

impl std::error::Error for EncodingError {}

/// Looks up an encoding by its WHATWG label.
fn lookup(label: &str) -> Result<&'static Encoding, EncodingError> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| EncodingError::unsupported(label))
}

fn is_ascii_label(label: &str) -> bool {
    matches!(
        label.trim().to_ascii_lowercase().as_str(),
        "ascii" | "us-ascii" | "ansi_x3.4-1968" | "iso646-us"
    )
}

/// Returns the canonical name for an encoding label, if it is known.
///
/// # Examples
///
/// ```
/// use xmlhandle::encoding::canonical_name;
///
/// assert_eq!(canonical_name("latin1"), Some("windows-1252"));
/// assert_eq!(canonical_name("utf8"), Some("UTF-8"));
/// assert_eq!(canonical_name("no-such-thing"), None);
/// ```
#[must_use]
pub fn canonical_name(label: &str) -> Option<&'static str> {
    if is_ascii_label(label) {
        return Some("US-ASCII");
    }
    lookup(label).ok().map(Encoding::name)
}

/// Finds the encoding declared in the first bytes of a document.
///
/// The XML declaration must be ASCII-compatible, so the bytes are scanned
/// directly. For HTML, a `charset=` inside the first kilobyte is used.
fn declared_label(bytes: &[u8], html: bool) -> Option<String> {
    let scan = &bytes[..bytes.len().min(1024)];
    if scan.starts_with(b"<?xml") {
        let end = scan.windows(2).position(|w| w == b"?>")?;
        let decl = &scan[..end];
        let at = find(decl, b"encoding")?;
        return quoted_after_eq(&decl[at + b"encoding".len()..]);
    }
    if html {
        let lower = scan.to_ascii_lowercase();
        let at = find(&lower, b"charset")?;
        let rest = &scan[at + b"charset".len()..];
        if let Some(quoted) = quoted_after_eq(rest) {
            return Some(quoted);
        }
        let rest = skip_ws(rest).strip_prefix(b"=")?;
        let value: Vec<u8> = skip_ws(rest)
            .iter()
            .copied()
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.'))
            .collect();
        return (!value.is_empty()).then(|| String::from_utf8_lossy(&value).into_owned());
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn skip_ws(bytes: &[u8]) -> &[u8] {
    let n = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    &bytes[n..]
}

fn quoted_after_eq(bytes: &[u8]) -> Option<String> {
    let rest = skip_ws(skip_ws(bytes).strip_prefix(b"=")?);
    let quote = *rest.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value = &rest[1..];
    let end = value.iter().position(|&b| b == quote)?;
    Some(String::from_utf8_lossy(&value[..end]).into_owned())
}

/// Decodes document bytes to UTF-8.
///
/// Returns the text (without BOM) and the name of the encoding used.
///
/// # Errors
///
/// Returns `EncodingError` if a forced or declared encoding is unknown, or
/// if XML input is malformed for its encoding.
///
/// # Examples
///
/// ```
/// use xmlhandle::encoding::decode;
///
/// let (text, used) = decode(b"\xEF\xBB\xBF<r/>", None, false).unwrap();
/// assert_eq!(text, "<r/>");
/// assert_eq!(used, "UTF-8");
/// ```
pub fn decode(
    bytes: &[u8],
    forced: Option<&str>,
    html: bool,
) -> Result<(String, &'static str), EncodingError> {
    let (encoding, skip) = if let Some(label) = forced {
        let encoding = if is_ascii_label(label) { UTF_8 } else { lookup(label)? };
        let skip = Encoding::for_bom(bytes)
            .filter(|(bom, _)| *bom == encoding)
            .map_or(0, |(_, len)| len);
        (encoding, skip)
    } else if let Some((encoding, len)) = Encoding::for_bom(bytes) {
        (encoding, len)
    } else if let Some(label) = declared_label(bytes, html) {
        if is_ascii_label(&label) {
            (UTF_8, 0)
        } else {
            match lookup(&label) {
                // A UTF-16 declaration in bytes that scanned as ASCII is a lie.
                Ok(enc) if enc == UTF_16LE || enc == UTF_16BE => (UTF_8, 0),
                Ok(enc) => (enc, 0),
                Err(_) if html => {
                    tracing::debug!(label = %label, "ignoring unknown HTML charset");
                    (UTF_8, 0)
                }
                Err(e) => return Err(e),
            }
        }
    } else {
        (UTF_8, 0)
    };

    let body = &bytes[skip..];
    if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(body) {
        return Ok((text.into_owned(), encoding.name()));
    }
    if html {
        let fallback = if encoding == UTF_8 { WINDOWS_1252 } else { encoding };
        let (text, _) = fallback.decode_without_bom_handling(body);
        return Ok((text.into_owned(), fallback.name()));
    }
    Err(EncodingError::malformed(encoding.name()))
}

/// Encodes serialized text for output.
///
/// Characters the target encoding cannot represent are written as numeric
/// character references.
///
/// # Errors
///
/// Returns `EncodingError` if the label is not a known encoding.
///
/// # Examples
///
/// ```
/// use xmlhandle::encoding::encode;
///
/// let bytes = encode("caf\u{e9} \u{263a}", "ISO-8859-1").unwrap();
/// assert_eq!(bytes, b"caf\xE9 &#9786;");
/// ```
pub fn encode(text: &str, label: &str) -> Result<Vec<u8>, EncodingError> {
    if is_ascii_label(label) {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            if c.is_ascii() {
                out.push(c);
            } else {
                out.push_str(&format!("&#{};", u32::from(c)));
            }
        }
        return Ok(out.into_bytes());
    }
    let encoding = lookup(label)?;
    if encoding == UTF_16LE {
        return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
    }
    if encoding == UTF_16BE {
        return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
    }
    let (bytes, _, _) = encoding.encode(text);
    Ok(match bytes {
        Cow::Borrowed(b) => b.to_vec(),
        Cow::Owned(b) => b,
    })
}
