//! `Depth`, `Overwrite` and `Destination` header parsing.

use http::HeaderMap;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use url::Url;

use crate::error::{DavError, DavResult};
use crate::vfs::path;

pub const DEPTH: &str = "depth";
pub const OVERWRITE: &str = "overwrite";
pub const DESTINATION: &str = "destination";

/// Placeholder origin relative destinations are resolved against.
const LOCAL_ORIGIN: &str = "http://bucketdav.invalid";

/// Characters escaped when a virtual path is placed into a URL.
pub(crate) const PATH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Value of a `Depth` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Depth {
    #[strum(serialize = "0")]
    Zero,
    #[strum(serialize = "1")]
    One,
    #[strum(serialize = "infinity")]
    Infinity,
}

impl Depth {
    /// Parse the `Depth` header. `None` when absent.
    pub fn from_headers(headers: &HeaderMap) -> DavResult<Option<Depth>> {
        let Some(value) = headers.get(DEPTH) else {
            return Ok(None);
        };
        let value = value
            .to_str()
            .map_err(|_| DavError::bad_request("Depth header is not valid text"))?;
        match value.trim().to_ascii_lowercase().as_str() {
            "0" => Ok(Some(Depth::Zero)),
            "1" => Ok(Some(Depth::One)),
            "infinity" => Ok(Some(Depth::Infinity)),
            other => Err(DavError::bad_request(format!("invalid Depth header: {other}"))),
        }
    }
}

/// `Overwrite: F` disables overwriting; anything else, or nothing, allows it.
pub fn overwrite(headers: &HeaderMap) -> bool {
    match headers.get(OVERWRITE).and_then(|v| v.to_str().ok()) {
        Some(value) => !value.trim().eq_ignore_ascii_case("f"),
        None => true,
    }
}

/// Virtual path named by the `Destination` header.
///
/// Accepts absolute URLs (scheme and host are ignored), absolute paths and
/// paths relative to `request_path`. The result is percent-decoded and has
/// `base_path` stripped.
pub fn destination(headers: &HeaderMap, request_path: &str, base_path: &str) -> DavResult<String> {
    let raw = headers
        .get(DESTINATION)
        .ok_or_else(|| DavError::bad_request("missing Destination header"))?
        .to_str()
        .map_err(|_| DavError::bad_request("Destination header is not valid text"))?
        .trim();
    if raw.is_empty() {
        return Err(DavError::bad_request("empty Destination header"));
    }

    let request_url = format!(
        "{}{}{}",
        LOCAL_ORIGIN,
        base_path,
        utf8_percent_encode(&path::normalize_virtual(request_path), PATH_ENCODE_SET)
    );
    let base = Url::parse(&request_url)
        .map_err(|e| DavError::bad_request(format!("invalid request path: {e}")))?;
    let target = base
        .join(raw)
        .map_err(|e| DavError::bad_request(format!("invalid Destination header: {e}")))?;

    let decoded = percent_decode_str(target.path())
        .decode_utf8()
        .map_err(|_| DavError::bad_request("Destination is not valid UTF-8"))?;

    let relative = if base_path.is_empty() {
        &*decoded
    } else {
        match decoded.strip_prefix(base_path) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => {
                return Err(DavError::bad_request(format!(
                    "Destination {decoded} is outside {base_path}"
                )));
            }
        }
    };
    Ok(path::normalize_virtual(relative))
}
