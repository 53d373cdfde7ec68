//! Service base URLs and the request URLs derived from them.

use url::Url;

/// Parse a configured base URL. Blank or non-hierarchical URLs are rejected.
pub fn parse_base(raw: &str) -> Result<Url, String> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|e| format!("{raw:?}: {e}"))?;
    if url.cannot_be_a_base() {
        return Err(format!("{raw:?} cannot carry a path"));
    }
    Ok(url)
}

/// `base` with `segments` appended, each one percent-encoded as a single
/// path segment.
pub fn join(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
