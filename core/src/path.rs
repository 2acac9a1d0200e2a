use crate::{Error, Result};

/// Location inside every box reserved for the box's own manifest.
pub const RESERVED_MANIFEST_PATH: &str = "/.boxr/manifest";

/// Normalize a request path into the `/`-rooted form boxes are addressed with.
///
/// - Converts `\` to `/`.
/// - Collapses empty and `.` segments.
/// - Rejects `..` segments, NUL bytes and control characters.
///
/// The result never ends with `/` unless it is the root itself.
pub fn normalize_request_path(input: &str) -> Result<String> {
    const MAX_PATH_BYTES: usize = 4096;

    if input != input.trim() {
        return Err(Error::InvalidPath(
            "path must not have leading or trailing whitespace".to_string(),
        ));
    }
    if input.len() > MAX_PATH_BYTES {
        return Err(Error::InvalidPath(format!(
            "path is too large ({} bytes; max {} bytes)",
            input.len(),
            MAX_PATH_BYTES
        )));
    }
    if input.contains('\0') {
        return Err(Error::InvalidPath("NUL bytes are not allowed".to_string()));
    }
    if input.chars().any(|ch| ch.is_control()) {
        return Err(Error::InvalidPath(
            "path must not contain control characters".to_string(),
        ));
    }

    let s = input.replace('\\', "/");
    let mut out = Vec::<&str>::new();
    for seg in s.split('/') {
        if seg.is_empty() || seg == "." {
            continue;
        }
        if seg == ".." {
            return Err(Error::InvalidPath(
                ".. segments are not allowed".to_string(),
            ));
        }
        out.push(seg);
    }
    Ok(format!("/{}", out.join("/")))
}

/// Join a directory request path with a document name, e.g. `/docs` + `/index.html`.
pub fn join_request_path(dir: &str, document: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let document = document.trim_start_matches('/');
    format!("{dir}/{document}")
}
