//! Directory helpers for `/`-separated index paths.

/// Parent directory of `path` using POSIX `dirname` semantics.
///
/// Trailing slashes are ignored, `/` is its own parent and a path without
/// any slash has parent `.`.
pub fn dirname(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let bytes = path.as_bytes();
    let has_root = bytes[0] == b'/';

    let mut end = None;
    let mut matched_slash = true;
    for i in (1..bytes.len()).rev() {
        if bytes[i] == b'/' {
            if !matched_slash {
                end = Some(i);
                break;
            }
        } else {
            matched_slash = false;
        }
    }

    match end {
        None if has_root => "/",
        None => ".",
        Some(1) if has_root => "//",
        Some(end) => &path[..end],
    }
}

/// Every ancestor directory of `path`, root first.
///
/// `make_parents("/a/b/c")` is `["/", "/a", "/a/b"]`; a path directly under
/// the root (or the root itself) yields `["/"]`. A missing leading slash is
/// implied.
pub fn make_parents(path: &str) -> Vec<String> {
    let mut current = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    // dirname strictly shortens its input until it reaches `/`, so the walk is
    // bounded by the number of segments.
    let mut ancestors = Vec::new();
    loop {
        let parent = dirname(&current);
        if matches!(parent, "/" | "." | "") {
            break;
        }
        let parent = parent.to_string();
        ancestors.push(parent.clone());
        current = parent;
    }

    ancestors.push("/".to_string());
    ancestors.reverse();
    ancestors
}
