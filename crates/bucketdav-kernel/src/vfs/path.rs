//! Virtual path normalization and object-key translation.
//!
//! Virtual paths always use `/` and start with it. A trailing `/` marks a
//! directory. Object keys never start with `/`; a key ending in `/` is a
//! directory marker.

/// Path separator shared by virtual paths and object keys.
pub const SEPARATOR: char = '/';

/// Split a path into normalized segments.
///
/// Empty and `.` segments are dropped, `..` pops the previous segment.
/// A `..` at the top simply stays at the top.
pub fn segments(path: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    out
}

/// Returns true if the path denotes a directory (trailing separator).
pub fn is_directory_path(path: &str) -> bool {
    path.ends_with(SEPARATOR)
}

/// Normalize a virtual path.
///
/// Collapses duplicate separators, resolves `.`/`..`, guarantees a leading
/// `/` and keeps a trailing `/` when the input had one.
pub fn normalize_virtual(path: &str) -> String {
    let segs = segments(path);
    if segs.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(path.len() + 1);
    for seg in &segs {
        out.push(SEPARATOR);
        out.push_str(seg);
    }
    if is_directory_path(path) {
        out.push(SEPARATOR);
    }
    out
}

/// Normalize a mount path: leading `/`, no trailing `/`.
pub fn normalize_mount_path(path: &str) -> String {
    let normalized = normalize_virtual(path);
    if normalized == "/" {
        normalized
    } else {
        normalized.trim_end_matches(SEPARATOR).to_string()
    }
}

/// Two virtual paths name the same resource, ignoring a trailing separator.
pub fn same_resource(a: &str, b: &str) -> bool {
    let a = normalize_virtual(a);
    let b = normalize_virtual(b);
    a.trim_end_matches(SEPARATOR) == b.trim_end_matches(SEPARATOR)
}

/// Translate a mount sub-path into an object key.
///
/// The root prefix is joined with exactly one separator whether or not it
/// already ends in one. Directories get a trailing separator, except the
/// bucket root itself which is the empty key.
pub fn object_key(root_prefix: &str, sub_path: &str, is_directory: bool) -> String {
    let mut parts = segments(root_prefix);
    parts.extend(segments(sub_path));
    let mut key = parts.join("/");
    if is_directory && !key.is_empty() {
        key.push(SEPARATOR);
    }
    key
}

/// Key of the mount root for a backend root prefix.
pub fn mount_root_key(root_prefix: &str) -> String {
    object_key(root_prefix, "", true)
}

/// Directory key containing `key`, or `None` for the bucket root.
///
/// `a/b/c.txt` → `a/b/`, `a/b/` → `a/`, `a` → `""`.
pub fn parent_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    let trimmed = key.trim_end_matches(SEPARATOR);
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => Some(trimmed[..=idx].to_string()),
        None => Some(String::new()),
    }
}

/// Ancestor directory keys of `key`, nearest first, stopping before `root_key`.
///
/// The key itself is not part of the chain. Keys outside `root_key` yield an
/// empty chain.
pub fn ancestor_chain(key: &str, root_key: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = parent_key(key);
    while let Some(dir) = current {
        if dir.len() <= root_key.len() || !dir.starts_with(root_key) {
            break;
        }
        current = parent_key(&dir);
        chain.push(dir);
    }
    chain
}

/// Final path component of a key, without a trailing separator.
pub fn file_name(key: &str) -> &str {
    let trimmed = key.trim_end_matches(SEPARATOR);
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}
