//! Prim path helpers
//!
//! Paths are slash-delimited and absolute (`/World/Box`). The pseudo-root is
//! written `/` or the empty string.

/// Join a parent path and a child name
pub fn join(parent: &str, name: &str) -> String {
    if is_root(parent) {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

pub fn is_root(path: &str) -> bool {
    path.is_empty() || path == "/"
}

/// Parent path; `/` for top-level prims, `None` for the root itself
pub fn parent_of(path: &str) -> Option<&str> {
    if is_root(path) {
        return None;
    }
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some("/"),
        Some(index) => Some(&trimmed[..index]),
        None => Some("/"),
    }
}

/// Last path segment
pub fn name_of(path: &str) -> Option<&str> {
    if is_root(path) {
        return None;
    }
    path.trim_end_matches('/').rsplit('/').next()
}

/// True when `path` lies strictly below `ancestor`
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if is_root(ancestor) {
        return !is_root(path);
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

pub fn is_same_or_descendant(path: &str, ancestor: &str) -> bool {
    path == ancestor || is_descendant(path, ancestor)
}

/// Replace the `old_prefix` portion of `path` with `new_prefix`
pub fn rebase(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if path == old_prefix {
        Some(new_prefix.to_string())
    } else if is_descendant(path, old_prefix) {
        Some(format!("{}{}", new_prefix, &path[old_prefix.len()..]))
    } else {
        None
    }
}

/// Number of segments (`/A/B` → 2)
pub fn depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

/// Prim names must be identifiers
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn is_valid_path(path: &str) -> bool {
    path.starts_with('/')
        && path
            .split('/')
            .skip(1)
            .all(|segment| is_valid_name(segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_and_parent() {
        assert_eq!(join("/", "World"), "/World");
        assert_eq!(join("", "World"), "/World");
        assert_eq!(join("/World", "Box"), "/World/Box");
        assert_eq!(parent_of("/World/Box"), Some("/World"));
        assert_eq!(parent_of("/World"), Some("/"));
        assert_eq!(parent_of("/"), None);
    }

    #[test]
    fn test_descendant_checks() {
        assert!(is_descendant("/World/Box", "/World"));
        assert!(!is_descendant("/WorldBox", "/World"));
        assert!(!is_descendant("/World", "/World"));
        assert!(is_same_or_descendant("/World", "/World"));
    }

    #[test]
    fn test_rebase() {
        assert_eq!(
            rebase("/Root/Old/Child", "/Root/Old", "/Root/New"),
            Some("/Root/New/Child".to_string())
        );
        assert_eq!(rebase("/Root/Older", "/Root/Old", "/Root/New"), None);
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("Box_1"));
        assert!(!is_valid_name("1Box"));
        assert!(!is_valid_name("Bad Name"));
        assert!(!is_valid_name(""));
        assert!(is_valid_path("/World/Box_1"));
        assert!(!is_valid_path("World/Box"));
    }
}
