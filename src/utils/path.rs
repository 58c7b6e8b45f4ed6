/// A request path split into its routing prefix and the remainder that gets forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixedPath<'a> {
    pub prefix: &'a str,
    /// Remainder of the path after `/<prefix>/`, without a leading slash
    pub rest: &'a str,
}

/// Split `/<prefix>/<rest>` into its parts.
/// Returns None when the path has no non-empty first segment followed by a '/'.
pub fn split_prefix(path: &str) -> Option<PrefixedPath<'_>> {
    let trimmed = path.strip_prefix('/')?;
    let (prefix, rest) = trimmed.split_once('/')?;
    if prefix.is_empty() {
        return None;
    }
    Some(PrefixedPath { prefix, rest })
}

/// Join a target base path and a forwarded remainder with exactly one slash between them
pub fn join_paths(base: &str, rest: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), rest.trim_start_matches('/'))
}

/// Merge the target's query with the request's query, target first
pub fn join_queries(target: Option<&str>, request: Option<&str>) -> Option<String> {
    match (target.filter(|q| !q.is_empty()), request.filter(|q| !q.is_empty())) {
        (Some(t), Some(r)) => Some(format!("{}&{}", t, r)),
        (Some(t), None) => Some(t.to_string()),
        (None, Some(r)) => Some(r.to_string()),
        (None, None) => None,
    }
}
