//! Rule-id glob matching
//!
//! Policy rules and suppressions target rule ids with `*` wildcards
//! anywhere in the pattern (`pi-*`, `*-encoded`, `*`). Matching is
//! case-sensitive and anchored at both ends.

/// Whether `pattern` matches `candidate`, with `*` matching any run of
/// characters (including the empty run)
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();

    // No wildcard: exact match
    if segments.len() == 1 {
        return pattern == candidate;
    }

    let mut remainder = candidate;

    // First segment must anchor at the start
    let first = segments[0];
    if !remainder.starts_with(first) {
        return false;
    }
    remainder = &remainder[first.len()..];

    // Middle segments match greedily left-to-right
    for segment in &segments[1..segments.len() - 1] {
        if segment.is_empty() {
            continue;
        }
        match remainder.find(segment) {
            Some(pos) => remainder = &remainder[pos + segment.len()..],
            None => return false,
        }
    }

    // Last segment must anchor at the end
    let last = segments[segments.len() - 1];
    last.is_empty() || remainder.ends_with(last)
}

/// Whether any pattern in the list matches
pub fn any_glob_match<'a, I>(patterns: I, candidate: &str) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    patterns.into_iter().any(|p| glob_match(p, candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(glob_match("pi-001", "pi-001"));
        assert!(!glob_match("pi-001", "pi-002"));
        assert!(!glob_match("pi-001", "pi-0011"));
    }

    #[test]
    fn test_prefix_wildcard() {
        assert!(glob_match("pi-*", "pi-001"));
        assert!(glob_match("pi-*", "pi-"));
        assert!(!glob_match("pi-*", "jb-001"));
    }

    #[test]
    fn test_suffix_wildcard() {
        assert!(glob_match("*-encoded", "payload-encoded"));
        assert!(glob_match("*-encoded", "-encoded"));
        assert!(!glob_match("*-encoded", "encoded"));
    }

    #[test]
    fn test_infix_wildcard() {
        assert!(glob_match("pi-*-beta", "pi-001-beta"));
        assert!(glob_match("pi-*-beta", "pi--beta"));
        assert!(!glob_match("pi-*-beta", "pi-001-gamma"));
    }

    #[test]
    fn test_multiple_wildcards() {
        assert!(glob_match("*-00*", "pi-001"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("*", ""));
    }

    #[test]
    fn test_last_segment_overlap() {
        // The end anchor must not reuse characters consumed by earlier
        // segments
        assert!(!glob_match("ab*b", "ab"));
        assert!(glob_match("ab*b", "ab-b"));
        assert!(glob_match("ab*b", "abb"));
    }

    #[test]
    fn test_any_match() {
        let patterns = ["pi-*", "enc-00*"];
        assert!(any_glob_match(patterns, "pi-004"));
        assert!(any_glob_match(patterns, "enc-001"));
        assert!(!any_glob_match(patterns, "jb-001"));
    }
}
