//! Version banner parsing
//!
//! Banners look like `<name> <version> (<commit>[, <buildtype>][, <platform>])`,
//! e.g. `stacks-node 2.5.0.0.0 (master:abc123, release, linux [x86_64])`.
//! Each field is extracted independently; a field that cannot be found stays
//! [`UNKNOWN`](crate::types::UNKNOWN).

use crate::types::ParsedVersion;

/// Parse a raw version banner into its structured fields
pub fn parse_version(raw: &str) -> ParsedVersion {
    let mut parsed = ParsedVersion::default();

    if let Some(number) = version_number(raw) {
        parsed.version_number = number.to_string();
    }

    let Some(inner) = parenthetical(raw) else {
        return parsed;
    };

    let segments: Vec<&str> = inner.split(',').map(str::trim).collect();

    if let Some(commit) = segments.first().and_then(|s| commit_hash(s)) {
        parsed.commit_hash = commit.to_string();
    }

    let mut build_type = None;
    let mut platform = None;
    for segment in segments.iter().skip(1) {
        let lower = segment.to_ascii_lowercase();
        if build_type.is_none() && (lower.contains("release") || lower.contains("debug")) {
            build_type = Some(*segment);
        }
        if platform.is_none() && (segment.contains('[') || segment.contains(']')) {
            platform = Some(*segment);
        }
    }

    if let Some(build_type) = build_type {
        parsed.build_type = build_type.to_string();
    }
    if let Some(platform) = platform {
        parsed.platform = platform.to_string();
    }

    parsed
}

/// First whitespace token starting with a digit, cut at an attached `(`
fn version_number(raw: &str) -> Option<&str> {
    let token = raw
        .split_whitespace()
        .find(|t| t.starts_with(|c: char| c.is_ascii_digit()))?;
    let number = token.split('(').next().unwrap_or(token).trim_end_matches(',');
    (!number.is_empty()).then_some(number)
}

/// Content of the first parenthesised group (to the last `)` or end of input)
fn parenthetical(raw: &str) -> Option<&str> {
    let start = raw.find('(')? + 1;
    let rest = &raw[start..];
    let end = rest.rfind(')').unwrap_or(rest.len());
    let inner = rest[..end].trim();
    (!inner.is_empty()).then_some(inner)
}

/// Commit segment with an optional `branch:` prefix removed
fn commit_hash(segment: &str) -> Option<&str> {
    let commit = match segment.split_once(':') {
        Some((_, hash)) => hash.trim(),
        None => segment,
    };
    (!commit.is_empty()).then_some(commit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNKNOWN;

    #[test]
    fn test_full_banner() {
        let parsed = parse_version("stacks-node 2.5.0.0.0 (master:abc123, release, linux [x86_64])");
        assert_eq!(parsed.version_number, "2.5.0.0.0");
        assert_eq!(parsed.commit_hash, "abc123");
        assert!(parsed.build_type.contains("release"));
        assert!(parsed.platform.contains("[x86_64]"));
    }

    #[test]
    fn test_commit_without_branch() {
        let parsed = parse_version("stacks-node 3.3.0.0.3 (6048975+, release build, linux [x86_64])");
        assert_eq!(parsed.version_number, "3.3.0.0.3");
        assert_eq!(parsed.commit_hash, "6048975+");
        assert_eq!(parsed.build_type, "release build");
        assert_eq!(parsed.platform, "linux [x86_64]");
    }

    #[test]
    fn test_debug_build() {
        let parsed = parse_version("stacks-node 2.4.0.1.0 (develop:ffee11, DEBUG build, macos [aarch64])");
        assert_eq!(parsed.build_type, "DEBUG build");
        assert_eq!(parsed.platform, "macos [aarch64]");
    }

    #[test]
    fn test_attached_parenthesis() {
        let parsed = parse_version("stacks-node 2.1(master:0a1b2c)");
        assert_eq!(parsed.version_number, "2.1");
        assert_eq!(parsed.commit_hash, "0a1b2c");
        assert_eq!(parsed.build_type, UNKNOWN);
    }

    #[test]
    fn test_missing_parenthetical() {
        let parsed = parse_version("stacks-node 2.05.0.6.0");
        assert_eq!(parsed.version_number, "2.05.0.6.0");
        assert_eq!(parsed.commit_hash, UNKNOWN);
        assert_eq!(parsed.platform, UNKNOWN);
    }

    #[test]
    fn test_unparseable_banners() {
        assert_eq!(parse_version(""), ParsedVersion::default());
        assert_eq!(parse_version("garbage"), ParsedVersion::default());
        assert_eq!(parse_version("stacks-node ()"), ParsedVersion::default());
    }
}
