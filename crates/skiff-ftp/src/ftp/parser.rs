//! MLSD fact-line parsing (RFC 3659 §7).

use chrono::{DateTime, NaiveDateTime, Utc};
use skiff_core::{path, RemoteFile};
use std::collections::HashMap;

/// Parse a full MLSD listing body. `base` is the directory the listing
/// describes; entry paths are joined onto it. The `.`/`..` entries
/// (`cdir`/`pdir` facts or literal names) are skipped.
pub fn parse_mlsd_listing(body: &str, base: &str) -> Vec<RemoteFile> {
    body.lines()
        .filter_map(|line| parse_mlsd_line(line, base))
        .collect()
}

/// Parse one MLSD line: `fact=value;fact=value; name`.
/// Returns `None` for blank lines, dot entries, and lines without the
/// fact/name separator.
pub fn parse_mlsd_line(line: &str, base: &str) -> Option<RemoteFile> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return None;
    }
    let (facts_part, name) = line.split_once("; ")?;
    let name = name.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }

    let mut facts: HashMap<String, String> = HashMap::new();
    for fact in facts_part.split(';') {
        if let Some((key, value)) = fact.split_once('=') {
            facts.insert(key.to_ascii_lowercase(), value.to_string());
        }
    }

    let entry_type = facts
        .get("type")
        .map(|t| t.to_ascii_lowercase())
        .unwrap_or_default();
    if entry_type == "cdir" || entry_type == "pdir" {
        return None;
    }
    let is_dir = entry_type == "dir";

    let size = if is_dir {
        0
    } else {
        facts
            .get("size")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0)
    };

    let modified = facts.get("modify").and_then(|m| parse_mdtm_timestamp(m));

    Some(RemoteFile {
        name: name.to_string(),
        path: path::join(base, name),
        size,
        is_dir,
        modified,
        permissions: facts.get("perm").cloned().unwrap_or_default(),
        owner: facts.get("unix.owner").cloned().unwrap_or_default(),
        group: facts.get("unix.group").cloned().unwrap_or_default(),
    })
}

/// Parse a `YYYYMMDDHHMMSS` timestamp as used by the MDTM command and
/// the MLSD `modify` fact. Fractional seconds after the 14th digit are
/// ignored; malformed values yield `None`.
pub fn parse_mdtm_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let digits = value.trim();
    if digits.len() < 14 {
        return None;
    }
    NaiveDateTime::parse_from_str(&digits[..14], "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_file_entry() {
        let f =
            parse_mlsd_line("type=file;size=42;modify=20250101120000; report.txt", "/srv").unwrap();
        assert_eq!(f.name, "report.txt");
        assert_eq!(f.path, "/srv/report.txt");
        assert_eq!(f.size, 42);
        assert!(!f.is_dir);
        let m = f.modified.unwrap();
        assert_eq!((m.year(), m.month(), m.day()), (2025, 1, 1));
        assert_eq!((m.hour(), m.minute()), (12, 0));
    }

    #[test]
    fn parses_dir_entry_with_zero_size() {
        let f = parse_mlsd_line("type=dir;size=4096; uploads", "/").unwrap();
        assert!(f.is_dir);
        assert_eq!(f.size, 0);
        assert_eq!(f.path, "/uploads");
    }

    #[test]
    fn skips_cdir_pdir_and_dot_names() {
        assert!(parse_mlsd_line("type=cdir; .", "/").is_none());
        assert!(parse_mlsd_line("type=pdir; ..", "/").is_none());
        assert!(parse_mlsd_line("type=dir; .", "/").is_none());
    }

    #[test]
    fn missing_modify_gives_none() {
        let f = parse_mlsd_line("type=file;size=1; a.bin", "/").unwrap();
        assert!(f.modified.is_none());
    }

    #[test]
    fn malformed_modify_is_tolerated() {
        let f = parse_mlsd_line("type=file;modify=banana; a.bin", "/").unwrap();
        assert!(f.modified.is_none());
    }

    #[test]
    fn fractional_seconds_in_modify() {
        let m = parse_mdtm_timestamp("20250615083015.123").unwrap();
        assert_eq!(m.second(), 15);
    }

    #[test]
    fn listing_filters_and_collects() {
        let body = "type=cdir; .\r\ntype=pdir; ..\r\ntype=dir; sub\r\ntype=file;size=7; x\r\n";
        let entries = parse_mlsd_listing(body, "/home");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "sub");
        assert_eq!(entries[1].size, 7);
    }
}
