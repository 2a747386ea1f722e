//! Hierarchical serial formatting and validation.
//!
//! Serials are the human-facing identifiers that log, audit, and UI
//! consumers correlate on: `J<yyyy><seq4>` for a job, then one dotted
//! 4-digit segment per level (`J20250001.0001.0002.0001` is action 1 of
//! branch 2 of execution 1 of job `J20250001`). The paired UUID on each
//! row is the canonical key; the serial never changes once assigned.
//!
//! Sequence *allocation* is not done here — that is an atomic per-scope
//! increment in the database (`SerialRepo`). This module only formats and
//! inspects serials.

/// Width of every zero-padded sequence segment.
const SEQ_WIDTH: usize = 4;

/// Depth of a serial within the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialLevel {
    Job,
    Execution,
    Branch,
    Action,
}

/// Format a job serial: `J` + four-digit year + zero-padded sequence.
///
/// The year scoping means per-year sequences stay small and the serial
/// doubles as a rough creation date (`J20250042` = 42nd job of 2025).
pub fn job_serial(year: i32, seq: i64) -> String {
    format!("J{year}{seq:04}")
}

/// Format a child serial by appending a zero-padded sequence segment.
///
/// Used for execution, branch, and action levels alike.
pub fn child_serial(parent: &str, seq: i64) -> String {
    format!("{parent}.{seq:04}")
}

/// The sequence scope key for allocating children of `parent`.
///
/// Each parent serial owns an independent counter, so execution numbers
/// restart at 1 for every job, branch numbers for every execution, and so
/// on.
pub fn child_scope(parent: &str) -> String {
    format!("{parent}.children")
}

/// The sequence scope key for job serials in a given year.
pub fn job_scope(year: i32) -> String {
    format!("jobs.{year}")
}

/// Determine the hierarchy level of a serial, or `None` if malformed.
pub fn level(serial: &str) -> Option<SerialLevel> {
    if !is_well_formed(serial) {
        return None;
    }
    match serial.matches('.').count() {
        0 => Some(SerialLevel::Job),
        1 => Some(SerialLevel::Execution),
        2 => Some(SerialLevel::Branch),
        3 => Some(SerialLevel::Action),
        _ => None,
    }
}

/// Whether `child` is nested directly under `parent`
/// (exactly one additional segment).
pub fn is_direct_child(child: &str, parent: &str) -> bool {
    match child.strip_prefix(parent) {
        Some(rest) => {
            rest.len() == SEQ_WIDTH + 1
                && rest.starts_with('.')
                && rest[1..].bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// The immediate parent serial, or `None` for job-level serials.
pub fn parent(serial: &str) -> Option<&str> {
    serial.rfind('.').map(|idx| &serial[..idx])
}

/// Structural validation: `J` + 8 digits, then dot-separated 4-digit
/// segments, at most three levels deep.
pub fn is_well_formed(serial: &str) -> bool {
    let mut segments = serial.split('.');

    let head = match segments.next() {
        Some(h) => h,
        None => return false,
    };
    if head.len() != 9
        || !head.starts_with('J')
        || !head[1..].bytes().all(|b| b.is_ascii_digit())
    {
        return false;
    }

    let mut depth = 0;
    for seg in segments {
        depth += 1;
        if depth > 3 || seg.len() != SEQ_WIDTH || !seg.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_serial_is_year_scoped_and_padded() {
        assert_eq!(job_serial(2025, 1), "J20250001");
        assert_eq!(job_serial(2025, 42), "J20250042");
        assert_eq!(job_serial(2026, 1234), "J20261234");
    }

    #[test]
    fn child_serial_appends_padded_segment() {
        assert_eq!(child_serial("J20250001", 1), "J20250001.0001");
        assert_eq!(
            child_serial("J20250001.0001", 7),
            "J20250001.0001.0007"
        );
    }

    #[test]
    fn level_by_depth() {
        assert_eq!(level("J20250001"), Some(SerialLevel::Job));
        assert_eq!(level("J20250001.0001"), Some(SerialLevel::Execution));
        assert_eq!(level("J20250001.0001.0002"), Some(SerialLevel::Branch));
        assert_eq!(
            level("J20250001.0001.0002.0001"),
            Some(SerialLevel::Action)
        );
        assert_eq!(level("garbage"), None);
    }

    #[test]
    fn direct_child_requires_exactly_one_segment() {
        assert!(is_direct_child("J20250001.0001", "J20250001"));
        assert!(is_direct_child("J20250001.0001.0003", "J20250001.0001"));
        assert!(!is_direct_child("J20250001.0001.0003", "J20250001"));
        assert!(!is_direct_child("J20250001", "J20250001"));
        // Prefix match alone is not enough: segment must be numeric.
        assert!(!is_direct_child("J20250001.abcd", "J20250001"));
    }

    #[test]
    fn parent_strips_last_segment() {
        assert_eq!(parent("J20250001.0001.0002"), Some("J20250001.0001"));
        assert_eq!(parent("J20250001"), None);
    }

    #[test]
    fn well_formed_rejects_bad_shapes() {
        assert!(is_well_formed("J20250001"));
        assert!(is_well_formed("J20250001.0001.0001.0001"));
        assert!(!is_well_formed("X20250001"));
        assert!(!is_well_formed("J2025001")); // head too short
        assert!(!is_well_formed("J20250001.001")); // segment too short
        assert!(!is_well_formed("J20250001.0001.0001.0001.0001")); // too deep
    }

    #[test]
    fn scopes_are_distinct_per_parent() {
        assert_ne!(child_scope("J20250001"), child_scope("J20250002"));
        assert_ne!(job_scope(2025), job_scope(2026));
    }
}
