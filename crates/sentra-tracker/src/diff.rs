//! Delta computation against a previous change mark.

use crate::mark::{ChangeMark, UnitState};
use tracing::debug;

/// Result of diffing observed units against a previous mark.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    /// Ids of units that changed since the previous mark
    pub changed: Vec<String>,
    /// The mark to commit once the phase that consumed this diff completes
    pub new_mark: ChangeMark,
}

impl ChangeSet {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Compute which units changed since `previous`.
///
/// Units carrying a timestamp compare against the mark's cursor; units
/// carrying a digest compare against the stored digest for their id. An
/// empty previous mark reports every unit as changed (first scan).
///
/// The returned mark reflects the observed state (newest timestamp, all
/// current digests) plus the schema carried over from `previous`. Callers
/// must only persist it after the consuming phase commits.
#[must_use]
pub fn diff(units: &[UnitState], previous: &ChangeMark) -> ChangeSet {
    let mut changed = Vec::new();
    let mut new_mark = ChangeMark {
        cursor: previous.cursor,
        digests: std::collections::BTreeMap::new(),
        schema: previous.schema.clone(),
    };

    for unit in units {
        match (&unit.updated_at, &unit.digest) {
            (Some(updated_at), _) => {
                let is_new = previous.cursor.map_or(true, |cursor| *updated_at > cursor);
                if is_new {
                    changed.push(unit.id.clone());
                }
                if new_mark.cursor.map_or(true, |c| *updated_at > c) {
                    new_mark.cursor = Some(*updated_at);
                }
            }
            (None, Some(digest)) => {
                let is_new = previous.digests.get(&unit.id) != Some(digest);
                if is_new {
                    changed.push(unit.id.clone());
                }
                new_mark.digests.insert(unit.id.clone(), digest.clone());
            }
            (None, None) => {
                // Nothing to compare on: treat as changed so it is never
                // silently skipped.
                changed.push(unit.id.clone());
            }
        }
    }

    debug!(
        total = units.len(),
        changed = changed.len(),
        "computed change set"
    );

    ChangeSet { changed, new_mark }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mark::digest_bytes;
    use sentra_core::Timestamp;

    fn ts(s: &str) -> Timestamp {
        Timestamp::from_rfc3339(s).expect("valid timestamp")
    }

    #[test]
    fn test_first_scan_everything_changed() {
        let units = vec![
            UnitState::with_timestamp("row-1", ts("2026-01-10T00:00:00Z")),
            UnitState::with_content("file-a", b"content"),
        ];

        let set = diff(&units, &ChangeMark::empty());
        assert_eq!(set.changed, vec!["row-1", "file-a"]);
    }

    #[test]
    fn test_timestamp_cursor_filters_unchanged() {
        // 1,000 rows, 3 modified since the previous mark
        let cursor = ts("2026-01-15T00:00:00Z");
        let mut units: Vec<UnitState> = (0..997)
            .map(|i| UnitState::with_timestamp(format!("row-{i}"), ts("2026-01-14T00:00:00Z")))
            .collect();
        units.push(UnitState::with_timestamp("row-a", ts("2026-01-16T08:00:00Z")));
        units.push(UnitState::with_timestamp("row-b", ts("2026-01-16T09:00:00Z")));
        units.push(UnitState::with_timestamp("row-c", ts("2026-01-16T10:00:00Z")));

        let previous = ChangeMark {
            cursor: Some(cursor),
            ..ChangeMark::empty()
        };

        let set = diff(&units, &previous);
        assert_eq!(set.changed, vec!["row-a", "row-b", "row-c"]);
        // New cursor reflects the latest observed timestamp
        assert_eq!(set.new_mark.cursor, Some(ts("2026-01-16T10:00:00Z")));
    }

    #[test]
    fn test_digest_comparison() {
        let previous_mark = {
            let mut mark = ChangeMark::empty();
            mark.digests
                .insert("a.txt".to_string(), digest_bytes(b"old content"));
            mark.digests
                .insert("b.txt".to_string(), digest_bytes(b"stable content"));
            mark
        };

        let units = vec![
            UnitState::with_content("a.txt", b"new content"),
            UnitState::with_content("b.txt", b"stable content"),
            UnitState::with_content("c.txt", b"brand new file"),
        ];

        let set = diff(&units, &previous_mark);
        assert_eq!(set.changed, vec!["a.txt", "c.txt"]);
        assert_eq!(set.new_mark.digests.len(), 3);
    }

    #[test]
    fn test_no_changes_empty_set() {
        let units = vec![UnitState::with_content("a.txt", b"same")];
        let previous = {
            let mut mark = ChangeMark::empty();
            mark.digests
                .insert("a.txt".to_string(), digest_bytes(b"same"));
            mark
        };

        let set = diff(&units, &previous);
        assert!(set.is_empty());
    }

    #[test]
    fn test_cursor_never_moves_backwards() {
        let previous = ChangeMark {
            cursor: Some(ts("2026-02-01T00:00:00Z")),
            ..ChangeMark::empty()
        };
        // All rows older than the cursor
        let units = vec![UnitState::with_timestamp("row-1", ts("2026-01-01T00:00:00Z"))];

        let set = diff(&units, &previous);
        assert!(set.is_empty());
        assert_eq!(set.new_mark.cursor, Some(ts("2026-02-01T00:00:00Z")));
    }

    #[test]
    fn test_schema_carried_over() {
        let mut previous = ChangeMark::empty();
        let mut schema = crate::mark::SchemaSnapshot::default();
        schema.add_container("employees", vec![]);
        previous.schema = Some(schema.clone());

        let set = diff(&[], &previous);
        assert_eq!(set.new_mark.schema, Some(schema));
    }
}
