//! Keyed merge of fresh submissions into the cache.

use pulse_core::models::SubmissionsByEmail;

/// What a merge changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Entries appended.
    pub added: usize,
    /// Entries overwritten in place.
    pub updated: usize,
}

/// Merge `delta` into `cache`.
///
/// Within one email, an entry with the same (form, conversion id) replaces the
/// existing one at its current position; anything else is appended.
pub fn merge(cache: &mut SubmissionsByEmail, delta: SubmissionsByEmail) -> MergeStats {
    let mut stats = MergeStats::default();
    for (email, entries) in delta {
        let existing = cache.entry(email).or_default();
        for entry in entries {
            match existing.iter().position(|e| e.key() == entry.key()) {
                Some(pos) => {
                    existing[pos] = entry;
                    stats.updated += 1;
                }
                None => {
                    existing.push(entry);
                    stats.added += 1;
                }
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use pulse_core::models::FormSubmissionEntry;

    use super::*;

    fn entry(form: &str, conversion: &str, ts: i64) -> FormSubmissionEntry {
        FormSubmissionEntry {
            form_name: format!("{form} name"),
            form_guid: form.into(),
            submitted_at: Some(ts),
            page_url: None,
            conversion_id: Some(conversion.into()),
            values: Vec::new(),
        }
    }

    fn by_email(rows: &[(&str, FormSubmissionEntry)]) -> SubmissionsByEmail {
        let mut map = SubmissionsByEmail::new();
        for (email, e) in rows {
            map.entry((*email).to_string()).or_default().push(e.clone());
        }
        map
    }

    type Row = (String, Option<String>, Option<i64>);

    fn summary(map: &SubmissionsByEmail, email: &str) -> Vec<Row> {
        map[email]
            .iter()
            .map(|e| (e.form_guid.clone(), e.conversion_id.clone(), e.submitted_at))
            .collect()
    }

    #[test]
    fn overwrite_in_place_then_append() {
        let mut cache = by_email(&[("a@x.com", entry("F1", "C1", 100))]);
        let delta = by_email(&[
            ("a@x.com", entry("F1", "C1", 200)),
            ("a@x.com", entry("F1", "C2", 300)),
        ]);
        let stats = merge(&mut cache, delta);

        assert_eq!(stats, MergeStats { added: 1, updated: 1 });
        assert_eq!(
            summary(&cache, "a@x.com"),
            vec![
                ("F1".into(), Some("C1".into()), Some(200)),
                ("F1".into(), Some("C2".into()), Some(300)),
            ]
        );
    }

    #[test]
    fn overwritten_slot_keeps_its_position() {
        let mut cache = by_email(&[
            ("a@x.com", entry("F1", "C1", 100)),
            ("a@x.com", entry("F2", "C9", 150)),
        ]);
        let _ = merge(&mut cache, by_email(&[("a@x.com", entry("F1", "C1", 500))]));
        assert_eq!(cache["a@x.com"][0].submitted_at, Some(500));
        assert_eq!(cache["a@x.com"][1].form_guid, "F2");
    }

    #[test]
    fn same_conversion_on_another_form_is_distinct() {
        let mut cache = by_email(&[("a@x.com", entry("F1", "C1", 100))]);
        let stats = merge(&mut cache, by_email(&[("a@x.com", entry("F2", "C1", 100))]));
        assert_eq!(stats.added, 1);
        assert_eq!(cache["a@x.com"].len(), 2);
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let base = by_email(&[("a@x.com", entry("F1", "C1", 100))]);
        let delta = by_email(&[
            ("a@x.com", entry("F1", "C1", 200)),
            ("b@x.com", entry("F1", "C3", 250)),
        ]);

        let mut once = base.clone();
        let _ = merge(&mut once, delta.clone());
        let mut twice = once.clone();
        let stats = merge(&mut twice, delta);

        assert_eq!(once, twice);
        assert_eq!(stats, MergeStats { added: 0, updated: 2 });
    }

    #[test]
    fn disjoint_deltas_commute() {
        let base = by_email(&[("a@x.com", entry("F1", "C1", 100))]);
        let a = by_email(&[
            ("a@x.com", entry("F1", "C2", 200)),
            ("b@x.com", entry("F2", "C3", 300)),
        ]);
        let b = by_email(&[
            ("a@x.com", entry("F2", "C4", 400)),
            ("c@x.com", entry("F1", "C5", 500)),
        ]);

        let mut ab = base.clone();
        let _ = merge(&mut ab, a.clone());
        let _ = merge(&mut ab, b.clone());
        let mut ba = base;
        let _ = merge(&mut ba, b);
        let _ = merge(&mut ba, a);

        // Same entries per email; append order follows merge order.
        let sorted = |map: &SubmissionsByEmail| {
            map.iter()
                .map(|(email, entries)| {
                    let mut keys: Vec<_> = entries
                        .iter()
                        .map(|e| (e.form_guid.clone(), e.conversion_id.clone(), e.submitted_at))
                        .collect();
                    keys.sort();
                    (email.clone(), keys)
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(sorted(&ab), sorted(&ba));
    }

    #[test]
    fn missing_conversion_ids_collide_within_a_form() {
        let mut untracked = entry("F1", "x", 100);
        untracked.conversion_id = None;
        let mut cache = by_email(&[("a@x.com", untracked.clone())]);
        untracked.submitted_at = Some(200);
        let stats = merge(&mut cache, by_email(&[("a@x.com", untracked)]));
        assert_eq!(stats, MergeStats { added: 0, updated: 1 });
        assert_eq!(cache["a@x.com"][0].submitted_at, Some(200));
    }

    #[test]
    fn empty_delta_changes_nothing() {
        let mut cache = by_email(&[("a@x.com", entry("F1", "C1", 100))]);
        let before = cache.clone();
        assert_eq!(merge(&mut cache, SubmissionsByEmail::new()), MergeStats::default());
        assert_eq!(cache, before);
    }
}
