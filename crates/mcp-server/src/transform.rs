//! Transforms (spec §4.6, C6): functions over a list of components that
//! rewrite or mark each one. Applied by the dispatcher after accumulating
//! `list_*` results and before returning them, and on every `get_*` lookup.

use std::collections::HashSet;

use mcp_protocol::{ComponentMeta, VersionSpec};
use serde::{Deserialize, Serialize};

/// Include/exclude by tag set. Exclude dominates include when both match
/// (spec §4.6) — AND of include, set-difference of exclude (confirmed
/// against the original's `_mcp_list_*` filters, see `SPEC_FULL.md`).
#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    pub include: HashSet<String>,
    pub exclude: HashSet<String>,
}

impl TagFilter {
    pub fn passes(&self, tags: &HashSet<String>) -> bool {
        if tags.intersection(&self.exclude).next().is_some() {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.is_subset(tags)
    }
}

/// Sets `enabled` on matching components; later marks override earlier ones
/// (spec §4.6: "so session rules override global rules").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnabledMark {
    pub tag: Option<String>,
    pub name: Option<String>,
    pub enabled: bool,
}

impl EnabledMark {
    fn applies_to(&self, meta: &ComponentMeta) -> bool {
        let tag_matches = self.tag.as_ref().map(|t| meta.tags.contains(t)).unwrap_or(true);
        let name_matches = self.name.as_ref().map(|n| &meta.name == n).unwrap_or(true);
        tag_matches && name_matches
    }
}

/// Apply marks in order; the last mark that applies to a component wins.
pub fn apply_enabled_marks(meta: &mut ComponentMeta, marks: &[EnabledMark]) {
    for mark in marks {
        if mark.applies_to(meta) {
            meta.enabled = mark.enabled;
        }
    }
}

/// Hides components outside `[version_gte, version_lt)`; unversioned
/// components are exempt by policy (spec §4.6).
#[derive(Debug, Clone, Default)]
pub struct VersionFilter {
    pub spec: VersionSpec,
}

impl VersionFilter {
    pub fn passes(&self, version: &str) -> bool {
        version.is_empty() || self.spec.matches(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> HashSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exclude_dominates_include() {
        let filter = TagFilter { include: tags(&["public"]), exclude: tags(&["beta"]) };
        assert!(!filter.passes(&tags(&["public", "beta"])));
    }

    #[test]
    fn include_is_and_semantics() {
        let filter = TagFilter { include: tags(&["public", "stable"]), exclude: HashSet::new() };
        assert!(!filter.passes(&tags(&["public"])));
        assert!(filter.passes(&tags(&["public", "stable"])));
    }

    #[test]
    fn empty_filter_passes_everything() {
        let filter = TagFilter::default();
        assert!(filter.passes(&tags(&["anything"])));
    }

    #[test]
    fn later_enabled_mark_overrides_earlier() {
        let mut meta = ComponentMeta::new("tool").unwrap();
        let marks = vec![
            EnabledMark { tag: None, name: None, enabled: false },
            EnabledMark { tag: None, name: Some("tool".to_string()), enabled: true },
        ];
        apply_enabled_marks(&mut meta, &marks);
        assert!(meta.enabled);
    }

    #[test]
    fn version_filter_exempts_unversioned() {
        let filter = VersionFilter { spec: VersionSpec::range(Some("2.0".into()), None) };
        assert!(filter.passes(""));
        assert!(!filter.passes("1.0"));
        assert!(filter.passes("2.0"));
    }
}
