use std::collections::BTreeMap;
use std::sync::Arc;

use super::types::SeriesConfig;

/// Series grouped by remote source id.
///
/// Built once before dispatch and never mutated afterwards; every
/// concurrent worker shares the same read-only map.
#[derive(Debug, Clone, Default)]
pub struct SourceGroups {
    groups: Arc<BTreeMap<i64, Vec<SeriesConfig>>>,
}

impl SourceGroups {
    /// Source ids in ascending order.
    pub fn source_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.groups.keys().copied()
    }

    /// Series of one source, in configuration order.
    pub fn series(&self, source_id: i64) -> &[SeriesConfig] {
        self.groups
            .get(&source_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn series_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

/// Group a flat series list by source id, preserving order within a group.
pub fn group_by_source(series: &[SeriesConfig]) -> SourceGroups {
    let mut groups: BTreeMap<i64, Vec<SeriesConfig>> = BTreeMap::new();
    for entry in series {
        groups
            .entry(entry.source_id)
            .or_default()
            .push(entry.clone());
    }

    SourceGroups {
        groups: Arc::new(groups),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(title: &str, source_id: i64) -> SeriesConfig {
        SeriesConfig {
            title: title.to_string(),
            url: format!("/{}", title.to_lowercase()),
            source_id,
            extension_package: format!("pkg.{}", source_id),
        }
    }

    #[test]
    fn test_group_by_source() {
        let list = vec![
            series("A", 2),
            series("B", 1),
            series("C", 2),
            series("D", 3),
        ];

        let groups = group_by_source(&list);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups.series_count(), 4);
        assert_eq!(groups.source_ids().collect::<Vec<_>>(), vec![1, 2, 3]);

        let titles: Vec<&str> = groups.series(2).iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
    }

    #[test]
    fn test_unknown_source_is_empty() {
        let groups = group_by_source(&[series("A", 1)]);
        assert!(groups.series(99).is_empty());
    }

    #[test]
    fn test_empty_list() {
        let groups = group_by_source(&[]);
        assert!(groups.is_empty());
        assert_eq!(groups.series_count(), 0);
    }
}
