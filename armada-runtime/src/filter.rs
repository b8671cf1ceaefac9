//! Cluster input filter.
//!
//! Each target host is bound to one (account, region) and can only see the
//! clusters its credentials reach. The filter narrows the work items the
//! automation carries down to that scope, or fabricates items for every
//! visible cluster when a step runs without input.

use tracing::debug;

use armada_core::WorkItem;

/// Reduce `input_items` to the ones this host can act on.
///
/// With filtering on, an item survives iff its cluster is visible from this
/// host and its (account, region) match the host's identity; survivors keep
/// their input order. With filtering off the input is ignored and one
/// discovered item is synthesized per visible cluster.
pub fn relevant_items(
    filter_input: bool,
    valid_clusters: &[String],
    input_items: &[WorkItem],
    account_id: &str,
    region: &str,
) -> Vec<WorkItem> {
    let items: Vec<WorkItem> = if filter_input {
        input_items
            .iter()
            .filter(|item| {
                valid_clusters.iter().any(|c| c == &item.cluster_name)
                    && item.account_id == account_id
                    && item.region == region
            })
            .cloned()
            .collect()
    } else {
        valid_clusters
            .iter()
            .map(|cluster| WorkItem::discovered(account_id, region, cluster))
            .collect()
    };

    debug!(
        filter_input,
        visible = valid_clusters.len(),
        input = input_items.len(),
        relevant = items.len(),
        "resolved relevant clusters"
    );
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_core::{Action, Work};

    fn item(cluster: &str, account: &str, region: &str) -> WorkItem {
        WorkItem {
            account_id: account.to_string(),
            region: region.to_string(),
            cluster_name: cluster.to_string(),
            work: Work::Summary,
        }
    }

    fn clusters(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn keeps_only_items_in_scope() {
        let valid = clusters(&["a", "b"]);
        let input = vec![
            item("a", "111", "us-east-1"),
            item("c", "111", "us-east-1"),
            item("b", "222", "us-east-1"),
        ];

        let relevant = relevant_items(true, &valid, &input, "111", "us-east-1");
        assert_eq!(relevant.len(), 1);
        assert_eq!(relevant[0].cluster_name, "a");
    }

    #[test]
    fn survivors_keep_input_order() {
        let valid = clusters(&["b", "a"]);
        let input = vec![item("a", "111", "us-east-1"), item("b", "111", "us-east-1")];
        let relevant = relevant_items(true, &valid, &input, "111", "us-east-1");
        let names: Vec<&str> = relevant.iter().map(|i| i.cluster_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn without_filtering_every_visible_cluster_is_synthesized() {
        let valid = clusters(&["a", "b"]);
        let input = vec![item("ignored", "111", "us-east-1")];
        let relevant = relevant_items(false, &valid, &input, "111", "us-east-1");
        assert_eq!(relevant.len(), 2);
        assert!(relevant.iter().all(|i| i.action() == Action::Default));
        assert_eq!(relevant[0].account_id, "111");
    }

    #[test]
    fn foreign_region_items_are_dropped() {
        let valid = clusters(&["a"]);
        let input = vec![item("a", "111", "eu-west-1")];
        let relevant = relevant_items(true, &valid, &input, "111", "us-east-1");
        assert!(relevant.is_empty());
    }
}
