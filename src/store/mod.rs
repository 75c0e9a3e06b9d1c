//! Transport layer for the shared real-time document store.

/// Storage error definitions shared by every backend.
pub mod error;
/// In-memory backend used by tests and single-process deployments.
pub mod memory;
/// REST adapter for a real-time-database style document tree.
#[cfg(feature = "rtdb-store")]
pub mod rtdb;

use futures::{future::BoxFuture, stream::BoxStream};
use serde_json::{Map, Value};

use crate::store::error::StorageResult;

pub use memory::MemoryStore;

/// Subpath/value pairs applied to one document in a single write.
pub type FieldUpdates = Vec<(String, Value)>;

/// Abstraction over the shared real-time document store.
///
/// Paths are slash-separated (`matches/AB12CD`); subpaths inside
/// [`MatchStore::update_fields`] address nested fields the same way
/// (`team_a/players/ana/score`). A single `update_fields` call is applied
/// atomically to its document and observed as one snapshot by subscribers, in
/// the order the store commits writes. No ordering is guaranteed across
/// different documents.
pub trait MatchStore: Send + Sync {
    /// Create (or replace) the document at `path`.
    fn create_document(&self, path: &str, value: Value) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch the document at `path`, `None` when absent.
    fn get_document(&self, path: &str) -> BoxFuture<'static, StorageResult<Option<Value>>>;
    /// Apply a partial multi-field write to the document at `path`.
    fn update_fields(
        &self,
        path: &str,
        updates: FieldUpdates,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Subscribe to the document at `path`; yields a full snapshot per commit.
    fn subscribe(&self, path: &str) -> BoxFuture<'static, StorageResult<BoxStream<'static, Value>>>;
    /// Tear down the feed for `path`, ending every stream subscribed to it.
    fn unsubscribe(&self, path: &str) -> BoxFuture<'static, StorageResult<()>>;
}

/// Write `value` at a slash-separated `path` inside a JSON tree, creating
/// intermediate objects as needed.
pub(crate) fn write_at_path(root: &mut Value, path: &str, value: Value) {
    fn write(node: &mut Value, segments: &[&str], value: Value) {
        let Some((head, rest)) = segments.split_first() else {
            *node = value;
            return;
        };
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        if let Value::Object(map) = node {
            let child = map.entry((*head).to_string()).or_insert(Value::Null);
            write(child, rest, value);
        }
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    write(root, &segments, value);
}

/// Remove the node at a slash-separated `path`, if present.
pub(crate) fn remove_at_path(root: &mut Value, path: &str) {
    fn remove(node: &mut Value, segments: &[&str]) {
        let Some((head, rest)) = segments.split_first() else {
            return;
        };
        let Value::Object(map) = node else {
            return;
        };
        if rest.is_empty() {
            map.remove(*head);
        } else if let Some(child) = map.get_mut(*head) {
            remove(child, rest);
        }
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    remove(root, &segments);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn write_creates_intermediate_objects() {
        let mut root = Value::Null;
        write_at_path(&mut root, "team_a/players/ana/score", json!(10));
        assert_eq!(root, json!({"team_a": {"players": {"ana": {"score": 10}}}}));
    }

    #[test]
    fn write_replaces_existing_leaves() {
        let mut root = json!({"started": false, "team_a": {"name": "Lions"}});
        write_at_path(&mut root, "started", json!(true));
        write_at_path(&mut root, "team_a/name", json!("Hawks"));
        assert_eq!(root, json!({"started": true, "team_a": {"name": "Hawks"}}));
    }

    #[test]
    fn empty_path_replaces_the_root() {
        let mut root = json!({"a": 1});
        write_at_path(&mut root, "", json!({"b": 2}));
        assert_eq!(root, json!({"b": 2}));
    }

    #[test]
    fn remove_deletes_only_the_addressed_node() {
        let mut root = json!({"team_a": {"players": {"ana": {"score": 10}, "zoe": {"score": 0}}}});
        remove_at_path(&mut root, "team_a/players/ana");
        assert_eq!(root, json!({"team_a": {"players": {"zoe": {"score": 0}}}}));
    }

    #[test]
    fn remove_missing_path_is_a_no_op() {
        let mut root = json!({"a": 1});
        remove_at_path(&mut root, "b/c");
        assert_eq!(root, json!({"a": 1}));
    }
}
