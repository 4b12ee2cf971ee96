use crate::error::PinsyncError;
use serde_json::{Map, Value};

const FORBIDDEN: [char; 6] = ['/', '.', '#', '$', '[', ']'];

/// Checks a single key. Keys are non-empty and free of `/ . # $ [ ]`.
pub fn validate_key(key: &str) -> Result<&str, PinsyncError> {
    if key.is_empty() || key.contains(FORBIDDEN) || key.chars().any(char::is_control) {
        return Err(PinsyncError::InvalidPath(format!("invalid key {key:?}")));
    }
    Ok(key)
}

/// Normalizes a `/`-separated path, rejecting empty or invalid segments.
pub fn normalize(path: &str) -> Result<String, PinsyncError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(PinsyncError::InvalidPath("empty path".to_string()));
    }
    for segment in trimmed.split('/') {
        validate_key(segment).map_err(|_| PinsyncError::InvalidPath(path.to_string()))?;
    }
    Ok(trimmed.to_string())
}

/// Joins already-validated segments.
pub fn join(segments: &[&str]) -> Result<String, PinsyncError> {
    for segment in segments {
        validate_key(segment)?;
    }
    Ok(segments.join("/"))
}

/// Strict ancestors of `path`, nearest last.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(idx, _)| &path[..idx])
}

/// True when a change at `changed` can alter the snapshot at `watched`.
pub fn overlaps(changed: &str, watched: &str) -> bool {
    is_within(changed, watched) || is_within(watched, changed)
}

/// `path` equals `root` or lies below it.
pub fn is_within(path: &str, root: &str) -> bool {
    path == root
        || (path.len() > root.len()
            && path.starts_with(root)
            && path.as_bytes()[root.len()] == b'/')
}

/// Flattens `value` into `(path, json)` leaves below `base`.
/// Nulls and empty objects produce no leaves.
pub fn flatten(base: &str, value: &Value, out: &mut Vec<(String, String)>) -> Result<(), PinsyncError> {
    match value {
        Value::Null => Ok(()),
        Value::Object(map) => {
            for (key, child) in map {
                validate_key(key)?;
                flatten(&format!("{base}/{key}"), child, out)?;
            }
            Ok(())
        }
        leaf => {
            out.push((base.to_string(), serde_json::to_string(leaf)?));
            Ok(())
        }
    }
}

/// Rebuilds the object rooted at `base` from its descendant leaves.
pub fn assemble(base: &str, leaves: Vec<(String, Value)>) -> Value {
    let mut root = Map::new();
    for (path, value) in leaves {
        let Some(relative) = path
            .strip_prefix(base)
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            continue;
        };
        insert(&mut root, relative, value);
    }
    Value::Object(root)
}

fn insert(node: &mut Map<String, Value>, relative: &str, value: Value) {
    match relative.split_once('/') {
        None => {
            node.insert(relative.to_string(), value);
        }
        Some((head, rest)) => {
            let child = node
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert(map, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_reserved_characters() {
        assert!(normalize("users/u1/accounts").is_ok());
        assert!(normalize("/users/u1/").is_ok());
        assert!(normalize("users//accounts").is_err());
        assert!(normalize("users/a.b").is_err());
        assert!(normalize("users/$x").is_err());
        assert!(normalize("").is_err());
        assert!(validate_key("a[0]").is_err());
    }

    #[test]
    fn overlap_is_segment_aware() {
        assert!(overlaps("users/u1/boards/a", "users/u1/boards"));
        assert!(overlaps("users/u1", "users/u1/boards"));
        assert!(overlaps("users/u1/boards", "users/u1/boards"));
        assert!(!overlaps("users/u1/boards2", "users/u1/boards"));
        assert!(!overlaps("users/u1/accounts", "users/u1/boards"));
    }

    #[test]
    fn ancestors_are_strict_prefixes() {
        let found: Vec<_> = ancestors("users/u1/boards/a").collect();
        assert_eq!(found, vec!["users", "users/u1", "users/u1/boards"]);
    }

    #[test]
    fn flatten_then_assemble_restores_objects() {
        let value = json!({
            "alice": {"user": {"username": "alice"}, "lastRefreshed": 1},
            "bob": [1, 2],
            "gone": null,
            "empty": {}
        });
        let mut leaves = Vec::new();
        flatten("root", &value, &mut leaves).unwrap();
        assert_eq!(leaves.len(), 3);

        let parsed = leaves
            .into_iter()
            .map(|(p, v)| (p, serde_json::from_str(&v).unwrap()))
            .collect();
        let rebuilt = assemble("root", parsed);
        assert_eq!(
            rebuilt,
            json!({
                "alice": {"user": {"username": "alice"}, "lastRefreshed": 1},
                "bob": [1, 2]
            })
        );
    }

    #[test]
    fn flatten_rejects_bad_child_keys() {
        let mut leaves = Vec::new();
        let err = flatten("root", &json!({"a.b": 1}), &mut leaves);
        assert!(matches!(err, Err(PinsyncError::InvalidPath(_))));
    }
}
