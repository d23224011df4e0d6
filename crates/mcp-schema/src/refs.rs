use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

const SOURCE_PREFIX: &str = "#/components/schemas/";
const TARGET_PREFIX: &str = "#/$defs/";

/// Implements spec §4.1.1: rewrite `#/components/schemas/X` references to
/// `#/$defs/X`, pull in every definition transitively reachable from the
/// root (through `anyOf`/`allOf`/`oneOf`, `items`, `properties`,
/// `additionalProperties`, and `content` maps), drop anything unreachable,
/// and do it without sharing mutable state between calls — every returned
/// `Value` is a fresh tree, so two rewrites of the same input never alias
/// each other's `$defs`.
///
/// `schema` is the root schema as it appears before compression; `defs` is
/// the full source definitions map (an OpenAPI or other host document's
/// `components.schemas`). Circular references are handled by
/// tracking which definitions have already been queued for inclusion,
/// rather than by re-walking an already-visited definition.
pub fn compress_refs(schema: &Value, defs: &Map<String, Value>) -> Value {
    let mut included: HashSet<String> = HashSet::new();
    let mut pending: Vec<String> = Vec::new();

    let rewritten_root = rewrite_refs(schema, &mut pending);
    let mut queue = pending;
    let mut resolved_defs: HashMap<String, Value> = HashMap::new();

    while let Some(name) = queue.pop() {
        if included.contains(&name) {
            continue;
        }
        included.insert(name.clone());
        let Some(def) = defs.get(&name) else { continue };
        let mut nested_pending = Vec::new();
        let rewritten_def = rewrite_refs(def, &mut nested_pending);
        resolved_defs.insert(name, rewritten_def);
        for nested in nested_pending {
            if !included.contains(&nested) {
                queue.push(nested);
            }
        }
    }

    if resolved_defs.is_empty() {
        return prune_title(rewritten_root);
    }

    let mut result = prune_title(rewritten_root);
    let mut defs_map = Map::new();
    let mut names: Vec<&String> = resolved_defs.keys().collect();
    names.sort();
    for name in names {
        defs_map.insert(name.clone(), prune_title(resolved_defs[name].clone()));
    }
    if let Value::Object(map) = &mut result {
        map.insert("$defs".to_string(), Value::Object(defs_map));
    }
    result
}

/// Deep-clones `node`, rewriting any `#/components/schemas/X` string found
/// under a `$ref` key to `#/$defs/X` and recording `X` in `discovered` so
/// the caller can pull its definition in. Every other value is copied, not
/// shared, by construction (`Value` clones are independent trees in
/// `serde_json`).
fn rewrite_refs(node: &Value, discovered: &mut Vec<String>) -> Value {
    match node {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                if key == "$ref" {
                    if let Value::String(s) = value {
                        if let Some(name) = s.strip_prefix(SOURCE_PREFIX) {
                            discovered.push(name.to_string());
                            out.insert(key.clone(), Value::String(format!("{TARGET_PREFIX}{name}")));
                            continue;
                        }
                    }
                    out.insert(key.clone(), value.clone());
                    continue;
                }
                out.insert(key.clone(), rewrite_refs(value, discovered));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| rewrite_refs(item, discovered)).collect())
        }
        other => other.clone(),
    }
}

fn prune_title(mut node: Value) -> Value {
    if let Value::Object(map) = &mut node {
        map.remove("title");
        for value in map.values_mut() {
            let pruned = prune_title(std::mem::take(value));
            *value = pruned;
        }
    } else if let Value::Array(items) = &mut node {
        for item in items.iter_mut() {
            let pruned = prune_title(std::mem::take(item));
            *item = pruned;
        }
    }
    node
}
