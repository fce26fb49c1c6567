//! Mutator: compiles SET clauses into JSON-Patch operations.
//!
//! Patch paths are built with [`jsonptr::PointerBuf`], which already
//! implements the `~0`/`~1` escape rule for `~` and `/` in a raw token,
//! leaving literal dots untouched — exactly the escaping the map-key branch
//! needs, so there is nothing bespoke to hand-roll here.

use jsonptr::PointerBuf;
use json_patch::{AddOperation, PatchOperation, TestOperation};
use qgraph_ast::{RelationshipRule, Resource, SetItem};
use serde_json::{json, Value};

use crate::errors::EngineErrorKind;
use crate::jsonpath::{self, Step};
use crate::prelude::*;

fn token(step: &Step) -> String {
    match step {
        Step::Key(k) => k.clone(),
        Step::Index(i) => i.to_string(),
        Step::Wildcard => unreachable!("wildcards are expanded before pointer construction"),
    }
}

fn pointer_of(steps: &[Step]) -> PointerBuf {
    PointerBuf::from_tokens(steps.iter().map(token))
}

/// `spec.template.spec.containers[N].<...>` is a compatibility knob: the
/// `test` op against an empty-array value at `.../containers` is the signal
/// the provider uses to prefer a strategic-merge patch over plain JSON-Patch
/// for container-shaped resources.
fn is_container_path(steps: &[Step]) -> bool {
    matches!(
        steps,
        [Step::Key(a), Step::Key(b), Step::Key(c), Step::Key(d), Step::Index(_), ..]
            if a == "spec" && b == "template" && c == "spec" && d == "containers"
    )
}

fn container_ops(steps: &[Step], value: Value) -> Vec<PatchOperation> {
    vec![
        PatchOperation::Test(TestOperation {
            path: pointer_of(&steps[..4]),
            value: json!([]),
        }),
        PatchOperation::Add(AddOperation {
            path: pointer_of(steps),
            value,
        }),
    ]
}

fn plain_ops(steps: &[Step], value: Value) -> Vec<PatchOperation> {
    if is_container_path(steps) {
        container_ops(steps, value)
    } else {
        vec![PatchOperation::Add(AddOperation {
            path: pointer_of(steps),
            value,
        })]
    }
}

/// `metadata.annotations.argoproj\.io/tracking-id = "abc"` style paths: the
/// final path part still carries its literal dot/slash (escaping only ever
/// repaired `.`-splitting, never removed the character), so it is a single
/// map key rather than another structural step. A `test` against the parent
/// map existing, then an `add` at `<parent>/<key>` — this is also exactly
/// what `spec.metadata.annotations`/`labels` ask for, so there is no separate
/// branch for those two fields.
fn map_key_ops(parent: &[Step], key: &str, value: Value) -> Vec<PatchOperation> {
    let parent_pointer = pointer_of(parent);
    let mut key_tokens: Vec<String> = parent.iter().map(token).collect();
    key_tokens.push(key.to_string());
    vec![
        PatchOperation::Test(TestOperation {
            path: parent_pointer,
            value: json!({}),
        }),
        PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(key_tokens),
            value,
        }),
    ]
}

/// Resolves every `[*]` in `steps`, one array at a time, against `root`,
/// yielding the concrete index-bound step lists it expands to. Each branch is
/// resolved against the same (unmodified) `root`: wildcards describe a set of
/// sibling targets, not a moving cursor.
fn expand_wildcards(steps: &[Step], root: &Value) -> Result<Vec<Vec<Step>>> {
    let Some(pos) = steps.iter().position(|s| matches!(s, Step::Wildcard)) else {
        return Ok(vec![steps.to_vec()]);
    };
    let prefix = &steps[..pos];
    let suffix = &steps[pos + 1..];
    let Some(Value::Array(items)) = jsonpath::resolve(root, prefix).into_iter().next() else {
        return Err(EngineErrorKind::PathInvalid(
            "SET wildcard target is not an array".to_string(),
        )
        .into());
    };

    let mut branches = Vec::new();
    for i in 0..items.len() {
        let mut combined: Vec<Step> = prefix.to_vec();
        combined.push(Step::Index(i));
        combined.extend_from_slice(suffix);
        branches.extend(expand_wildcards(&combined, root)?);
    }
    Ok(branches)
}

/// True for any path naming a key under `metadata.annotations` or
/// `metadata.labels` — the spec's second, independent map-key special case,
/// which applies to a plain key (`metadata.labels.env`) just as much as one
/// containing a literal dot/slash.
fn is_annotations_or_labels_key(parts: &[String]) -> bool {
    parts.len() >= 3
        && parts[0] == "metadata"
        && (parts[1] == "annotations" || parts[1] == "labels")
}

/// Compiles one `SET` item into the JSON-Patch operations that apply it.
/// `resource` is the bound value the path is relative to — only consulted
/// to size `[*]` expansions.
pub fn compile_set_item(item: &SetItem, resource: &Resource) -> Result<Vec<PatchOperation>> {
    let parts = &item.path_parts;
    let Some(last) = parts.last() else {
        return Err(EngineErrorKind::PathInvalid("empty SET path".to_string()).into());
    };

    if last.contains('.') || last.contains('/') || is_annotations_or_labels_key(parts) {
        let parent_steps: Vec<Step> = parts[..parts.len() - 1]
            .iter()
            .flat_map(|p| jsonpath::compile(p))
            .collect();
        return Ok(map_key_ops(&parent_steps, last, item.value.clone()));
    }

    let steps: Vec<Step> = parts.iter().flat_map(|p| jsonpath::compile(p)).collect();
    let branches = expand_wildcards(&steps, resource.as_value())?;
    Ok(branches
        .into_iter()
        .flat_map(|b| plain_ops(&b, item.value.clone()))
        .collect())
}

/// Best-effort mirror of a `SET` onto an in-memory resource copy after the
/// provider patch succeeds. Only plain key paths are applied;
/// array-index creation is not attempted (the provider, not this engine, is
/// the source of truth for shape the patch didn't already assume existed).
pub fn apply_in_memory(resource: &mut Resource, item: &SetItem) {
    let mut current = resource.as_value_mut();
    let parts = &item.path_parts;
    for (i, part) in parts.iter().enumerate() {
        let is_last = i == parts.len() - 1;
        if !current.is_object() {
            *current = json!({});
        }
        let map = current.as_object_mut().expect("ensured object above");
        if is_last {
            map.insert(part.clone(), item.value.clone());
            return;
        }
        current = map.entry(part.clone()).or_insert_with(|| json!({}));
    }
}

/// Fills in a CREATE body's referenced fields from any relationship rule
/// involving `kind`, when the field is absent — the `default_props` half of
/// `RelationshipRule`/`MatchCriterion` (§3's "default property": "a value to
/// inject into a created resource when a referenced field is absent").
/// Existing values are never overwritten; only `[Step::Key]` paths are
/// supported, matching `field_a`'s JSONPath dialect for a freshly-created
/// body that has no arrays to index into yet.
pub fn apply_default_props(body: &mut Value, kind: &str, rules: &[RelationshipRule]) {
    for rule in rules.iter().filter(|r| r.involves(kind)) {
        for prop in rule.default_props.iter().chain(rule.match_criteria.iter().flat_map(|c| &c.default_props)) {
            set_if_absent(body, &prop.field_a, &prop.default);
        }
    }
}

fn set_if_absent(root: &mut Value, path: &str, default: &Value) {
    let steps = jsonpath::compile(path);
    let mut current = root;
    for (i, step) in steps.iter().enumerate() {
        let Step::Key(key) = step else {
            return;
        };
        let is_last = i == steps.len() - 1;
        if !current.is_object() {
            *current = json!({});
        }
        let map = current.as_object_mut().expect("ensured object above");
        if is_last {
            map.entry(key.clone()).or_insert_with(|| default.clone());
            return;
        }
        current = map.entry(key.clone()).or_insert_with(|| json!({}));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qgraph_ast::SetItem;
    use serde_json::json;

    fn item(parts: &[&str], value: Value) -> SetItem {
        SetItem {
            variable: "x".to_string(),
            path_parts: parts.iter().map(|s| s.to_string()).collect(),
            value,
        }
    }

    #[test]
    fn map_key_with_escaped_dot_matches_scenario() {
        let resource = Resource::new(json!({"metadata": {"annotations": {}}}));
        let ops = compile_set_item(
            &item(
                &["metadata", "annotations", "argoproj.io/tracking-id"],
                json!("abc"),
            ),
            &resource,
        )
        .unwrap();
        assert_eq!(ops.len(), 2);
        match &ops[0] {
            PatchOperation::Test(t) => assert_eq!(t.path.to_string(), "/metadata/annotations"),
            _ => panic!("expected test op"),
        }
        match &ops[1] {
            PatchOperation::Add(a) => {
                assert_eq!(a.path.to_string(), "/metadata/annotations/argoproj.io~1tracking-id");
                assert_eq!(a.value, json!("abc"));
            }
            _ => panic!("expected add op"),
        }
    }

    #[test]
    fn tilde_in_key_escapes_to_tilde_zero() {
        let resource = Resource::new(json!({"metadata": {"labels": {}}}));
        let ops = compile_set_item(&item(&["metadata", "labels", "a~b/c"], json!("v")), &resource).unwrap();
        let PatchOperation::Add(a) = &ops[1] else { panic!("expected add") };
        assert_eq!(a.path.to_string(), "/metadata/labels/a~0b~1c");
    }

    #[test]
    fn metadata_labels_simple_key_is_test_and_add_protected() {
        let resource = Resource::new(json!({"metadata": {"labels": {}}}));
        let ops = compile_set_item(&item(&["metadata", "labels", "env"], json!("prod")), &resource).unwrap();
        assert_eq!(ops.len(), 2);
        match &ops[0] {
            PatchOperation::Test(t) => {
                assert_eq!(t.path.to_string(), "/metadata/labels");
                assert_eq!(t.value, json!({}));
            }
            _ => panic!("expected test op"),
        }
        match &ops[1] {
            PatchOperation::Add(a) => {
                assert_eq!(a.path.to_string(), "/metadata/labels/env");
                assert_eq!(a.value, json!("prod"));
            }
            _ => panic!("expected add op"),
        }
    }

    #[test]
    fn metadata_annotations_simple_key_is_test_and_add_protected() {
        let resource = Resource::new(json!({"metadata": {"annotations": {}}}));
        let ops = compile_set_item(
            &item(&["metadata", "annotations", "owner"], json!("team-a")),
            &resource,
        )
        .unwrap();
        assert_eq!(ops.len(), 2);
        match &ops[0] {
            PatchOperation::Test(t) => assert_eq!(t.path.to_string(), "/metadata/annotations"),
            _ => panic!("expected test op"),
        }
        match &ops[1] {
            PatchOperation::Add(a) => assert_eq!(a.path.to_string(), "/metadata/annotations/owner"),
            _ => panic!("expected add op"),
        }
    }

    #[test]
    fn container_path_emits_strategic_merge_hint() {
        let resource = Resource::new(json!({"spec": {"template": {"spec": {"containers": [{}]}}}}));
        let ops = compile_set_item(
            &item(&["spec", "template", "spec", "containers[0]", "image"], json!("nginx:1")),
            &resource,
        )
        .unwrap();
        assert_eq!(ops.len(), 2);
        match &ops[0] {
            PatchOperation::Test(t) => {
                assert_eq!(t.path.to_string(), "/spec/template/spec/containers");
                assert_eq!(t.value, json!([]));
            }
            _ => panic!("expected test op"),
        }
        match &ops[1] {
            PatchOperation::Add(a) => assert_eq!(a.path.to_string(), "/spec/template/spec/containers/0/image"),
            _ => panic!("expected add op"),
        }
    }

    #[test]
    fn plain_nested_path_is_a_single_add() {
        let resource = Resource::new(json!({"spec": {}}));
        let ops = compile_set_item(&item(&["spec", "replicas"], json!(3)), &resource).unwrap();
        assert_eq!(ops.len(), 1);
        let PatchOperation::Add(a) = &ops[0] else { panic!("expected add") };
        assert_eq!(a.path.to_string(), "/spec/replicas");
    }

    #[test]
    fn wildcard_descends_every_array_element() {
        let resource = Resource::new(json!({"spec": {"containers": [{}, {}, {}]}}));
        let ops = compile_set_item(
            &item(&["spec", "containers[*]", "imagePullPolicy"], json!("Always")),
            &resource,
        )
        .unwrap();
        assert_eq!(ops.len(), 3);
        for (i, op) in ops.iter().enumerate() {
            let PatchOperation::Add(a) = op else { panic!("expected add") };
            assert_eq!(a.path.to_string(), format!("/spec/containers/{i}/imagePullPolicy"));
        }
    }

    #[test]
    fn wildcard_over_non_array_is_path_invalid() {
        let resource = Resource::new(json!({"spec": {"containers": {}}}));
        let err = compile_set_item(&item(&["spec", "containers[*]", "image"], json!("x")), &resource).unwrap_err();
        assert!(matches!(err.kind(), EngineErrorKind::PathInvalid(_)));
    }

    #[test]
    fn in_memory_apply_creates_intermediate_maps() {
        let mut resource = Resource::new(json!({}));
        apply_in_memory(&mut resource, &item(&["metadata", "labels", "env"], json!("prod")));
        assert_eq!(resource.as_value()["metadata"]["labels"]["env"], json!("prod"));
    }

    fn rule_with_default(kind_a: &str, kind_b: &str, field_a: &str, default: Value) -> RelationshipRule {
        use qgraph_ast::{Comparison, DefaultProp, MatchCriterion};
        RelationshipRule {
            kind_a: kind_a.to_string(),
            kind_b: kind_b.to_string(),
            relationship_type: "REFERENCES".to_string(),
            match_criteria: vec![MatchCriterion {
                field_a: "$.spec.targetRef.name".to_string(),
                field_b: "$.metadata.name".to_string(),
                comparison: Comparison::ExactMatch,
                default_props: Vec::new(),
            }],
            default_props: vec![DefaultProp {
                field_a: field_a.to_string(),
                field_b: "$.metadata.name".to_string(),
                default,
            }],
        }
    }

    #[test]
    fn default_prop_fills_absent_field_on_create() {
        let rules = vec![rule_with_default("pods", "serviceaccounts", "$.spec.serviceAccountName", json!("default"))];
        let mut body = json!({"kind": "Pod", "metadata": {"name": "p1"}});
        apply_default_props(&mut body, "pods", &rules);
        assert_eq!(body["spec"]["serviceAccountName"], json!("default"));
    }

    #[test]
    fn default_prop_never_overwrites_an_existing_value() {
        let rules = vec![rule_with_default("pods", "serviceaccounts", "$.spec.serviceAccountName", json!("default"))];
        let mut body = json!({"kind": "Pod", "spec": {"serviceAccountName": "custom"}});
        apply_default_props(&mut body, "pods", &rules);
        assert_eq!(body["spec"]["serviceAccountName"], json!("custom"));
    }

    #[test]
    fn default_prop_ignores_rules_not_involving_the_created_kind() {
        let rules = vec![rule_with_default("deployments", "services", "$.spec.selector", json!({}))];
        let mut body = json!({"kind": "Pod"});
        apply_default_props(&mut body, "pods", &rules);
        assert!(body.get("spec").is_none());
    }
}
