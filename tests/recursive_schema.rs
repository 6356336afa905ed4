//! Self-referential and mutually recursive schemas

use std::sync::Arc;

use refgraph::{
    DocumentLoader, GraphValue, InMemorySource, JsonPointer, Node, NodeKey, ResolutionEngine,
    ResolveError, ResolverConfig,
};
use serde_json::json;
use url::Url;

fn recursive_root() -> Node {
    Node::from(json!({
        "openapi": "3.0.2",
        "components": {
            "schemas": {
                "Node": {
                    "type": "object",
                    "properties": {
                        "value": {"type": "string"},
                        "children": {
                            "type": "array",
                            "items": {"$ref": "#/components/schemas/Node"}
                        }
                    }
                },
                "Tree": {
                    "type": "object",
                    "properties": {
                        "root": {"$ref": "#/components/schemas/Node"}
                    }
                }
            }
        }
    }))
}

fn schema_key(graph: &refgraph::SchemaGraph, name: &str) -> NodeKey {
    NodeKey::new(
        graph.get_root().key.locator.clone(),
        JsonPointer::from_tokens(["components", "schemas", name]),
    )
}

#[test]
fn test_self_reference_terminates_with_one_back_edge() {
    let temp = tempfile::TempDir::new().unwrap();
    let engine = ResolutionEngine::file_system(ResolverConfig::default());
    let graph = engine
        .resolve_value(recursive_root(), temp.path())
        .unwrap()
        .into_result()
        .unwrap();

    let node = graph.get_node(&schema_key(&graph, "Node")).unwrap();
    assert!(graph.is_cyclic(node));
    assert_eq!(graph.cycles().len(), 1);
    assert_eq!(graph.cycles()[0].target, node.id);
    assert_eq!(
        graph.cycles()[0].location.pointer,
        "/components/schemas/Node/properties/children/items"
    );

    let GraphValue::Object(fields) = &node.value else {
        panic!("Node should be an object");
    };
    let GraphValue::Object(properties) = &fields["properties"] else {
        panic!("properties should be an object");
    };
    let GraphValue::Object(children) = &properties["children"] else {
        panic!("children should be an object");
    };
    assert_eq!(children["items"], GraphValue::Cycle(node.id));

    // No file was read for an in-memory root with only local references
    assert_eq!(engine.loader().cache().load_count(), 0);
}

#[test]
fn test_other_sites_share_the_recursive_node() {
    let temp = tempfile::TempDir::new().unwrap();
    let engine = ResolutionEngine::file_system(ResolverConfig::default());
    let graph = engine
        .resolve_value(recursive_root(), temp.path())
        .unwrap()
        .into_result()
        .unwrap();

    let node = graph.get_node(&schema_key(&graph, "Node")).unwrap();
    let root = graph.materialize(graph.get_root().id, 0);
    assert_eq!(
        root["components"]["schemas"]["Tree"]["properties"]["root"]["properties"]["children"]
            ["items"],
        json!({"$ref": node.key.to_string()})
    );
    // Only the root and Node were reached through references
    assert_eq!(graph.len(), 2);
    assert!(!graph.is_cyclic(graph.get_root()));
}

#[test]
fn test_materialize_depth_is_bounded() {
    let temp = tempfile::TempDir::new().unwrap();
    let engine = ResolutionEngine::file_system(ResolverConfig::default());
    let graph = engine
        .resolve_value(recursive_root(), temp.path())
        .unwrap()
        .into_result()
        .unwrap();

    let node = graph.get_node(&schema_key(&graph, "Node")).unwrap();
    let value = graph.materialize(node.id, 2);
    let items = &value["properties"]["children"]["items"]["properties"]["children"]["items"]
        ["properties"]["children"]["items"];
    assert_eq!(items, &json!({"$ref": node.key.to_string()}));
}

#[test]
fn test_missing_local_pointer() {
    let temp = tempfile::TempDir::new().unwrap();
    let engine = ResolutionEngine::file_system(ResolverConfig::default());
    let root = Node::from(json!({
        "components": {"schemas": {"Broken": {"$ref": "#/nonexistent"}}}
    }));
    let resolution = engine.resolve_value(root, temp.path()).unwrap();

    let failure = resolution.first_failure().unwrap();
    assert_eq!(failure.reference, "#/nonexistent");
    assert!(failure.trace.is_empty());
    match &failure.cause {
        ResolveError::Pointer(e) => assert_eq!(e.missing_token, "nonexistent"),
        other => panic!("unexpected cause: {:?}", other),
    }
    assert!(failure.to_string().contains("nonexistent"));
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

/// a -> {b, c}, b -> d, c -> d, d -> a
fn diamond() -> ResolutionEngine {
    let mut source = InMemorySource::new();
    source
        .insert_text(
            url("file:///s/a.yaml"),
            "left: {$ref: 'b.yaml#/B'}\nright: {$ref: 'sub/../c.yaml#/C'}\n",
        )
        .unwrap()
        .insert_text(url("file:///s/b.yaml"), "B: {next: {$ref: 'd.yaml#/D'}}\n")
        .unwrap()
        .insert_text(url("file:///s/c.yaml"), "C: {next: {$ref: './d.yaml#/D'}}\n")
        .unwrap()
        .insert_text(url("file:///s/d.yaml"), "D: {back: {$ref: 'a.yaml#'}}\n")
        .unwrap();
    ResolutionEngine::new(
        Arc::new(DocumentLoader::new(Arc::new(source))),
        ResolverConfig::default(),
    )
}

#[test]
fn test_diamond_into_cycle() {
    let engine = diamond();
    let resolution = engine.resolve_url(&url("file:///s/a.yaml")).unwrap();
    assert!(resolution.is_complete());
    assert_eq!(resolution.documents.len(), 4);
    assert_eq!(engine.loader().cache().load_count(), 4);

    let graph = resolution.graph;
    let d = graph
        .get_node(&NodeKey::new(
            url("file:///s/d.yaml"),
            JsonPointer::from_tokens(["D"]),
        ))
        .unwrap();

    // d is resolved once and reached from both sides
    let next_of = |name: &str, locator: &str| {
        let node = graph
            .get_node(&NodeKey::new(url(locator), JsonPointer::from_tokens([name])))
            .unwrap();
        let GraphValue::Object(fields) = &node.value else {
            panic!("{} should be an object", name);
        };
        fields["next"].clone()
    };
    assert_eq!(next_of("B", "file:///s/b.yaml"), GraphValue::Ref(d.id));
    assert_eq!(next_of("C", "file:///s/c.yaml"), GraphValue::Ref(d.id));

    // d's reference back to the root document is the only back-edge
    assert_eq!(graph.cycles().len(), 1);
    assert_eq!(graph.cycles()[0].target, graph.get_root().id);
    assert!(graph.is_cyclic(graph.get_root()));
    assert!(!graph.is_cyclic(d));
}

#[test]
fn test_resolving_twice_gives_the_same_structure() {
    let engine = diamond();
    let first = engine.resolve_url(&url("file:///s/a.yaml")).unwrap().graph;
    let second = engine.resolve_url(&url("file:///s/a.yaml")).unwrap().graph;

    assert_eq!(
        first.materialize(first.get_root().id, 1),
        second.materialize(second.get_root().id, 1)
    );
    // The second walk is served from the cache
    assert_eq!(engine.loader().cache().load_count(), 4);
}
