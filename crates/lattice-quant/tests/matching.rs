//! Pattern matching against traced graphs.

use lattice_core::{CapturedGraph, FrontendExt, NodeId, OpId, Returned, Tracer, ValueRef};
use lattice_quant::{
    BackendPatternConfig, ConfigResolver, ObservationType, Pattern, PatternEntry, PatternMatcher,
    native_backend_config,
};

/// Trace a one-input program written against the tracer directly.
fn capture(
    build: impl FnOnce(&mut Tracer, ValueRef) -> lattice_core::Result<Returned<ValueRef>>,
) -> CapturedGraph {
    let mut tracer = Tracer::new(vec!["x".to_string()]);
    let x = tracer.inputs()[0];
    let returned = build(&mut tracer, x).unwrap();
    tracer.finish(returned).unwrap()
}

fn node_named(graph: &CapturedGraph, name: &str) -> NodeId {
    graph
        .nodes()
        .find(|(_, node)| node.name == name)
        .map(|(id, _)| id)
        .unwrap()
}

#[test]
fn test_linear_relu_chain_beats_single_relu() {
    let table = native_backend_config().unwrap();
    let graph = capture(|t, x| {
        let y = t.call_module("nn.Linear", &[x])?;
        Ok(Returned::Single(t.call_module("nn.ReLU", &[y])?))
    });

    let matcher = PatternMatcher::new(&table);
    let relu = node_named(&graph, "relu");
    let found = matcher.match_node(&graph, relu).unwrap().unwrap();
    assert_eq!(
        found.pattern,
        &Pattern::sequence(OpId::module("nn.Linear"), OpId::module("nn.ReLU"))
    );
    assert_eq!(found.nodes, vec![node_named(&graph, "linear"), relu]);
    assert!(found.config.fuser_method.is_some());
}

#[test]
fn test_chain_refused_when_intermediate_has_two_consumers() {
    let table = native_backend_config().unwrap();
    let graph = capture(|t, x| {
        let y = t.call_module("nn.Linear", &[x])?;
        let r = t.call_module("nn.ReLU", &[y])?;
        let s = t.add(&y, &r)?;
        Ok(Returned::Single(s))
    });

    let matcher = PatternMatcher::new(&table);
    let relu = node_named(&graph, "relu");
    let found = matcher.match_node(&graph, relu).unwrap().unwrap();
    // Falls back to the share-qparams single entry for nn.ReLU.
    assert_eq!(found.pattern, &Pattern::op(OpId::module("nn.ReLU")));
    assert_eq!(
        found.observation_type(&graph).unwrap(),
        Some(ObservationType::OutputShareObserverWithInput)
    );
}

#[test]
fn test_chain_refused_when_intermediate_is_graph_output() {
    let table = native_backend_config().unwrap();
    let graph = capture(|t, x| {
        let y = t.call_module("nn.Linear", &[x])?;
        let r = t.call_module("nn.ReLU", &[y])?;
        Ok(Returned::Tuple(vec![r, y]))
    });

    let matcher = PatternMatcher::new(&table);
    let found = matcher
        .match_node(&graph, node_named(&graph, "relu"))
        .unwrap()
        .unwrap();
    assert!(!found.is_chain());
}

#[test]
fn test_binary_observation_depends_on_tensor_args() {
    let table = native_backend_config().unwrap();
    let graph = capture(|t, x| {
        let scaled = t.add_scalar(&x, 1.0)?;
        let doubled = t.add(&x, &scaled)?;
        Ok(Returned::Single(doubled))
    });

    let matcher = PatternMatcher::new(&table);
    let with_scalar = matcher
        .match_node(&graph, node_named(&graph, "add"))
        .unwrap()
        .unwrap();
    assert_eq!(
        with_scalar.observation_type(&graph).unwrap(),
        Some(ObservationType::OutputShareObserverWithInput)
    );

    let with_tensors = matcher
        .match_node(&graph, node_named(&graph, "add_1"))
        .unwrap()
        .unwrap();
    assert_eq!(
        with_tensors.observation_type(&graph).unwrap(),
        Some(ObservationType::OutputUseDifferentObserverAsInput)
    );
}

#[test]
fn test_add_relu_observation_uses_root_node() {
    let table = native_backend_config().unwrap();
    let graph = capture(|t, x| {
        let y = t.add_scalar(&x, 2.0)?;
        Ok(Returned::Single(t.relu(&y)?))
    });

    let matcher = PatternMatcher::new(&table);
    let found = matcher
        .match_node(&graph, node_named(&graph, "relu"))
        .unwrap()
        .unwrap();
    assert_eq!(
        found.pattern,
        &Pattern::sequence(OpId::function("operator.add"), OpId::function("torch.relu"))
    );
    assert_eq!(
        found.observation_type(&graph).unwrap(),
        Some(ObservationType::OutputShareObserverWithInput)
    );
}

#[test]
fn test_unknown_op_has_no_match() {
    let table = native_backend_config().unwrap();
    let graph = capture(|t, x| Ok(Returned::Single(t.call_method("softplus", &[x])?)));

    let matcher = PatternMatcher::new(&table);
    let softplus = node_named(&graph, "softplus");
    assert!(matcher.match_node(&graph, softplus).unwrap().is_none());
}

fn different() -> BackendPatternConfig {
    BackendPatternConfig::new(ObservationType::OutputUseDifferentObserverAsInput)
}

fn conv_bn_relu_configs() -> Vec<PatternEntry> {
    let conv = OpId::module("nn.Conv2d");
    let bn = OpId::module("nn.BatchNorm2d");
    let relu = OpId::module("nn.ReLU");
    vec![
        (Pattern::op(relu.clone()), different()),
        (Pattern::sequence(bn.clone(), relu.clone()), different()),
        (
            Pattern::Chain(vec![conv.clone(), bn.clone(), relu.clone()]),
            different(),
        ),
        (Pattern::sequence(conv, bn), different()),
    ]
}

#[test]
fn test_longest_chain_wins() {
    let table = ConfigResolver::new("test")
        .with_generator("conv_bn_relu", conv_bn_relu_configs)
        .resolve()
        .unwrap();
    let graph = capture(|t, x| {
        let c = t.call_module("nn.Conv2d", &[x])?;
        let b = t.call_module("nn.BatchNorm2d", &[c])?;
        Ok(Returned::Single(t.call_module("nn.ReLU", &[b])?))
    });

    let matcher = PatternMatcher::new(&table);
    let found = matcher
        .match_node(&graph, node_named(&graph, "relu"))
        .unwrap()
        .unwrap();
    assert_eq!(found.nodes.len(), 3);
    assert_eq!(found.position, 2);
}

#[test]
fn test_match_graph_claims_producers_once() {
    let table = ConfigResolver::new("test")
        .with_generator("conv_bn_relu", conv_bn_relu_configs)
        .resolve()
        .unwrap();
    let graph = capture(|t, x| {
        let c = t.call_module("nn.Conv2d", &[x])?;
        let b = t.call_module("nn.BatchNorm2d", &[c])?;
        Ok(Returned::Single(t.call_module("nn.ReLU", &[b])?))
    });

    let matches = PatternMatcher::new(&table).match_graph(&graph).unwrap();
    assert_eq!(matches.len(), 1);
    let conv = node_named(&graph, "conv2d");
    let relu = node_named(&graph, "relu");
    assert_eq!(matches.for_node(conv), matches.for_node(relu));
    assert_eq!(matches.chains().count(), 1);
}

#[test]
fn test_match_graph_orders_by_anchor() {
    let table = native_backend_config().unwrap();
    let graph = capture(|t, x| {
        let v = t.call_method("view", &[x])?;
        let y = t.call_module("nn.Linear", &[v])?;
        let r = t.call_module("nn.ReLU", &[y])?;
        Ok(Returned::Single(t.sigmoid(&r)?))
    });

    let matches = PatternMatcher::new(&table).match_graph(&graph).unwrap();
    let patterns: Vec<String> = matches
        .matches()
        .iter()
        .map(|m| m.pattern.to_string())
        .collect();
    assert_eq!(
        patterns,
        vec![".view", "(nn.Linear -> nn.ReLU)", "torch.sigmoid"]
    );
    let view = node_named(&graph, "view");
    assert_eq!(matches.for_node(view).map(|m| m.position), table.single(&OpId::method("view")));
}
