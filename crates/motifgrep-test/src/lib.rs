//! Shared host-graph fixtures for motifgrep tests.

use motifgrep_dsl::Value;
use motifgrep_search::MemoryHost;

/// Install a tracing subscriber honoring `RUST_LOG`, so failing tests can
/// surface compiler and engine diagnostics. Safe to call repeatedly.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a host from bare directed edges.
pub fn host_from_edges(edges: &[(&str, &str)]) -> MemoryHost {
    let mut host = MemoryHost::new();
    for (u, v) in edges {
        host.add_edge(u, v);
    }
    host
}

/// Build a host whose edges each carry one attribute.
pub fn host_with_edge_attr<V>(key: &str, edges: &[(&str, &str, V)]) -> MemoryHost
where
    V: Into<Value> + Clone,
{
    let mut host = MemoryHost::new();
    for (u, v, value) in edges {
        host.add_edge_with(u, v, [(key, value.clone().into())]);
    }
    host
}

/// Set one attribute on several nodes of an existing host.
pub fn set_node_attr<V>(host: &mut MemoryHost, key: &str, values: &[(&str, V)])
where
    V: Into<Value> + Clone,
{
    for (node, value) in values {
        host.add_node_with(node, [(key, value.clone().into())]);
    }
}
