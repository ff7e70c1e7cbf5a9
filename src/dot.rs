//! DOT (Graphviz) export of a state graph
//!
//! The output only depends on the graph's content: states, substates and
//! rules are emitted sorted by identifier, never in hash-map order.

use std::fmt::{Display, Write};

use crate::graph::{Identifier, RuleKind, StateGraph};

/// Quote an identifier for use as a DOT ID or label
fn quote(value: &impl Display) -> String {
    let text = value.to_string();
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Quote a node label. `Mrecord` nodes parse their label as record fields,
/// so the field separators are escaped as well.
fn quote_label(value: &impl Display) -> String {
    let quoted = quote(value);
    let mut out = String::with_capacity(quoted.len());
    for c in quoted.chars() {
        if matches!(c, '|' | '{' | '}' | '<' | '>') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Render `graph` as a DOT digraph.
///
/// Each state is one node; a state with substates opens a `cluster_` subgraph
/// holding its own node and its substates. Each external rule is an edge
/// labeled by its trigger, each internal rule a dashed self-loop.
pub fn export_graph<S: Identifier, E: Identifier>(graph: &StateGraph<S, E>) -> String {
    let mut out = String::from("digraph {\n\tcompound=true;\n\tnode [shape=Mrecord];\n\trankdir=\"LR\";\n\n");

    for root in graph.roots() {
        write_state(graph, root, 1, &mut out);
    }

    let mut edges = Vec::new();
    for state in graph.states() {
        let Ok(handle) = graph.handle(state) else {
            continue;
        };
        for (trigger, rule) in graph.rules_of(handle) {
            let mut label = match graph.trigger_parameter(trigger) {
                Some(param) => format!("{}({})", trigger, param),
                None => trigger.to_string(),
            };
            if let Some(guard) = &rule.guard {
                let _ = write!(label, " [{}]", guard.description);
            }
            let edge = match rule.kind {
                RuleKind::External(target) => format!(
                    "\t{} -> {} [label={}];\n",
                    quote(state),
                    quote(graph.id(target)),
                    quote(&label)
                ),
                RuleKind::Internal => format!(
                    "\t{} -> {} [label={}, style=\"dashed\"];\n",
                    quote(state),
                    quote(state),
                    quote(&label)
                ),
            };
            edges.push(edge);
        }
    }

    if !edges.is_empty() {
        out.push('\n');
        for edge in edges {
            out.push_str(&edge);
        }
    }
    out.push_str("}\n");
    out
}

fn write_state<S: Identifier, E: Identifier>(
    graph: &StateGraph<S, E>,
    handle: usize,
    depth: usize,
    out: &mut String,
) {
    let indent = "\t".repeat(depth);
    let id = graph.id(handle);
    let children = graph.children(handle);

    if children.is_empty() {
        let _ = writeln!(out, "{}{} [label={}];", indent, quote(id), quote_label(id));
        return;
    }

    let _ = writeln!(out, "{}subgraph {} {{", indent, quote(&format!("cluster_{}", id)));
    let _ = writeln!(out, "{}\tlabel={};", indent, quote(id));
    let _ = writeln!(out, "{}\t{} [label={}];", indent, quote(id), quote_label(id));
    for child in children {
        write_state(graph, child, depth + 1, out);
    }
    let _ = writeln!(out, "{}}}", indent);
}

impl<S: Identifier, E: Identifier> StateGraph<S, E> {
    /// Render the graph as DOT, see [`export_graph`]
    pub fn to_dot(&self) -> String {
        export_graph(self)
    }
}
