//! PlantUML diagram generation

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use crate::graph::{Identifier, RuleKind, StateGraph};

/// PlantUML state names cannot contain spaces or punctuation; anything
/// else becomes an alias of a quoted display name.
fn alias(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Unique alias per state handle. Names that are already valid aliases keep
/// them; sanitized names that collide get a numeric suffix.
fn aliases<S: Identifier, E: Identifier>(graph: &StateGraph<S, E>) -> HashMap<usize, String> {
    let mut handles = Vec::new();
    for state in graph.states() {
        if let Ok(handle) = graph.handle(state) {
            handles.push((handle, state.to_string()));
        }
    }

    let mut used = HashSet::new();
    let mut assigned = HashMap::new();
    for (handle, name) in &handles {
        if alias(name) == *name {
            used.insert(name.clone());
            assigned.insert(*handle, name.clone());
        }
    }
    for (handle, name) in &handles {
        if assigned.contains_key(handle) {
            continue;
        }
        let base = alias(name);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while used.contains(&candidate) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        used.insert(candidate.clone());
        assigned.insert(*handle, candidate);
    }
    assigned
}

/// Generate a PlantUML state diagram from a state graph.
///
/// Substates are nested inside their parent's `state X { }` block, external
/// rules become `A --> B : Trigger` arrows and internal rules are listed as
/// `X : Trigger / internal`. Ordering follows identifiers, like the DOT export.
pub fn export_plantuml<S: Identifier, E: Identifier>(graph: &StateGraph<S, E>) -> String {
    let aliases = aliases(graph);
    let mut out = String::from("@startuml\n");

    for root in graph.roots() {
        write_state(graph, &aliases, root, 0, &mut out);
    }

    let mut transitions = String::new();
    for state in graph.states() {
        let Ok(handle) = graph.handle(state) else {
            continue;
        };
        let from = &aliases[&handle];
        for (trigger, rule) in graph.rules_of(handle) {
            let mut label = trigger.to_string();
            if let Some(guard) = &rule.guard {
                let _ = write!(label, " [{}]", guard.description);
            }
            let _ = match rule.kind {
                RuleKind::External(target) => {
                    writeln!(transitions, "{} --> {} : {}", from, aliases[&target], label)
                }
                RuleKind::Internal => writeln!(transitions, "{} : {} / internal", from, label),
            };
        }
    }

    if !transitions.is_empty() {
        out.push('\n');
        out.push_str(&transitions);
    }
    out.push_str("@enduml\n");
    out
}

fn write_state<S: Identifier, E: Identifier>(
    graph: &StateGraph<S, E>,
    aliases: &HashMap<usize, String>,
    handle: usize,
    depth: usize,
    out: &mut String,
) {
    let indent = "  ".repeat(depth);
    let name = graph.id(handle).to_string();
    let id = &aliases[&handle];
    let children = graph.children(handle);

    let declaration = if *id == name {
        format!("state {}", id)
    } else {
        format!("state {:?} as {}", name, id)
    };

    if children.is_empty() {
        let _ = writeln!(out, "{}{}", indent, declaration);
        return;
    }

    let _ = writeln!(out, "{}{} {{", indent, declaration);
    for child in children {
        write_state(graph, aliases, child, depth + 1, out);
    }
    let _ = writeln!(out, "{}}}", indent);
}

impl<S: Identifier, E: Identifier> StateGraph<S, E> {
    /// Render the graph as PlantUML, see [`export_plantuml`]
    pub fn to_plantuml(&self) -> String {
        export_plantuml(self)
    }
}
