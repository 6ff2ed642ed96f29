//! Dependency tracking for formula calculation
//!
//! Nodes are reference names. A forward edge `a -> b` means the formula of
//! `a` reads `b`; the reverse map holds the same edges the other way round so
//! dependents can be found without a scan. Both maps are ordered, which makes
//! every traversal below deterministic.

use crate::ast::Expr;
use crate::error::FormulaResult;
use crate::parser::parse;
use calcsheet_core::{flatten_fields, FieldDefinition};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Dependency graph between reference names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Declared reference names
    nodes: BTreeSet<String>,
    /// Reference -> references it reads (precedents)
    dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Reference -> references that read it (dependents)
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a reference name as a node
    pub fn declare(&mut self, reference: impl Into<String>) {
        self.nodes.insert(reference.into());
    }

    /// Add a dependency: `dependent` reads `precedent`
    ///
    /// The precedent does not need to be declared.
    pub fn add_dependency(&mut self, dependent: &str, precedent: &str) {
        self.dependencies
            .entry(dependent.to_string())
            .or_default()
            .insert(precedent.to_string());
        self.dependents
            .entry(precedent.to_string())
            .or_default()
            .insert(dependent.to_string());
    }

    /// Declare `reference` and add an edge to every reference `expr` reads
    pub fn add_formula(&mut self, reference: &str, expr: &Expr) {
        self.declare(reference);
        for precedent in expr.references() {
            self.add_dependency(reference, precedent);
        }
    }

    /// References that `reference` reads
    pub fn dependencies(&self, reference: &str) -> impl Iterator<Item = &str> + '_ {
        self.dependencies
            .get(reference)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// References that read `reference`
    pub fn dependents(&self, reference: &str) -> impl Iterator<Item = &str> + '_ {
        self.dependents
            .get(reference)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Declared reference names, sorted
    pub fn nodes(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes.iter().map(String::as_str)
    }

    /// Check whether `reference` was declared
    pub fn is_declared(&self, reference: &str) -> bool {
        self.nodes.contains(reference)
    }

    /// References that are read but never declared
    pub fn dangling(&self) -> BTreeSet<&str> {
        self.dependents
            .keys()
            .filter(|r| !self.nodes.contains(*r))
            .map(String::as_str)
            .collect()
    }

    /// Declared and dangling references together
    pub fn all_nodes(&self) -> BTreeSet<&str> {
        let mut all: BTreeSet<&str> = self.nodes().collect();
        all.extend(self.dangling());
        all
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.dependencies.values().map(BTreeSet::len).sum()
    }

    /// Every reference that directly or indirectly reads `reference`
    ///
    /// Breadth-first over reverse edges. `reference` itself is included only
    /// when it lies on a cycle.
    pub fn transitive_dependents(&self, reference: &str) -> BTreeSet<&str> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&str> = self.dependents(reference).collect();

        while let Some(next) = queue.pop_front() {
            if seen.insert(next) {
                queue.extend(self.dependents(next));
            }
        }

        seen
    }

    /// Copy of this graph with `removed` nodes and all their edges dropped
    pub fn without(&self, removed: &BTreeSet<String>) -> DependencyGraph {
        let mut pruned = DependencyGraph::new();

        for node in self.nodes.difference(removed) {
            pruned.declare(node.clone());
        }
        for (dependent, precedents) in &self.dependencies {
            if removed.contains(dependent) {
                continue;
            }
            for precedent in precedents.difference(removed) {
                pruned.add_dependency(dependent, precedent);
            }
        }

        pruned
    }
}

/// A field kept under its reference name, with its formula parsed
#[derive(Debug, Clone)]
pub struct BoundField<'a> {
    /// Reference name the field is bound to
    pub reference: &'a str,
    /// The field definition
    pub field: &'a FieldDefinition,
    /// Parsed expression, `None` for value fields
    pub formula: Option<FormulaResult<Expr>>,
}

/// Flatten a field list, bind reference names and parse every formula
///
/// Nested frames are flattened. Fields without a reference name are
/// skipped, and when two fields share a name the first one wins. Returns
/// the dependency graph of the bound fields together with the fields in
/// declaration order. A formula that fails to parse gives a node with no
/// edges.
pub fn bind_fields(fields: &[FieldDefinition]) -> (DependencyGraph, Vec<BoundField<'_>>) {
    let mut graph = DependencyGraph::new();
    let mut bound = Vec::new();

    for field in flatten_fields(fields) {
        let Some(reference) = field.reference.as_deref() else {
            continue;
        };
        if graph.is_declared(reference) {
            log::warn!(
                "Duplicate reference '{}' on field '{}' ignored",
                reference,
                field.id
            );
            continue;
        }

        let formula = field.expression().map(parse);
        match &formula {
            Some(Ok(expr)) => graph.add_formula(reference, expr),
            Some(Err(_)) | None => graph.declare(reference),
        }
        bound.push(BoundField {
            reference,
            field,
            formula,
        });
    }

    (graph, bound)
}

/// Build the dependency graph of a field list
///
/// Every field with a reference name becomes a node; a formula adds one
/// edge per distinct reference it reads. See [`bind_fields`].
pub fn build_graph(fields: &[FieldDefinition]) -> DependencyGraph {
    bind_fields(fields).0
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

struct Frame<'a> {
    node: &'a str,
    neighbors: Vec<&'a str>,
    idx: usize,
}

/// Find one dependency cycle
///
/// Depth-first along forward edges from every unvisited node in sorted order,
/// keeping the current path on an explicit stack. Reaching a node that is
/// still on the stack closes a cycle; the returned path starts at that node
/// and lists each member once, in reading order. A self-reference is a path
/// of length one.
pub fn detect_cycle(graph: &DependencyGraph) -> Option<Vec<String>> {
    let mut color: BTreeMap<&str, Color> = BTreeMap::new();
    let mut stack: Vec<&str> = Vec::new();

    for start in graph.nodes() {
        if color.get(start).copied().unwrap_or(Color::White) != Color::White {
            continue;
        }

        let mut frames = vec![Frame {
            node: start,
            neighbors: graph.dependencies(start).collect(),
            idx: 0,
        }];
        stack.push(start);
        color.insert(start, Color::Gray);

        while let Some(frame) = frames.last_mut() {
            if frame.idx >= frame.neighbors.len() {
                color.insert(frame.node, Color::Black);
                stack.pop();
                frames.pop();
                continue;
            }

            let next = frame.neighbors[frame.idx];
            frame.idx += 1;

            match color.get(next).copied().unwrap_or(Color::White) {
                Color::White => {
                    color.insert(next, Color::Gray);
                    stack.push(next);
                    frames.push(Frame {
                        node: next,
                        neighbors: graph.dependencies(next).collect(),
                        idx: 0,
                    });
                }
                Color::Gray => {
                    let from = stack.iter().position(|n| *n == next).unwrap_or(0);
                    return Some(stack[from..].iter().map(|n| n.to_string()).collect());
                }
                Color::Black => {}
            }
        }
    }

    None
}

/// Tarjan state for one strongly connected component pass
struct Components<'a> {
    graph: &'a DependencyGraph,
    next_index: usize,
    index: BTreeMap<&'a str, usize>,
    lowlink: BTreeMap<&'a str, usize>,
    stack: Vec<&'a str>,
    on_stack: BTreeSet<&'a str>,
}

impl<'a> Components<'a> {
    fn new(graph: &'a DependencyGraph) -> Self {
        Self {
            graph,
            next_index: 0,
            index: BTreeMap::new(),
            lowlink: BTreeMap::new(),
            stack: Vec::new(),
            on_stack: BTreeSet::new(),
        }
    }

    fn visit(&mut self, node: &'a str) -> Frame<'a> {
        self.index.insert(node, self.next_index);
        self.lowlink.insert(node, self.next_index);
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack.insert(node);
        Frame {
            node,
            neighbors: self.graph.dependencies(node).collect(),
            idx: 0,
        }
    }

    fn lower(&mut self, node: &'a str, to: usize) {
        if let Some(low) = self.lowlink.get_mut(node) {
            *low = (*low).min(to);
        }
    }

    fn low(&self, node: &str) -> usize {
        self.lowlink.get(node).copied().unwrap_or(usize::MAX)
    }

    /// Pop the component rooted at `root` off the stack
    fn pop_component(&mut self, root: &'a str) -> Vec<&'a str> {
        let mut members = Vec::new();
        while let Some(member) = self.stack.pop() {
            self.on_stack.remove(member);
            members.push(member);
            if member == root {
                break;
            }
        }
        members
    }
}

/// Every reference that lies on some dependency cycle
///
/// One pass of Tarjan's algorithm over forward edges, with an explicit
/// frame stack. A strongly connected component is cyclic when it has more
/// than one member or its single member reads itself.
pub fn cyclic_references(graph: &DependencyGraph) -> BTreeSet<String> {
    let mut tarjan = Components::new(graph);
    let mut cyclic = BTreeSet::new();

    for start in graph.nodes() {
        if tarjan.index.contains_key(start) {
            continue;
        }

        let mut frames = vec![tarjan.visit(start)];

        while let Some(frame) = frames.last_mut() {
            let node = frame.node;

            if frame.idx < frame.neighbors.len() {
                let next = frame.neighbors[frame.idx];
                frame.idx += 1;

                match tarjan.index.get(next).copied() {
                    None => {
                        let child = tarjan.visit(next);
                        frames.push(child);
                    }
                    Some(i) if tarjan.on_stack.contains(next) => tarjan.lower(node, i),
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            let low = tarjan.low(node);
            if let Some(parent) = frames.last() {
                tarjan.lower(parent.node, low);
            }

            if tarjan.index.get(node).copied() == Some(low) {
                let members = tarjan.pop_component(node);
                if members.len() > 1 || graph.dependencies(node).any(|d| d == node) {
                    cyclic.extend(members.into_iter().map(str::to_string));
                }
            }
        }
    }

    cyclic
}

/// Evaluation order: every reference after all the references it reads
///
/// Depth-first along reverse edges, emitting each node once all of its
/// dependents are finished, then reversing. Covers declared and dangling
/// nodes. Returns `None` if the graph is cyclic.
pub fn topological_order(graph: &DependencyGraph) -> Option<Vec<String>> {
    let all = graph.all_nodes();
    let mut color: BTreeMap<&str, Color> = BTreeMap::new();
    let mut finished: Vec<&str> = Vec::with_capacity(all.len());

    // Reverse start order so that independent nodes come out sorted
    for &start in all.iter().rev() {
        if color.contains_key(start) {
            continue;
        }

        let mut frames = vec![Frame {
            node: start,
            neighbors: graph.dependents(start).collect(),
            idx: 0,
        }];
        color.insert(start, Color::Gray);

        while let Some(frame) = frames.last_mut() {
            if frame.idx >= frame.neighbors.len() {
                color.insert(frame.node, Color::Black);
                finished.push(frame.node);
                frames.pop();
                continue;
            }

            let next = frame.neighbors[frame.idx];
            frame.idx += 1;

            match color.get(next).copied().unwrap_or(Color::White) {
                Color::White => {
                    color.insert(next, Color::Gray);
                    frames.push(Frame {
                        node: next,
                        neighbors: graph.dependents(next).collect(),
                        idx: 0,
                    });
                }
                Color::Gray => return None,
                Color::Black => {}
            }
        }
    }

    finished.reverse();
    Some(finished.into_iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn graph_of(formulas: &[(&str, &str)]) -> DependencyGraph {
        let fields: Vec<FieldDefinition> = formulas
            .iter()
            .map(|(r, e)| FieldDefinition::formula(*r, *e))
            .collect();
        build_graph(&fields)
    }

    fn position(order: &[String], reference: &str) -> usize {
        order.iter().position(|r| r == reference).unwrap()
    }

    #[test]
    fn test_add_dependency() {
        let mut graph = DependencyGraph::new();
        graph.declare("a");
        graph.declare("b");
        graph.add_dependency("b", "a");

        assert_eq!(graph.dependencies("b").collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(graph.dependents("a").collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_build_graph_collects_nested_references() {
        let graph = graph_of(&[("total", "SUM(a, b * -a) + IF(c, 1, d%)")]);
        assert_eq!(
            graph.dependencies("total").collect::<Vec<_>>(),
            vec!["a", "b", "c", "d"]
        );
    }

    #[test]
    fn test_build_graph_is_deterministic() {
        let formulas = [("x", "a + b"), ("y", "x * c"), ("z", "y + x")];
        assert_eq!(graph_of(&formulas), graph_of(&formulas));
    }

    #[test]
    fn test_value_fields_are_leaves() {
        let fields = vec![
            FieldDefinition::number("rate", Some(2.0)),
            FieldDefinition::formula("pay", "rate * 3"),
        ];
        let graph = build_graph(&fields);
        assert_eq!(graph.dependencies("rate").count(), 0);
        assert_eq!(graph.dependents("rate").collect::<Vec<_>>(), vec!["pay"]);
        assert!(graph.dangling().is_empty());
    }

    #[test]
    fn test_dangling_references() {
        let graph = graph_of(&[("a", "missing + 1")]);
        assert_eq!(graph.dangling(), BTreeSet::from(["missing"]));
        assert!(graph.all_nodes().contains("missing"));
        assert!(!graph.is_declared("missing"));
    }

    #[test]
    fn test_unparseable_formula_is_isolated_node() {
        let graph = graph_of(&[("bad", "1 +"), ("good", "bad + 1")]);
        assert!(graph.is_declared("bad"));
        assert_eq!(graph.dependencies("bad").count(), 0);
        assert_eq!(graph.dependents("bad").collect::<Vec<_>>(), vec!["good"]);
    }

    #[test]
    fn test_nested_frames_and_duplicates() {
        let fields = vec![
            FieldDefinition::number("a", None),
            FieldDefinition::frame(
                "group",
                vec![
                    FieldDefinition::formula("b", "a * 2"),
                    FieldDefinition::formula("a", "b"),
                ],
            ),
        ];
        let graph = build_graph(&fields);
        assert_eq!(graph.dependencies("b").collect::<Vec<_>>(), vec!["a"]);
        // The second "a" is ignored
        assert_eq!(graph.dependencies("a").count(), 0);
    }

    #[test]
    fn test_transitive_dependents() {
        let graph = graph_of(&[("b", "a"), ("c", "b"), ("d", "c + a"), ("e", "x")]);
        assert_eq!(
            graph.transitive_dependents("a"),
            BTreeSet::from(["b", "c", "d"])
        );
        assert!(graph.transitive_dependents("d").is_empty());
    }

    #[test]
    fn test_no_cycle() {
        let graph = graph_of(&[("b", "a"), ("c", "a + b")]);
        assert_eq!(detect_cycle(&graph), None);
        assert!(cyclic_references(&graph).is_empty());
    }

    #[test]
    fn test_two_node_cycle() {
        let graph = graph_of(&[("x", "y + 1"), ("y", "x * 2")]);
        assert_eq!(
            detect_cycle(&graph),
            Some(vec!["x".to_string(), "y".to_string()])
        );
        assert_eq!(topological_order(&graph), None);
    }

    #[test]
    fn test_self_cycle() {
        let graph = graph_of(&[("a", "a + 1")]);
        assert_eq!(detect_cycle(&graph), Some(vec!["a".to_string()]));
        assert_eq!(
            cyclic_references(&graph),
            BTreeSet::from(["a".to_string()])
        );
    }

    #[test]
    fn test_cyclic_references_excludes_downstream() {
        // p <-> q, r reads p, s reads nothing cyclic
        let graph = graph_of(&[("p", "q"), ("q", "p"), ("r", "p + s"), ("s", "1")]);
        assert_eq!(
            cyclic_references(&graph),
            BTreeSet::from(["p".to_string(), "q".to_string()])
        );
    }

    #[test]
    fn test_cyclic_references_overlapping_cycles() {
        let graph = graph_of(&[("a", "b"), ("b", "a + c"), ("c", "b")]);
        assert_eq!(
            cyclic_references(&graph),
            BTreeSet::from(["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_order_after_pruning_cycles() {
        let graph = graph_of(&[("p", "q"), ("q", "p"), ("r", "p + s"), ("s", "1")]);
        let pruned = graph.without(&cyclic_references(&graph));
        let order = topological_order(&pruned).unwrap();
        assert_eq!(order, vec!["s".to_string(), "r".to_string()]);
    }

    #[test]
    fn test_chain_order() {
        let graph = graph_of(&[("d", "c"), ("c", "b"), ("b", "a")]);
        let order = topological_order(&graph).unwrap();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_order_respects_every_edge() {
        let graph = graph_of(&[
            ("total", "sub + tax"),
            ("tax", "sub * rate"),
            ("sub", "SUM(x, y)"),
            ("other", "1"),
        ]);
        let order = topological_order(&graph).unwrap();
        assert_eq!(order.len(), graph.all_nodes().len());
        for node in graph.nodes() {
            for precedent in graph.dependencies(node) {
                assert!(position(&order, precedent) < position(&order, node));
            }
        }
        assert_eq!(topological_order(&graph), Some(order));
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let mut graph = DependencyGraph::new();
        for i in 1..20_000 {
            let name = format!("n{}", i);
            graph.declare(name.clone());
            graph.add_dependency(&name, &format!("n{}", i - 1));
        }
        assert_eq!(detect_cycle(&graph), None);
        assert!(cyclic_references(&graph).is_empty());
        let order = topological_order(&graph).unwrap();
        assert_eq!(order.first().map(String::as_str), Some("n0"));
        assert_eq!(order.last().map(String::as_str), Some("n19999"));
    }

    #[test]
    fn test_long_ring_is_one_cycle() {
        let mut graph = DependencyGraph::new();
        let count = 20_000;
        for i in 0..count {
            let name = format!("n{}", i);
            graph.declare(name.clone());
            graph.add_dependency(&name, &format!("n{}", (i + 1) % count));
        }
        // A tail reading the ring is not part of it
        graph.declare("tail");
        graph.add_dependency("tail", "n0");

        let cyclic = cyclic_references(&graph);
        assert_eq!(cyclic.len(), count);
        assert!(!cyclic.contains("tail"));
        assert_eq!(detect_cycle(&graph).map(|path| path.len()), Some(count));
    }

    #[test]
    fn test_cyclic_references_separate_components() {
        let graph = graph_of(&[
            ("a", "b"),
            ("b", "a"),
            ("c", "c"),
            ("d", "a + c"),
            ("e", "f"),
            ("f", "g + e"),
            ("g", "1"),
        ]);
        assert_eq!(
            cyclic_references(&graph),
            ["a", "b", "c", "e", "f"]
                .into_iter()
                .map(String::from)
                .collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn test_bind_fields_matches_build_graph() {
        let fields = vec![
            FieldDefinition::number("a", Some(1.0)),
            FieldDefinition::formula("b", "a +"),
            FieldDefinition::frame("group", vec![FieldDefinition::formula("c", "a * 2")]),
            FieldDefinition::formula("a", "99"),
        ];
        let (graph, bound) = bind_fields(&fields);
        assert_eq!(graph, build_graph(&fields));

        let names: Vec<&str> = bound.iter().map(|b| b.reference).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(bound[0].formula.is_none());
        assert!(matches!(bound[1].formula, Some(Err(_))));
        assert!(matches!(bound[2].formula, Some(Ok(_))));
    }
}
