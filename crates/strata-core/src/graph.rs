use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

/// Parent -> child inheritance edges unioned across a project.
pub struct InheritanceGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

struct Frame {
    node: NodeIndex,
    children: Vec<NodeIndex>,
    next: usize,
    depth: usize,
}

impl InheritanceGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Build from a parent -> children map. Iteration is sorted, so node
    /// order (and therefore the walk) is deterministic.
    pub fn from_edges(edges: &BTreeMap<String, BTreeSet<String>>) -> Self {
        let mut graph = Self::new();
        for (parent, children) in edges {
            for child in children {
                graph.add_edge(parent, child);
            }
        }
        graph
    }

    /// Ensure a type name exists as a node.
    pub fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn add_edge(&mut self, parent: &str, child: &str) {
        let from = self.ensure_node(parent);
        let to = self.ensure_node(child);
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Groups of type names that inherit from each other in a loop, from
    /// Kosaraju's strongly connected components.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        petgraph::algo::kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.iter().any(|&n| self.graph.contains_edge(n, n))
            })
            .map(|scc| {
                let mut names: Vec<String> =
                    scc.iter().map(|&idx| self.graph[idx].clone()).collect();
                names.sort();
                names
            })
            .collect()
    }

    fn sorted_children(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        children.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        children.dedup();
        children
    }

    /// Longest parent -> child chain, in edges.
    ///
    /// The walk starts at every root (no incoming edge) and then at any node
    /// still unvisited, which only happens for rootless cycles. A child that
    /// is already on the current path contributes depth 0. Each node is
    /// expanded once and the stack is explicit, so malformed input can
    /// neither loop forever nor exhaust the call stack.
    pub fn max_depth(&self) -> usize {
        let count = self.graph.node_count();
        if count == 0 {
            return 0;
        }

        let mut starts: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&n| {
                self.graph
                    .neighbors_directed(n, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect();
        starts.extend(self.graph.node_indices());

        let mut memo: Vec<Option<usize>> = vec![None; count];
        let mut on_path = vec![false; count];
        let mut best = 0;

        for start in starts {
            if let Some(depth) = memo[start.index()] {
                best = best.max(depth);
                continue;
            }

            on_path[start.index()] = true;
            let mut stack = vec![Frame {
                node: start,
                children: self.sorted_children(start),
                next: 0,
                depth: 0,
            }];

            while let Some(top) = stack.last_mut() {
                if top.next < top.children.len() {
                    let child = top.children[top.next];
                    top.next += 1;
                    if on_path[child.index()] {
                        top.depth = top.depth.max(1);
                    } else if let Some(depth) = memo[child.index()] {
                        top.depth = top.depth.max(depth + 1);
                    } else {
                        on_path[child.index()] = true;
                        let children = self.sorted_children(child);
                        stack.push(Frame {
                            node: child,
                            children,
                            next: 0,
                            depth: 0,
                        });
                    }
                    continue;
                }

                let Some(done) = stack.pop() else { break };
                on_path[done.node.index()] = false;
                memo[done.node.index()] = Some(done.depth);
                if let Some(parent) = stack.last_mut() {
                    parent.depth = parent.depth.max(done.depth + 1);
                }
            }

            if let Some(depth) = memo[start.index()] {
                best = best.max(depth);
            }
        }

        best
    }
}

impl Default for InheritanceGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the inheritance depth of a parent -> children map.
pub fn inheritance_depth(edges: &BTreeMap<String, BTreeSet<String>>) -> usize {
    InheritanceGraph::from_edges(edges).max_depth()
}
