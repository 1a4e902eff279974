//! Small directed-graph utilities used for import and package analysis.
//!
//! - [`DagChecker`] reports strongly connected components (cycles) using an
//!   iterative Tarjan walk, so deep import chains cannot overflow the stack.
//! - [`DirectedAcyclicGraph`] orders nodes dependencies-first and answers
//!   reachability queries.
//!
//! Both take a node list plus an edge function and resolve nodes to dense
//! indices once; edge targets missing from the node list are appended.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

use crate::error::TopologicalOrderError;

#[derive(Debug, Clone)]
struct IndexedGraph<N> {
    nodes: Vec<N>,
    outgoing: Vec<Vec<usize>>,
}

impl<N: Clone + Eq + Hash> IndexedGraph<N> {
    fn build<I, F, E>(nodes: I, edges: F) -> Self
    where
        I: IntoIterator<Item = N>,
        F: Fn(&N) -> E,
        E: IntoIterator<Item = N>,
    {
        let mut ordered: Vec<N> = Vec::new();
        let mut index: HashMap<N, usize> = HashMap::new();
        for node in nodes {
            if !index.contains_key(&node) {
                index.insert(node.clone(), ordered.len());
                ordered.push(node);
            }
        }

        let mut outgoing: Vec<Vec<usize>> = Vec::new();
        let mut next = 0;
        while next < ordered.len() {
            let mut targets = Vec::new();
            for target in edges(&ordered[next]) {
                let id = match index.get(&target) {
                    Some(id) => *id,
                    None => {
                        let id = ordered.len();
                        index.insert(target.clone(), id);
                        ordered.push(target);
                        id
                    }
                };
                if !targets.contains(&id) {
                    targets.push(id);
                }
            }
            outgoing.push(targets);
            next += 1;
        }

        Self {
            nodes: ordered,
            outgoing,
        }
    }

    fn incoming(&self) -> Vec<Vec<usize>> {
        let mut incoming = vec![Vec::new(); self.nodes.len()];
        for (source, targets) in self.outgoing.iter().enumerate() {
            for &target in targets {
                incoming[target].push(source);
            }
        }
        incoming
    }
}

// ============================================================================
// Cycle detection
// ============================================================================

#[derive(Debug, Clone)]
pub struct DagChecker<N> {
    graph: IndexedGraph<N>,
}

impl<N: Clone + Eq + Hash> DagChecker<N> {
    pub fn new<I, F, E>(nodes: I, edges: F) -> Self
    where
        I: IntoIterator<Item = N>,
        F: Fn(&N) -> E,
        E: IntoIterator<Item = N>,
    {
        Self {
            graph: IndexedGraph::build(nodes, edges),
        }
    }

    /// Every strongly connected component with more than one node, or with a
    /// single node that has an edge to itself. Nodes within a component are
    /// listed in the order the walk discovered them.
    pub fn check(&self) -> Vec<Vec<N>> {
        let n = self.graph.nodes.len();
        let adjacency = &self.graph.outgoing;
        let mut index_of: Vec<Option<usize>> = vec![None; n];
        let mut lowlink = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut next_index = 0usize;
        let mut cycles = Vec::new();

        for start in 0..n {
            if index_of[start].is_some() {
                continue;
            }
            index_of[start] = Some(next_index);
            lowlink[start] = next_index;
            next_index += 1;
            stack.push(start);
            on_stack[start] = true;

            // (node, next edge to visit)
            let mut call_stack: Vec<(usize, usize)> = vec![(start, 0)];
            while let Some(frame) = call_stack.last_mut() {
                let v = frame.0;
                if frame.1 < adjacency[v].len() {
                    let w = adjacency[v][frame.1];
                    frame.1 += 1;
                    match index_of[w] {
                        None => {
                            index_of[w] = Some(next_index);
                            lowlink[w] = next_index;
                            next_index += 1;
                            stack.push(w);
                            on_stack[w] = true;
                            call_stack.push((w, 0));
                        }
                        Some(w_index) if on_stack[w] => {
                            lowlink[v] = lowlink[v].min(w_index);
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                call_stack.pop();
                if let Some(&(parent, _)) = call_stack.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if Some(lowlink[v]) != index_of[v] {
                    continue;
                }

                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                if component.len() > 1 || adjacency[v].contains(&v) {
                    component.reverse();
                    cycles.push(component.into_iter().map(|i| self.graph.nodes[i].clone()).collect());
                }
            }
        }

        cycles
    }
}

// ============================================================================
// Ordering and reachability
// ============================================================================

#[derive(Debug, Clone)]
pub struct DirectedAcyclicGraph<N> {
    graph: IndexedGraph<N>,
    incoming: Vec<Vec<usize>>,
    index: HashMap<N, usize>,
}

impl<N: Clone + Eq + Hash> DirectedAcyclicGraph<N> {
    pub fn new<I, F, E>(nodes: I, edges: F) -> Self
    where
        I: IntoIterator<Item = N>,
        F: Fn(&N) -> E,
        E: IntoIterator<Item = N>,
    {
        let graph = IndexedGraph::build(nodes, edges);
        let incoming = graph.incoming();
        let index = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.clone(), i))
            .collect();
        Self {
            graph,
            incoming,
            index,
        }
    }

    pub fn nodes(&self) -> &[N] {
        &self.graph.nodes
    }

    /// Every node after all of the nodes its edges point to. Ties keep the
    /// input order.
    pub fn topological_order(&self) -> Result<Vec<N>, TopologicalOrderError> {
        let n = self.graph.nodes.len();
        let mut pending: Vec<usize> = self.graph.outgoing.iter().map(Vec::len).collect();
        let mut ready: VecDeque<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = ready.pop_front() {
            order.push(self.graph.nodes[node].clone());
            for &dependent in &self.incoming[node] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.push_back(dependent);
                }
            }
        }

        if order.len() == n {
            Ok(order)
        } else {
            Err(TopologicalOrderError::Cycle {
                remaining: n - order.len(),
            })
        }
    }

    /// Weakly connected components, each in input order.
    pub fn disjoint_graphs(&self) -> Vec<Vec<N>> {
        let n = self.graph.nodes.len();
        let mut component_of: Vec<Option<usize>> = vec![None; n];
        let mut components: Vec<Vec<usize>> = Vec::new();

        for start in 0..n {
            if component_of[start].is_some() {
                continue;
            }
            let id = components.len();
            let mut members = Vec::new();
            let mut queue = VecDeque::from([start]);
            component_of[start] = Some(id);
            while let Some(node) = queue.pop_front() {
                members.push(node);
                for &next in self.graph.outgoing[node].iter().chain(&self.incoming[node]) {
                    if component_of[next].is_none() {
                        component_of[next] = Some(id);
                        queue.push_back(next);
                    }
                }
            }
            members.sort_unstable();
            components.push(members);
        }

        components
            .into_iter()
            .map(|members| members.into_iter().map(|i| self.graph.nodes[i].clone()).collect())
            .collect()
    }

    /// Every node reachable from `node` through one or more edges. `node`
    /// itself is included only when it sits on a cycle.
    pub fn transitive_nodes(&self, node: &N) -> Vec<N> {
        let Some(&start) = self.index.get(node) else {
            return Vec::new();
        };
        let mut seen: HashSet<usize> = HashSet::new();
        let mut reached = Vec::new();
        let mut queue: VecDeque<usize> = self.graph.outgoing[start].iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            reached.push(self.graph.nodes[next].clone());
            queue.extend(self.graph.outgoing[next].iter().copied());
        }
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges_of(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&&'static str) -> Vec<&'static str> {
        move |node| {
            pairs
                .iter()
                .filter(|(from, _)| from == node)
                .map(|(_, to)| *to)
                .collect()
        }
    }

    #[test]
    fn finds_cycles_and_self_loops() {
        const EDGES: &[(&str, &str)] = &[("a", "b"), ("b", "c"), ("c", "a"), ("d", "d"), ("e", "a")];
        let checker = DagChecker::new(["a", "b", "c", "d", "e"], edges_of(EDGES));
        let mut cycles = checker.check();
        for cycle in &mut cycles {
            cycle.sort_unstable();
        }
        cycles.sort();
        assert_eq!(cycles, vec![vec!["a", "b", "c"], vec!["d"]]);
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        const EDGES: &[(&str, &str)] = &[("a", "b"), ("a", "c"), ("b", "c")];
        assert!(DagChecker::new(["a", "b", "c"], edges_of(EDGES)).check().is_empty());
    }

    #[test]
    fn topological_order_puts_dependencies_first() {
        const EDGES: &[(&str, &str)] = &[("app", "lib"), ("lib", "core"), ("app", "core")];
        let dag = DirectedAcyclicGraph::new(["app", "lib", "core"], edges_of(EDGES));
        assert_eq!(dag.topological_order().expect("acyclic"), vec!["core", "lib", "app"]);
    }

    #[test]
    fn topological_order_rejects_cycles() {
        const EDGES: &[(&str, &str)] = &[("a", "b"), ("b", "a"), ("c", "a")];
        let dag = DirectedAcyclicGraph::new(["a", "b", "c"], edges_of(EDGES));
        assert_eq!(
            dag.topological_order(),
            Err(TopologicalOrderError::Cycle { remaining: 3 })
        );
    }

    #[test]
    fn disjoint_graphs_and_reachability() {
        const EDGES: &[(&str, &str)] = &[("a", "b"), ("c", "b"), ("x", "y")];
        let dag = DirectedAcyclicGraph::new(["a", "b", "c", "x", "y", "z"], edges_of(EDGES));
        assert_eq!(
            dag.disjoint_graphs(),
            vec![vec!["a", "b", "c"], vec!["x", "y"], vec!["z"]]
        );
        assert_eq!(dag.transitive_nodes(&"a"), vec!["b"]);
        assert!(dag.transitive_nodes(&"b").is_empty());
        assert!(dag.transitive_nodes(&"missing").is_empty());
    }

    #[test]
    fn edge_targets_outside_the_node_list_are_added() {
        const EDGES: &[(&str, &str)] = &[("a", "b")];
        let dag = DirectedAcyclicGraph::new(["a"], edges_of(EDGES));
        assert_eq!(dag.nodes(), &["a", "b"]);
    }

    #[test]
    fn deep_chains_do_not_recurse() {
        let n = 50_000usize;
        let checker = DagChecker::new(0..n, |&i| if i + 1 < n { vec![i + 1] } else { vec![0] });
        let cycles = checker.check();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), n);
    }
}
