//! Dependency graph derived from a workflow definition.
//!
//! Construction is total: disabled nodes, self-edges, and edges touching
//! unknown or disabled nodes are dropped, and whatever structure remains
//! is kept, isolated nodes included. Validation reports findings instead
//! of failing the build.
//!
//! Iteration order is deterministic everywhere: node storage is keyed by
//! id, ready frontiers are id-ordered, and level contents are sorted, so
//! identical definitions always schedule identically.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, VecDeque};
use std::sync::OnceLock;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use weave_core::NodeId;

use crate::definition::{NodeDefinition, WorkflowDefinition};
use crate::error::{ValidationCode, ValidationError, WorkflowError};

/// One input of a node: where its data comes from.
///
/// Ordered as the connections were declared; a duplicate
/// `(source, handle)` pair collapses to a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRef {
    /// Source node id.
    pub source: NodeId,
    /// Source handle (e.g. `output`, or a condition's `true`/`false`).
    pub handle: String,
}

/// The scope of one parallel branch leaving a fan-out node.
///
/// Branch membership stops at merge points (nodes with more than one
/// predecessor): those belong to no single branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// The fan-out node the branch leaves from.
    pub start: NodeId,
    /// The first node of the branch.
    pub head: NodeId,
    /// All branch members (head included), id-sorted.
    pub nodes: Vec<NodeId>,
}

/// Acyclic dependency graph over the enabled nodes of a workflow.
#[derive(Debug)]
pub struct DependencyGraph {
    nodes: BTreeMap<NodeId, NodeDefinition>,
    graph: DiGraph<NodeId, ()>,
    indices: BTreeMap<NodeId, NodeIndex>,
    inputs: BTreeMap<NodeId, Vec<InputRef>>,
    /// Kept nodes that had at least one declared incoming connection from
    /// a known source, whether or not that source survived the build. A
    /// node whose only predecessor was disabled keeps its incoming
    /// declaration, so it is not a root and validation reports it
    /// unreachable.
    declared_incoming: BTreeSet<NodeId>,
    levels_cache: OnceLock<Vec<Vec<NodeId>>>,
}

impl DependencyGraph {
    /// Build the graph from a definition. Total: never fails.
    #[must_use]
    pub fn from_definition(def: &WorkflowDefinition) -> Self {
        let declared: BTreeSet<&NodeId> = def.nodes.iter().map(|n| &n.id).collect();
        let nodes: BTreeMap<NodeId, NodeDefinition> = def
            .nodes
            .iter()
            .filter(|n| !n.disabled)
            .map(|n| (n.id.clone(), n.clone()))
            .collect();

        let mut graph = DiGraph::new();
        let mut indices = BTreeMap::new();
        for id in nodes.keys() {
            let idx = graph.add_node(id.clone());
            indices.insert(id.clone(), idx);
        }

        let mut inputs: BTreeMap<NodeId, Vec<InputRef>> = BTreeMap::new();
        let mut declared_incoming = BTreeSet::new();
        let mut edge_seen: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();

        for conn in &def.connections {
            let source = &conn.source_node_id;
            let target = &conn.target_node_id;

            if source == target {
                continue;
            }
            if !declared.contains(source) || !declared.contains(target) {
                continue;
            }

            // The declaration counts even when the source was disabled:
            // its target must not be promoted to a root.
            if nodes.contains_key(target) {
                declared_incoming.insert(target.clone());
            }

            let (Some(&src_idx), Some(&dst_idx)) = (indices.get(source), indices.get(target))
            else {
                continue; // one endpoint disabled
            };

            if edge_seen.insert((source.clone(), target.clone())) {
                graph.add_edge(src_idx, dst_idx, ());
            }

            let refs = inputs.entry(target.clone()).or_default();
            let duplicate = refs
                .iter()
                .any(|r| &r.source == source && r.handle == conn.source_handle);
            if !duplicate {
                refs.push(InputRef {
                    source: source.clone(),
                    handle: conn.source_handle.clone(),
                });
            }
        }

        Self {
            nodes,
            graph,
            indices,
            inputs,
            declared_incoming,
            levels_cache: OnceLock::new(),
        }
    }

    /// Number of kept nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph contains the node.
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Look up a kept node definition.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&NodeDefinition> {
        self.nodes.get(id)
    }

    /// Iterate kept nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.nodes.values()
    }

    /// Ordered input records for a node.
    #[must_use]
    pub fn input_refs(&self, id: &NodeId) -> &[InputRef] {
        self.inputs.get(id).map_or(&[], Vec::as_slice)
    }

    /// Nodes with no declared incoming connections, id-sorted.
    #[must_use]
    pub fn entry_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .filter(|id| !self.declared_incoming.contains(*id))
            .cloned()
            .collect()
    }

    /// Nodes with no outgoing edges, id-sorted.
    #[must_use]
    pub fn exit_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .filter(|id| self.out_degree(id) == 0)
            .cloned()
            .collect()
    }

    /// Direct predecessors over kept edges, id-sorted.
    #[must_use]
    pub fn predecessors(&self, id: &NodeId) -> Vec<NodeId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct successors over kept edges, id-sorted.
    #[must_use]
    pub fn successors(&self, id: &NodeId) -> Vec<NodeId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &NodeId, dir: Direction) -> Vec<NodeId> {
        let Some(&idx) = self.indices.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<NodeId> = self
            .graph
            .neighbors_directed(idx, dir)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out
    }

    fn in_degree(&self, id: &NodeId) -> usize {
        self.indices.get(id).map_or(0, |&idx| {
            self.graph.neighbors_directed(idx, Direction::Incoming).count()
        })
    }

    fn out_degree(&self, id: &NodeId) -> usize {
        self.indices.get(id).map_or(0, |&idx| {
            self.graph.neighbors_directed(idx, Direction::Outgoing).count()
        })
    }

    /// Validate the graph: cycles, unreachable nodes, missing type tags.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.kahn_order().is_none() {
            errors.push(ValidationError::new(
                ValidationCode::CycleDetected,
                "workflow graph contains a cycle",
            ));
        }

        for (id, node) in &self.nodes {
            if node.node_type.trim().is_empty() {
                errors.push(ValidationError::for_node(
                    ValidationCode::MissingNodeType,
                    id.clone(),
                    "node has no type tag",
                ));
            }
        }

        if self.node_count() > 1 {
            let reachable = self.reachable_from(&self.entry_nodes());
            for id in self.nodes.keys() {
                if !reachable.contains(id) {
                    errors.push(ValidationError::for_node(
                        ValidationCode::UnreachableNode,
                        id.clone(),
                        "node is not reachable from any root",
                    ));
                }
            }
        }

        errors
    }

    /// Kahn's algorithm with an id-ordered frontier, so ties break
    /// lexicographically.
    pub fn topo_sort(&self) -> Result<Vec<NodeId>, WorkflowError> {
        self.kahn_order().ok_or(WorkflowError::CycleDetected)
    }

    fn kahn_order(&self) -> Option<Vec<NodeId>> {
        let mut in_degree: BTreeMap<&NodeId, usize> = self
            .nodes
            .keys()
            .map(|id| (id, self.in_degree(id)))
            .collect();

        let mut frontier: BinaryHeap<Reverse<&NodeId>> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(id, _)| Reverse(*id))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(id)) = frontier.pop() {
            order.push(id.clone());
            for succ in self.successors(id) {
                let Some((key, _)) = self.nodes.get_key_value(&succ) else {
                    continue;
                };
                if let Some(deg) = in_degree.get_mut(key) {
                    *deg -= 1;
                    if *deg == 0 {
                        frontier.push(Reverse(key));
                    }
                }
            }
        }

        (order.len() == self.nodes.len()).then_some(order)
    }

    /// Partition nodes into levels by longest path from a root.
    ///
    /// Level `k` holds every node whose longest chain of predecessors has
    /// length `k`; the scheduler runs one level at a time. Contents are
    /// id-sorted. The partition is computed once and cached.
    pub fn levels(&self) -> Result<Vec<Vec<NodeId>>, WorkflowError> {
        if let Some(cached) = self.levels_cache.get() {
            return Ok(cached.clone());
        }

        let order = self.topo_sort()?;
        let mut depth: BTreeMap<&NodeId, usize> = BTreeMap::new();
        let mut max_depth = 0;
        for id in &order {
            let d = self
                .predecessors(id)
                .iter()
                .filter_map(|p| depth.get(p).copied())
                .max()
                .map_or(0, |d| d + 1);
            max_depth = max_depth.max(d);
            let key = self.nodes.get_key_value(id).map(|(k, _)| k).unwrap_or(id);
            depth.insert(key, d);
        }

        let mut levels = vec![Vec::new(); if self.nodes.is_empty() { 0 } else { max_depth + 1 }];
        for (id, d) in depth {
            levels[d].push(id.clone());
        }
        for level in &mut levels {
            level.sort();
        }

        Ok(self.levels_cache.get_or_init(|| levels).clone())
    }

    /// Nodes not yet run whose predecessors have all completed, id-sorted.
    #[must_use]
    pub fn parallelizable(&self, completed: &BTreeSet<NodeId>) -> Vec<NodeId> {
        self.nodes
            .keys()
            .filter(|id| !completed.contains(*id))
            .filter(|id| self.predecessors(id).iter().all(|p| completed.contains(p)))
            .cloned()
            .collect()
    }

    /// Restrict the graph to the nodes reachable from `start`.
    ///
    /// Used for partial replay: the sub-graph keeps only edges and input
    /// records whose endpoints both survive the restriction.
    pub fn sub_dag(&self, start: &NodeId) -> Result<Self, WorkflowError> {
        if !self.contains(start) {
            return Err(WorkflowError::UnknownNode(start.clone()));
        }
        let keep = self.reachable_from(std::slice::from_ref(start));

        let nodes: BTreeMap<NodeId, NodeDefinition> = self
            .nodes
            .iter()
            .filter(|(id, _)| keep.contains(*id))
            .map(|(id, n)| (id.clone(), n.clone()))
            .collect();

        let mut graph = DiGraph::new();
        let mut indices = BTreeMap::new();
        for id in nodes.keys() {
            let idx = graph.add_node(id.clone());
            indices.insert(id.clone(), idx);
        }

        let mut inputs: BTreeMap<NodeId, Vec<InputRef>> = BTreeMap::new();
        let mut declared_incoming = BTreeSet::new();
        for (target, refs) in &self.inputs {
            if !keep.contains(target) {
                continue;
            }
            let kept_refs: Vec<InputRef> = refs
                .iter()
                .filter(|r| keep.contains(&r.source))
                .cloned()
                .collect();
            if kept_refs.is_empty() {
                continue;
            }
            declared_incoming.insert(target.clone());
            for r in &kept_refs {
                let (&src_idx, &dst_idx) = (&indices[&r.source], &indices[target]);
                if !graph.contains_edge(src_idx, dst_idx) {
                    graph.add_edge(src_idx, dst_idx, ());
                }
            }
            inputs.insert(target.clone(), kept_refs);
        }

        Ok(Self {
            nodes,
            graph,
            indices,
            inputs,
            declared_incoming,
            levels_cache: OnceLock::new(),
        })
    }

    /// Branch scopes for every fan-out node.
    ///
    /// For each node with more than one outgoing edge, each successor
    /// starts a branch containing the nodes reachable from it up to (and
    /// excluding) merge points. Merge strategies use these scopes to know
    /// which nodes belong to which arm.
    #[must_use]
    pub fn branches(&self) -> Vec<Branch> {
        let mut branches = Vec::new();
        for start in self.nodes.keys() {
            let succs = self.successors(start);
            if succs.len() < 2 {
                continue;
            }
            for head in succs {
                let mut members = BTreeSet::new();
                let mut queue = VecDeque::from([head.clone()]);
                while let Some(id) = queue.pop_front() {
                    let is_merge = self.in_degree(&id) > 1;
                    if is_merge || members.contains(&id) {
                        continue;
                    }
                    members.insert(id.clone());
                    for succ in self.successors(&id) {
                        queue.push_back(succ);
                    }
                }
                branches.push(Branch {
                    start: start.clone(),
                    head,
                    nodes: members.into_iter().collect(),
                });
            }
        }
        branches
    }

    fn reachable_from(&self, roots: &[NodeId]) -> BTreeSet<NodeId> {
        let mut seen: BTreeSet<NodeId> = BTreeSet::new();
        let mut queue: VecDeque<NodeId> = roots
            .iter()
            .filter(|id| self.contains(id))
            .cloned()
            .collect();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            for succ in self.successors(&id) {
                if !seen.contains(&succ) {
                    queue.push_back(succ);
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Connection, NodeDefinition, WorkflowDefinition, WorkflowSettings};
    use pretty_assertions::assert_eq;

    fn workflow(nodes: Vec<NodeDefinition>, connections: Vec<Connection>) -> WorkflowDefinition {
        WorkflowDefinition {
            id: "wf".into(),
            workspace_id: "ws".into(),
            name: "test".into(),
            nodes,
            connections,
            settings: WorkflowSettings::default(),
        }
    }

    fn node(id: &str) -> NodeDefinition {
        NodeDefinition::new(id, "action.set")
    }

    fn ids(raw: &[&str]) -> Vec<NodeId> {
        raw.iter().map(|s| NodeId::new(*s)).collect()
    }

    #[test]
    fn linear_chain_topo_and_levels() {
        let def = workflow(
            vec![node("a"), node("b"), node("c")],
            vec![Connection::new("a", "b"), Connection::new("b", "c")],
        );
        let dag = DependencyGraph::from_definition(&def);

        assert_eq!(dag.topo_sort().unwrap(), ids(&["a", "b", "c"]));
        assert_eq!(
            dag.levels().unwrap(),
            vec![ids(&["a"]), ids(&["b"]), ids(&["c"])]
        );
        assert_eq!(dag.entry_nodes(), ids(&["a"]));
        assert_eq!(dag.exit_nodes(), ids(&["c"]));
    }

    #[test]
    fn diamond_levels_and_parallelizable() {
        let def = workflow(
            vec![node("a"), node("b"), node("c"), node("d")],
            vec![
                Connection::new("a", "b"),
                Connection::new("a", "c"),
                Connection::new("b", "d"),
                Connection::new("c", "d"),
            ],
        );
        let dag = DependencyGraph::from_definition(&def);

        assert_eq!(
            dag.levels().unwrap(),
            vec![ids(&["a"]), ids(&["b", "c"]), ids(&["d"])]
        );

        let completed: BTreeSet<NodeId> = ids(&["a"]).into_iter().collect();
        assert_eq!(dag.parallelizable(&completed), ids(&["b", "c"]));

        let completed: BTreeSet<NodeId> = ids(&["a", "b"]).into_iter().collect();
        assert_eq!(dag.parallelizable(&completed), ids(&["c"]));
    }

    #[test]
    fn topo_ties_break_by_id() {
        let def = workflow(
            vec![node("z"), node("a"), node("m")],
            vec![],
        );
        let dag = DependencyGraph::from_definition(&def);
        assert_eq!(dag.topo_sort().unwrap(), ids(&["a", "m", "z"]));
    }

    #[test]
    fn cycle_fails_topo_and_validation() {
        let def = workflow(
            vec![node("a"), node("b"), node("c")],
            vec![
                Connection::new("a", "b"),
                Connection::new("b", "c"),
                Connection::new("c", "a"),
            ],
        );
        let dag = DependencyGraph::from_definition(&def);

        assert!(matches!(
            dag.topo_sort(),
            Err(WorkflowError::CycleDetected)
        ));
        let errors = dag.validate();
        assert_eq!(errors[0].code, ValidationCode::CycleDetected);
    }

    #[test]
    fn disabled_nodes_and_their_edges_are_dropped() {
        let mut b = node("b");
        b.disabled = true;
        let def = workflow(
            vec![node("a"), b, node("c")],
            vec![Connection::new("a", "b"), Connection::new("b", "c")],
        );
        let dag = DependencyGraph::from_definition(&def);

        assert_eq!(dag.node_count(), 2);
        assert!(!dag.contains(&NodeId::new("b")));
        assert!(dag.predecessors(&NodeId::new("c")).is_empty());
    }

    #[test]
    fn node_behind_disabled_predecessor_is_unreachable() {
        let mut a = node("a");
        a.disabled = true;
        let def = workflow(
            vec![a, node("b"), node("c")],
            vec![Connection::new("a", "b"), Connection::new("b", "c")],
        );
        let dag = DependencyGraph::from_definition(&def);

        // "b" keeps its incoming declaration even though "a" was dropped,
        // so it is not a root and cannot be reached.
        assert!(dag.entry_nodes().is_empty());
        let errors = dag.validate();
        assert!(errors
            .iter()
            .any(|e| e.code == ValidationCode::UnreachableNode
                && e.node_id == Some(NodeId::new("b"))));
    }

    #[test]
    fn self_edges_and_unknown_endpoints_are_discarded() {
        let def = workflow(
            vec![node("a"), node("b")],
            vec![
                Connection::new("a", "a"),
                Connection::new("ghost", "b"),
                Connection::new("a", "b"),
            ],
        );
        let dag = DependencyGraph::from_definition(&def);

        assert_eq!(dag.predecessors(&NodeId::new("a")), Vec::<NodeId>::new());
        assert_eq!(dag.predecessors(&NodeId::new("b")), ids(&["a"]));
        assert_eq!(dag.entry_nodes(), ids(&["a"]));
    }

    #[test]
    fn duplicate_connections_collapse_to_one_input_record() {
        let def = workflow(
            vec![node("a"), node("b")],
            vec![
                Connection::new("a", "b"),
                Connection::new("a", "b"),
                Connection::new("a", "b").with_source_handle("true"),
            ],
        );
        let dag = DependencyGraph::from_definition(&def);

        let refs = dag.input_refs(&NodeId::new("b"));
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].handle, "output");
        assert_eq!(refs[1].handle, "true");
    }

    #[test]
    fn missing_type_tag_is_reported() {
        let mut untyped = node("u");
        untyped.node_type = String::new();
        let def = workflow(vec![untyped], vec![]);
        let dag = DependencyGraph::from_definition(&def);

        let errors = dag.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ValidationCode::MissingNodeType);
    }

    #[test]
    fn single_node_is_never_unreachable() {
        let def = workflow(vec![node("only")], vec![]);
        let dag = DependencyGraph::from_definition(&def);
        assert!(dag.validate().is_empty());
    }

    #[test]
    fn sub_dag_restricts_to_reachable() {
        let def = workflow(
            vec![node("a"), node("b"), node("c"), node("d")],
            vec![
                Connection::new("a", "b"),
                Connection::new("b", "c"),
                Connection::new("d", "c"),
            ],
        );
        let dag = DependencyGraph::from_definition(&def);

        let sub = dag.sub_dag(&NodeId::new("b")).unwrap();
        assert_eq!(sub.node_count(), 2);
        assert!(sub.contains(&NodeId::new("b")));
        assert!(sub.contains(&NodeId::new("c")));
        // The input record from the excluded "d" is filtered out.
        assert_eq!(sub.input_refs(&NodeId::new("c")).len(), 1);
    }

    #[test]
    fn sub_dag_unknown_start_errors() {
        let def = workflow(vec![node("a")], vec![]);
        let dag = DependencyGraph::from_definition(&def);
        assert!(matches!(
            dag.sub_dag(&NodeId::new("nope")),
            Err(WorkflowError::UnknownNode(_))
        ));
    }

    #[test]
    fn branches_stop_at_merge_points() {
        // a fans out to b and c; both arms merge at d.
        let def = workflow(
            vec![node("a"), node("b"), node("c"), node("d"), node("e")],
            vec![
                Connection::new("a", "b"),
                Connection::new("a", "c"),
                Connection::new("b", "d"),
                Connection::new("c", "d"),
                Connection::new("b", "e"),
            ],
        );
        let dag = DependencyGraph::from_definition(&def);

        let branches = dag.branches();
        // Fan-outs: a (b|c) and b (d|e).
        let from_a: Vec<&Branch> = branches
            .iter()
            .filter(|b| b.start == NodeId::new("a"))
            .collect();
        assert_eq!(from_a.len(), 2);

        let arm_b = from_a.iter().find(|b| b.head == NodeId::new("b")).unwrap();
        // d is a merge point, so the arm holds b and its private tail e.
        assert_eq!(arm_b.nodes, ids(&["b", "e"]));

        let arm_c = from_a.iter().find(|b| b.head == NodeId::new("c")).unwrap();
        assert_eq!(arm_c.nodes, ids(&["c"]));
    }

    #[test]
    fn empty_workflow_builds_and_validates() {
        let def = workflow(vec![], vec![]);
        let dag = DependencyGraph::from_definition(&def);
        assert_eq!(dag.node_count(), 0);
        assert!(dag.validate().is_empty());
        assert!(dag.topo_sort().unwrap().is_empty());
        assert!(dag.levels().unwrap().is_empty());
    }
}
