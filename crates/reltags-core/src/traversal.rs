//! Graph traversal algorithms

use crate::connection::{Connection, ConnectionType, Node};
use crate::query::SearchOptions;
use std::collections::{HashMap, HashSet, VecDeque};

/// Read access to a tag graph's adjacency
pub trait Adjacency {
    /// Connections stored at `node`, each with `source == node`
    fn connections_of<'a>(&'a self, node: &Node) -> Vec<&'a Connection>;

    /// Whether `node` is present in the graph
    fn contains(&self, node: &Node) -> bool;

    fn case_sensitive(&self) -> bool;
}

/// Traversal statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub nodes_visited: usize,
    pub edges_traversed: usize,
    pub path_found: bool,
}

/// Graph traversal engine
pub struct TraversalEngine;

impl TraversalEngine {
    /// Unweighted shortest path from `start` to `target`, ignoring edge direction.
    ///
    /// Returns `None` when either node is missing or they are disconnected.
    pub fn shortest_path<G: Adjacency>(graph: &G, start: &Node, target: &Node) -> Option<Vec<Node>> {
        if !graph.contains(start) || !graph.contains(target) {
            return None;
        }
        if start == target {
            return Some(vec![start.clone()]);
        }

        let mut visited: HashSet<Node> = HashSet::new();
        let mut parent: HashMap<Node, Node> = HashMap::new();
        let mut queue: VecDeque<Node> = VecDeque::new();
        let mut stats = TraversalStats::default();

        visited.insert(start.clone());
        queue.push_back(start.clone());

        while let Some(current) = queue.pop_front() {
            stats.nodes_visited += 1;

            for conn in graph.connections_of(&current) {
                stats.edges_traversed += 1;
                let next = conn.target();

                if !visited.insert(next.clone()) {
                    continue;
                }
                parent.insert(next.clone(), current.clone());

                if next == target {
                    stats.path_found = true;
                    break;
                }
                queue.push_back(next.clone());
            }

            if stats.path_found {
                break;
            }
        }

        tracing::debug!(
            "BFS from {} to {}: visited {} nodes, traversed {} edges, found={}",
            start,
            target,
            stats.nodes_visited,
            stats.edges_traversed,
            stats.path_found
        );

        stats
            .path_found
            .then(|| Self::reconstruct_path(start, target, &parent))
    }

    /// Depth-first search for everything below `start`, keyed by node with
    /// the first path found to it (the path starts at `start`).
    ///
    /// From a tag, follows connections of type `options.direction` plus every
    /// tag-entity connection. Entities are leaves. From an entity, fans out to
    /// every tag it is connected to. The start node itself is never a key.
    pub fn descendants<G: Adjacency>(
        graph: &G,
        start: &Node,
        options: &SearchOptions,
    ) -> HashMap<Node, Vec<Node>> {
        let mut results: HashMap<Node, Vec<Node>> = HashMap::new();
        if !graph.contains(start) {
            return results;
        }

        let case_sensitive = graph.case_sensitive();
        let mut visited: HashSet<Node> = HashSet::new();
        let mut stack: Vec<(Node, Vec<Node>)> = Vec::new();
        let mut stats = TraversalStats::default();

        match start {
            Node::Tag(_) => stack.push((start.clone(), vec![start.clone()])),
            Node::Entity(_) => {
                visited.insert(start.clone());
                for conn in graph.connections_of(start) {
                    let tag = conn.target().clone();
                    stack.push((tag.clone(), vec![start.clone(), tag]));
                }
            }
        }

        while let Some((node, path)) = stack.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            stats.nodes_visited += 1;

            if let Node::Tag(name) = &node {
                if path.len() > 1
                    && options.include_tags
                    && options.tag_matches(name, case_sensitive)
                {
                    results.entry(node.clone()).or_insert_with(|| path.clone());
                }
            }

            for conn in graph.connections_of(&node) {
                stats.edges_traversed += 1;
                let child = conn.target();
                let kind = conn.connection_type();

                if visited.contains(child)
                    || (kind != options.direction && kind != ConnectionType::ToEnt)
                {
                    continue;
                }

                let mut child_path = path.clone();
                child_path.push(child.clone());

                match child {
                    Node::Tag(_) => stack.push((child.clone(), child_path)),
                    Node::Entity(_) => {
                        if options.include_entities {
                            results.entry(child.clone()).or_insert(child_path);
                        }
                    }
                }
            }
        }

        tracing::debug!(
            "Descendant search from {} ({}): visited {} nodes, traversed {} edges, {} results",
            start,
            options.direction,
            stats.nodes_visited,
            stats.edges_traversed,
            results.len()
        );

        results
    }

    /// Reconstruct path from parent map
    fn reconstruct_path(start: &Node, end: &Node, parent: &HashMap<Node, Node>) -> Vec<Node> {
        let mut nodes = vec![end.clone()];
        let mut current = end;

        while current != start {
            match parent.get(current) {
                Some(prev) => {
                    nodes.push(prev.clone());
                    current = prev;
                }
                None => break,
            }
        }

        nodes.reverse();
        nodes
    }
}
