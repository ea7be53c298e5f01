// Dependency Graph (DAG)
// Named nodes in document order, dependency edges, batch topological sort
// and minimal cycle reporting

use crate::graph::error::{CycleError, ResolveError};

use std::collections::{BTreeSet, HashMap, VecDeque};

/// Directed graph where an edge from B to A means B waits for A
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// What the nodes are, for error messages: "stages", "jobs of stage 'Build'"
    scope: String,
    /// Node names in insertion (document) order
    names: Vec<String>,
    /// Lowercased name to index; names are case-insensitive
    indices: HashMap<String, usize>,
    /// Dependencies of each node
    dependencies: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..Self::default()
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(&name.to_ascii_lowercase())
    }

    /// Add a node; names must be unique within the graph
    pub fn add_node(&mut self, name: impl Into<String>) -> Result<(), ResolveError> {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        if self.indices.contains_key(&key) {
            return Err(ResolveError::DuplicateName {
                scope: self.scope.clone(),
                name,
            });
        }
        self.indices.insert(key, self.names.len());
        self.names.push(name);
        self.dependencies.push(BTreeSet::new());
        Ok(())
    }

    /// Record that `node` waits for `dependency`
    pub fn add_edge(&mut self, node: &str, dependency: &str) -> Result<(), ResolveError> {
        let from = self.index(node, node)?;
        let to = self.index(node, dependency)?;
        self.dependencies[from].insert(to);
        Ok(())
    }

    /// Names `node` waits for, in document order
    pub fn dependencies_of(&self, node: &str) -> Vec<&str> {
        match self.indices.get(&node.to_ascii_lowercase()) {
            Some(&i) => self.dependencies[i].iter().map(|&d| self.names[d].as_str()).collect(),
            None => Vec::new(),
        }
    }

    fn index(&self, node: &str, name: &str) -> Result<usize, ResolveError> {
        self.indices
            .get(&name.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| ResolveError::UnknownDependency {
                scope: self.scope.clone(),
                node: node.to_string(),
                dependency: name.to_string(),
            })
    }

    /// Group nodes into batches: each batch holds every node whose
    /// dependencies all sit in earlier batches, in document order
    pub fn batches(&self) -> Result<Vec<Vec<String>>, CycleError> {
        let mut done = vec![false; self.len()];
        let mut remaining = self.len();
        let mut batches = Vec::new();

        while remaining > 0 {
            let ready: Vec<usize> = (0..self.len())
                .filter(|&i| !done[i] && self.dependencies[i].iter().all(|&d| done[d]))
                .collect();

            if ready.is_empty() {
                return Err(CycleError {
                    scope: self.scope.clone(),
                    cycle: self.minimal_cycle(&done),
                });
            }

            for &i in &ready {
                done[i] = true;
            }
            remaining -= ready.len();
            batches.push(ready.into_iter().map(|i| self.names[i].clone()).collect());
        }

        Ok(batches)
    }

    /// Shortest cycle among the unfinished nodes; ties go to the cycle
    /// starting earliest in document order
    fn minimal_cycle(&self, done: &[bool]) -> Vec<String> {
        let mut best: Option<Vec<usize>> = None;

        for start in (0..self.len()).filter(|&i| !done[i]) {
            if let Some(cycle) = self.shortest_cycle_through(start, done) {
                if best.as_ref().map_or(true, |b| cycle.len() < b.len()) {
                    best = Some(cycle);
                }
            }
        }

        best.unwrap_or_default()
            .into_iter()
            .map(|i| self.names[i].clone())
            .collect()
    }

    /// Breadth-first search along dependency edges back to `start`
    fn shortest_cycle_through(&self, start: usize, done: &[bool]) -> Option<Vec<usize>> {
        let mut parent: HashMap<usize, usize> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            for &next in &self.dependencies[node] {
                if done[next] {
                    continue;
                }
                if next == start {
                    let mut path = vec![node];
                    let mut current = node;
                    while current != start {
                        current = parent[&current];
                        path.push(current);
                    }
                    path.reverse();
                    return Some(path);
                }
                if next != start && !parent.contains_key(&next) {
                    parent.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(nodes: &[(&str, &[&str])]) -> DependencyGraph {
        let mut graph = DependencyGraph::new("stages");
        for (name, _) in nodes {
            graph.add_node(*name).unwrap();
        }
        for (name, deps) in nodes {
            for dep in *deps {
                graph.add_edge(name, dep).unwrap();
            }
        }
        graph
    }

    #[test]
    fn test_linear_chain() {
        let g = graph(&[("Build", &[]), ("Test", &["Build"]), ("Deploy", &["Test"])]);
        assert_eq!(
            g.batches().unwrap(),
            vec![vec!["Build"], vec!["Test"], vec!["Deploy"]]
        );
    }

    #[test]
    fn test_diamond_batches_in_document_order() {
        let g = graph(&[
            ("Build", &[]),
            ("UnitTest", &["Build"]),
            ("IntegrationTest", &["Build"]),
            ("Deploy", &["IntegrationTest", "UnitTest"]),
        ]);
        assert_eq!(
            g.batches().unwrap(),
            vec![
                vec!["Build"],
                vec!["UnitTest", "IntegrationTest"],
                vec!["Deploy"]
            ]
        );
    }

    #[test]
    fn test_independent_nodes_share_a_batch() {
        let g = graph(&[("Job3", &["Job1", "Job2"]), ("Job1", &[]), ("Job2", &[])]);
        assert_eq!(g.batches().unwrap(), vec![vec!["Job1", "Job2"], vec!["Job3"]]);
    }

    #[test]
    fn test_two_node_cycle() {
        let g = graph(&[("A", &["B"]), ("B", &["A"])]);
        let err = g.batches().unwrap_err();
        assert_eq!(err.cycle, vec!["A", "B"]);
    }

    #[test]
    fn test_self_reference() {
        let g = graph(&[("A", &["A"])]);
        assert_eq!(g.batches().unwrap_err().cycle, vec!["A"]);
    }

    #[test]
    fn test_minimal_cycle_is_reported() {
        // A -> B -> C -> A and C -> D -> C; the shorter loop is C/D
        let g = graph(&[
            ("Setup", &[]),
            ("A", &["B", "Setup"]),
            ("B", &["C"]),
            ("C", &["A", "D"]),
            ("D", &["C"]),
            ("Report", &["A"]),
        ]);
        let err = g.batches().unwrap_err();
        assert_eq!(err.cycle, vec!["C", "D"]);
        assert_eq!(err.scope, "stages");
    }

    #[test]
    fn test_unknown_and_duplicate_names() {
        let mut g = DependencyGraph::new("stages");
        g.add_node("Build").unwrap();
        assert!(matches!(
            g.add_node("build"),
            Err(ResolveError::DuplicateName { .. })
        ));
        assert_eq!(
            g.add_edge("Build", "Missing").unwrap_err(),
            ResolveError::UnknownDependency {
                scope: "stages".into(),
                node: "Build".into(),
                dependency: "Missing".into(),
            }
        );
    }

    #[test]
    fn test_names_are_case_insensitive() {
        let mut g = DependencyGraph::new("stages");
        g.add_node("Build").unwrap();
        g.add_node("Test").unwrap();
        g.add_edge("test", "BUILD").unwrap();
        assert_eq!(g.dependencies_of("Test"), vec!["Build"]);
        assert!(g.contains("bUiLd"));
    }

    #[test]
    fn test_empty_graph() {
        assert!(DependencyGraph::new("stages").batches().unwrap().is_empty());
    }
}
