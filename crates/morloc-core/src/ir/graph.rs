//! The manifold reference graph.

use std::collections::BTreeSet;

use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

use super::types::{Atom, Manifold, Type};
use crate::error::{Error, Result};

/// Validated, immutable manifold graph.
///
/// Edges go from the referenced manifold (producer) to the manifold that
/// calls it (consumer). Inputs, validation predicates, fail actions and
/// hooks all count as references.
#[derive(Debug)]
pub struct ManifoldGraph {
    /// The directed graph; node weights index into `manifolds`
    graph: DiGraph<usize, ()>,
    /// Manifold id to node index mapping
    node_indices: FxHashMap<String, NodeIndex>,
    /// Manifolds in declaration order
    manifolds: Vec<Manifold>,
}

impl ManifoldGraph {
    /// Build and validate a graph.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Two manifolds share an id
    /// - A reference does not resolve
    /// - A referenced manifold needs more parameters than its caller can forward
    /// - A predicate does not return `Bool`, or a fallback returns the wrong type
    /// - The references form a cycle
    pub fn new(manifolds: Vec<Manifold>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut node_indices = FxHashMap::default();

        for (i, m) in manifolds.iter().enumerate() {
            let idx = graph.add_node(i);
            if node_indices.insert(m.id.clone(), idx).is_some() {
                return Err(Error::InvalidManifold {
                    mid: m.id.clone(),
                    message: "duplicate manifold id".to_string(),
                });
            }
        }

        let mut engine = Self {
            graph,
            node_indices,
            manifolds,
        };
        engine.resolve_references()?;
        engine.detect_cycles()?;

        Ok(engine)
    }

    /// Check every reference and add its edge.
    fn resolve_references(&mut self) -> Result<()> {
        let mut edges_to_add = Vec::new();

        for m in &self.manifolds {
            for mid in m.references() {
                let Some(&producer) = self.node_indices.get(mid) else {
                    return Err(Error::ManifoldNotFound(format!(
                        "manifold {} refers to {mid}, which does not exist",
                        m.id
                    )));
                };
                let callee = &self.manifolds[self.graph[producer]];

                // Callees receive the caller's parameters followed by its uid
                if callee.arity > m.arity + 1 {
                    return Err(Error::InvalidManifold {
                        mid: m.id.clone(),
                        message: format!(
                            "{} takes {} parameters but only {} can be forwarded",
                            callee.id,
                            callee.arity,
                            m.arity + 1
                        ),
                    });
                }

                edges_to_add.push((producer, self.node_indices[&m.id]));
            }

            for check in &m.checks {
                let callee = self.get(check).map(Manifold::output);
                if callee != Some(&Type::Atom(Atom::Bool)) {
                    return Err(Error::InvalidManifold {
                        mid: m.id.clone(),
                        message: format!("validation predicate {check} must return Bool"),
                    });
                }
            }

            if let Some(fallback) = &m.fail.fallback {
                let ty = self.get(fallback).map(Manifold::output);
                if !m.is_void() && ty != Some(m.output()) {
                    return Err(Error::InvalidManifold {
                        mid: m.id.clone(),
                        message: format!("fallback {fallback} must return {}", m.output()),
                    });
                }
            }
        }

        for (producer, consumer) in edges_to_add {
            self.graph.add_edge(producer, consumer, ());
        }

        Ok(())
    }

    /// Detect cycles, self references included.
    fn detect_cycles(&self) -> Result<()> {
        use petgraph::algo::kosaraju_scc;

        for scc in kosaraju_scc(&self.graph) {
            let self_loop = scc.len() == 1 && self.graph.contains_edge(scc[0], scc[0]);
            if scc.len() > 1 || self_loop {
                let names: Vec<&str> = scc
                    .iter()
                    .map(|&idx| self.manifolds[self.graph[idx]].id.as_str())
                    .collect();

                return Err(Error::CyclicDependency(format!(
                    "{} → {}",
                    names.join(" → "),
                    names[0]
                )));
            }
        }

        Ok(())
    }

    /// Get a manifold by id.
    pub fn get(&self, mid: &str) -> Option<&Manifold> {
        self.node_indices
            .get(mid)
            .map(|&idx| &self.manifolds[self.graph[idx]])
    }

    /// Get a manifold by id, failing if it does not exist.
    pub fn manifold(&self, mid: &str) -> Result<&Manifold> {
        self.get(mid)
            .ok_or_else(|| Error::ManifoldNotFound(mid.to_string()))
    }

    /// All manifolds in declaration order.
    pub fn manifolds(&self) -> impl Iterator<Item = &Manifold> {
        self.manifolds.iter()
    }

    /// Manifolds implemented in `lang`, in declaration order.
    pub fn in_language<'a>(&'a self, lang: &'a str) -> impl Iterator<Item = &'a Manifold> {
        self.manifolds.iter().filter(move |m| m.lang == lang)
    }

    /// Every language used by the program.
    pub fn languages(&self) -> BTreeSet<&str> {
        self.manifolds.iter().map(|m| m.lang.as_str()).collect()
    }

    /// Whether any manifold requests caching.
    pub fn uses_cache(&self) -> bool {
        self.manifolds.iter().any(|m| m.cache.is_some())
    }

    /// Get the number of manifolds.
    pub fn len(&self) -> usize {
        self.manifolds.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.manifolds.is_empty()
    }
}
