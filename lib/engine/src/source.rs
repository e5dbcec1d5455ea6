use rdf_federation_model::{
    Binding, GraphName, NamedNode, NamedNodePattern, Quad, Term, TermPattern, TriplePattern,
    Variable,
};
use rustc_hash::FxHashSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::RwLock;

/// The graphs that a triple pattern is matched against.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ActiveGraph {
    /// Only the default graph forms the active graph.
    #[default]
    DefaultGraph,
    /// A single named graph forms the active graph.
    NamedGraph(NamedNode),
    /// Any named graph is part of the active graph. The name of the matching graph is bound to the
    /// variable. This corresponds to `GRAPH ?x { ... }` patterns.
    AnyNamedGraph(Variable),
}

impl ActiveGraph {
    /// Creates the active graph of a `GRAPH` pattern.
    pub fn from_pattern(name: &NamedNodePattern) -> Self {
        match name {
            NamedNodePattern::NamedNode(name) => Self::NamedGraph(name.clone()),
            NamedNodePattern::Variable(variable) => Self::AnyNamedGraph(variable.clone()),
        }
    }

    /// Returns the name pattern of the `GRAPH` pattern that selects this active graph.
    pub fn name_pattern(&self) -> Option<NamedNodePattern> {
        match self {
            ActiveGraph::DefaultGraph => None,
            ActiveGraph::NamedGraph(name) => Some(NamedNodePattern::NamedNode(name.clone())),
            ActiveGraph::AnyNamedGraph(variable) => {
                Some(NamedNodePattern::Variable(variable.clone()))
            }
        }
    }
}

impl Display for ActiveGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ActiveGraph::DefaultGraph => write!(f, "Default Graph"),
            ActiveGraph::NamedGraph(name) => write!(f, "Named Graph {name}"),
            ActiveGraph::AnyNamedGraph(variable) => write!(f, "Any Named Graph {variable}"),
        }
    }
}

type QuadSet = FxHashSet<Quad>;

/// A memory-based quad source.
///
/// Writers copy the quad set if a snapshot still refers to it. Hence, snapshots never observe
/// later modifications.
#[derive(Debug, Default)]
pub struct MemoryQuadSource {
    quads: RwLock<Arc<QuadSet>>,
}

impl MemoryQuadSource {
    /// Creates a new empty [MemoryQuadSource].
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts all `quads` and returns the number of quads that were not yet contained.
    pub async fn extend(&self, quads: impl IntoIterator<Item = Quad>) -> usize {
        let mut guard = self.quads.write().await;
        let set = Arc::make_mut(&mut guard);
        quads.into_iter().map(|quad| set.insert(quad)).filter(|inserted| *inserted).count()
    }

    /// Inserts `quad` and returns whether it was not yet contained.
    pub async fn insert(&self, quad: Quad) -> bool {
        self.extend([quad]).await == 1
    }

    /// Returns the number of quads in the source.
    pub async fn len(&self) -> usize {
        self.quads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Creates a snapshot of this source.
    pub async fn snapshot(&self) -> MemoryQuadSnapshot {
        MemoryQuadSnapshot {
            quads: Arc::clone(&*self.quads.read().await),
        }
    }
}

/// Provides a snapshot view on a [MemoryQuadSource]. Writing to the source does not change the view
/// of the snapshot.
#[derive(Clone, Debug, Default)]
pub struct MemoryQuadSnapshot {
    quads: Arc<QuadSet>,
}

impl MemoryQuadSnapshot {
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Returns the solutions of `pattern` within `graph`.
    pub fn matches<'a>(
        &'a self,
        pattern: &'a TriplePattern,
        graph: &'a ActiveGraph,
    ) -> impl Iterator<Item = Binding> + 'a {
        self.quads
            .iter()
            .filter_map(move |quad| match_quad(pattern, graph, quad))
    }
}

/// Returns the variables that a scan of `pattern` within `graph` binds, in first-seen order.
pub fn pattern_variables(pattern: &TriplePattern, graph: &ActiveGraph) -> Vec<Variable> {
    let mut variables = Vec::new();
    let mut push = |variable: &Variable| {
        if !variables.contains(variable) {
            variables.push(variable.clone());
        }
    };

    if let TermPattern::Variable(variable) = &pattern.subject {
        push(variable);
    }
    if let NamedNodePattern::Variable(variable) = &pattern.predicate {
        push(variable);
    }
    if let TermPattern::Variable(variable) = &pattern.object {
        push(variable);
    }
    if let ActiveGraph::AnyNamedGraph(variable) = graph {
        push(variable);
    }
    variables
}

/// Matches a single quad against `pattern`.
///
/// Blank nodes in the pattern are matched like constants. A variable that occurs multiple times
/// must be bound to the same term at each position.
fn match_quad(pattern: &TriplePattern, graph: &ActiveGraph, quad: &Quad) -> Option<Binding> {
    let mut entries = Vec::with_capacity(4);

    match_term(&pattern.subject, Term::from(quad.subject.clone()), &mut entries)?;
    match &pattern.predicate {
        NamedNodePattern::NamedNode(predicate) => {
            if predicate != &quad.predicate {
                return None;
            }
        }
        NamedNodePattern::Variable(variable) => {
            bind(&mut entries, variable, Term::from(quad.predicate.clone()))?;
        }
    }
    match_term(&pattern.object, quad.object.clone(), &mut entries)?;

    match (graph, &quad.graph_name) {
        (ActiveGraph::DefaultGraph, GraphName::DefaultGraph) => {}
        (ActiveGraph::NamedGraph(expected), GraphName::NamedNode(actual))
            if expected == actual => {}
        (ActiveGraph::AnyNamedGraph(variable), GraphName::NamedNode(name)) => {
            bind(&mut entries, variable, Term::from(name.clone()))?;
        }
        (ActiveGraph::AnyNamedGraph(variable), GraphName::BlankNode(name)) => {
            bind(&mut entries, variable, Term::from(name.clone()))?;
        }
        _ => return None,
    }

    Some(Binding::new(entries))
}

fn match_term(
    pattern: &TermPattern,
    term: Term,
    entries: &mut Vec<(Variable, Term)>,
) -> Option<()> {
    match pattern {
        TermPattern::Variable(variable) => bind(entries, variable, term),
        _ => (TermPattern::from(term) == *pattern).then_some(()),
    }
}

fn bind(entries: &mut Vec<(Variable, Term)>, variable: &Variable, term: Term) -> Option<()> {
    match entries.iter().find(|(v, _)| v == variable) {
        Some((_, existing)) => (existing == &term).then_some(()),
        None => {
            entries.push((variable.clone(), term));
            Some(())
        }
    }
}
