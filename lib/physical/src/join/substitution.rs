use rdf_federation_model::{
    Binding, GraphPattern, GroundTerm, NamedNodePattern, Term, TermPattern, TriplePattern,
    Variable,
};

/// Replaces every variable of `pattern` that is bound in `binding` with its value.
///
/// Expressions are kept as they are. The bound variables that are in scope of a pattern with an
/// expression (`FILTER`, `OPTIONAL` with a condition, `BIND`, `ORDER BY`, and aggregates) are
/// joined back as a single `VALUES` row, such that the expression still observes their values.
/// Variables that can only be bound to an IRI (e.g., the name of a `GRAPH` pattern) are only
/// replaced if the bound value is an IRI.
pub fn substitute(pattern: &GraphPattern, binding: &Binding) -> GraphPattern {
    if binding.is_empty() {
        return pattern.clone();
    }

    match pattern {
        GraphPattern::Bgp { patterns } => GraphPattern::Bgp {
            patterns: patterns
                .iter()
                .map(|p| substitute_triple_pattern(p, binding))
                .collect(),
        },
        GraphPattern::Path {
            subject,
            path,
            object,
        } => GraphPattern::Path {
            subject: substitute_term_pattern(subject, binding),
            path: path.clone(),
            object: substitute_term_pattern(object, binding),
        },
        GraphPattern::Join { left, right } => GraphPattern::Join {
            left: Box::new(substitute(left, binding)),
            right: Box::new(substitute(right, binding)),
        },
        GraphPattern::LeftJoin {
            left,
            right,
            expression: None,
        } => GraphPattern::LeftJoin {
            left: Box::new(substitute(left, binding)),
            right: Box::new(substitute(right, binding)),
            expression: None,
        },
        GraphPattern::LeftJoin {
            left,
            right,
            expression: Some(expression),
        } => GraphPattern::LeftJoin {
            left: Box::new(substitute_visible(left, binding)),
            right: Box::new(substitute_visible(right, binding)),
            expression: Some(expression.clone()),
        },
        GraphPattern::Filter { expr, inner } => GraphPattern::Filter {
            expr: expr.clone(),
            inner: Box::new(substitute_visible(inner, binding)),
        },
        GraphPattern::Union { left, right } => GraphPattern::Union {
            left: Box::new(substitute(left, binding)),
            right: Box::new(substitute(right, binding)),
        },
        GraphPattern::Graph { name, inner } => GraphPattern::Graph {
            name: substitute_named_node_pattern(name, binding),
            inner: Box::new(substitute(inner, binding)),
        },
        GraphPattern::Service {
            name,
            inner,
            silent,
        } => GraphPattern::Service {
            name: substitute_named_node_pattern(name, binding),
            inner: Box::new(substitute(inner, binding)),
            silent: *silent,
        },
        GraphPattern::Extend {
            inner,
            variable,
            expression,
        } => GraphPattern::Extend {
            inner: Box::new(substitute_visible(inner, binding)),
            variable: variable.clone(),
            expression: expression.clone(),
        },
        // The right-hand side of MINUS has its own variable scope.
        GraphPattern::Minus { left, right } => GraphPattern::Minus {
            left: Box::new(substitute(left, binding)),
            right: right.clone(),
        },
        GraphPattern::OrderBy { inner, expression } => GraphPattern::OrderBy {
            inner: Box::new(substitute_visible(inner, binding)),
            expression: expression.clone(),
        },
        GraphPattern::Project { inner, variables } => GraphPattern::Project {
            inner: Box::new(substitute(inner, &binding.project(variables))),
            variables: variables.clone(),
        },
        GraphPattern::Distinct { inner } => GraphPattern::Distinct {
            inner: Box::new(substitute(inner, binding)),
        },
        GraphPattern::Reduced { inner } => GraphPattern::Reduced {
            inner: Box::new(substitute(inner, binding)),
        },
        GraphPattern::Slice {
            inner,
            start,
            length,
        } => GraphPattern::Slice {
            inner: Box::new(substitute(inner, binding)),
            start: *start,
            length: *length,
        },
        // Only the grouping keys are visible outside of the group.
        GraphPattern::Group {
            inner,
            variables,
            aggregates,
        } => GraphPattern::Group {
            inner: Box::new(substitute_visible(inner, &binding.project(variables))),
            variables: variables.clone(),
            aggregates: aggregates.clone(),
        },
        GraphPattern::Values {
            variables,
            bindings,
        } => substitute_values(variables, bindings, binding),
        #[allow(unreachable_patterns, reason = "Depends on the enabled spargebra features")]
        _ => pattern.clone(),
    }
}

/// Combines `operations` into a single left-deep join.
///
/// Returns [None] if `operations` is empty.
pub fn combine_operations(
    operations: impl IntoIterator<Item = GraphPattern>,
) -> Option<GraphPattern> {
    operations
        .into_iter()
        .reduce(|left, right| GraphPattern::Join {
            left: Box::new(left),
            right: Box::new(right),
        })
}

/// Substitutes `inner` and joins the bound variables that are in scope of `inner` back as a single
/// `VALUES` row.
///
/// Blank nodes cannot be written into a `VALUES` row. Hence, variables bound to a blank node are
/// not substituted within `inner`.
fn substitute_visible(inner: &GraphPattern, binding: &Binding) -> GraphPattern {
    let binding = binding
        .iter()
        .filter(|(_, term)| to_ground_term(term).is_some())
        .map(|(variable, term)| (variable.clone(), term.clone()))
        .collect::<Binding>();
    let substituted = substitute(inner, &binding);

    let mut in_scope = Vec::new();
    inner.on_in_scope_variable(|variable| {
        if binding.contains(variable) && !in_scope.contains(variable) {
            in_scope.push(variable.clone());
        }
    });
    if in_scope.is_empty() {
        return substituted;
    }

    let row = in_scope
        .iter()
        .map(|variable| binding.get(variable).and_then(to_ground_term))
        .collect();
    GraphPattern::Join {
        left: Box::new(GraphPattern::Values {
            variables: in_scope,
            bindings: vec![row],
        }),
        right: Box::new(substituted),
    }
}

fn to_ground_term(term: &Term) -> Option<GroundTerm> {
    match term {
        Term::NamedNode(node) => Some(GroundTerm::NamedNode(node.clone())),
        Term::Literal(literal) => Some(GroundTerm::Literal(literal.clone())),
        _ => None,
    }
}

/// Keeps the rows that are compatible with `binding` and removes the bound columns.
fn substitute_values(
    variables: &[Variable],
    rows: &[Vec<Option<GroundTerm>>],
    binding: &Binding,
) -> GraphPattern {
    let bound = variables
        .iter()
        .map(|v| binding.get(v))
        .collect::<Vec<_>>();

    let rows = rows
        .iter()
        .filter(|row| {
            row.iter().zip(&bound).all(|(value, bound)| match (value, bound) {
                (Some(value), Some(bound)) => ground_term_matches(value, bound),
                _ => true,
            })
        })
        .map(|row| {
            row.iter()
                .zip(&bound)
                .filter(|(_, bound)| bound.is_none())
                .map(|(value, _)| value.clone())
                .collect()
        })
        .collect();

    GraphPattern::Values {
        variables: variables
            .iter()
            .zip(&bound)
            .filter(|(_, bound)| bound.is_none())
            .map(|(variable, _)| variable.clone())
            .collect(),
        bindings: rows,
    }
}

fn ground_term_matches(value: &GroundTerm, term: &Term) -> bool {
    match (value, term) {
        (GroundTerm::NamedNode(value), Term::NamedNode(term)) => value == term,
        (GroundTerm::Literal(value), Term::Literal(term)) => value == term,
        _ => false,
    }
}

fn substitute_triple_pattern(pattern: &TriplePattern, binding: &Binding) -> TriplePattern {
    TriplePattern {
        subject: substitute_term_pattern(&pattern.subject, binding),
        predicate: substitute_named_node_pattern(&pattern.predicate, binding),
        object: substitute_term_pattern(&pattern.object, binding),
    }
}

fn substitute_term_pattern(pattern: &TermPattern, binding: &Binding) -> TermPattern {
    match pattern {
        TermPattern::Variable(variable) => match binding.get(variable) {
            Some(term) => TermPattern::from(term.clone()),
            None => pattern.clone(),
        },
        _ => pattern.clone(),
    }
}

fn substitute_named_node_pattern(
    pattern: &NamedNodePattern,
    binding: &Binding,
) -> NamedNodePattern {
    match pattern {
        NamedNodePattern::Variable(variable) => match binding.get(variable) {
            Some(Term::NamedNode(node)) => NamedNodePattern::NamedNode(node.clone()),
            _ => pattern.clone(),
        },
        NamedNodePattern::NamedNode(_) => pattern.clone(),
    }
}
