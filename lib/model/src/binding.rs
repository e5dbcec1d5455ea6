use crate::{Term, Variable};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// An immutable mapping from query variables to RDF terms.
///
/// A variable that is part of a query but has no entry in a [Binding] is *unbound*. Unbound
/// variables are compatible with every value, which is what makes optional joins produce
/// bindings with "holes".
///
/// Bindings are cheap to clone as the entries are shared. The entries are kept sorted by variable
/// name, so two bindings with the same content are always equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Binding {
    entries: Arc<[(Variable, Term)]>,
}

impl Binding {
    /// Creates a [Binding] without any bound variable.
    pub fn empty() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
        }
    }

    /// Creates a new [Binding] from `entries`.
    ///
    /// If a variable occurs multiple times, the first occurrence wins.
    pub fn new(entries: impl IntoIterator<Item = (Variable, Term)>) -> Self {
        let mut entries = entries.into_iter().collect::<Vec<_>>();
        entries.sort_by(|(lhs, _), (rhs, _)| lhs.as_str().cmp(rhs.as_str()));
        entries.dedup_by(|next, previous| next.0 == previous.0);
        Self {
            entries: Arc::from(entries),
        }
    }

    /// Returns the number of bound variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no variable is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the value of `variable`, if it is bound.
    pub fn get(&self, variable: &Variable) -> Option<&Term> {
        self.entries
            .binary_search_by(|(candidate, _)| candidate.as_str().cmp(variable.as_str()))
            .ok()
            .map(|idx| &self.entries[idx].1)
    }

    /// Returns true if `variable` is bound.
    pub fn contains(&self, variable: &Variable) -> bool {
        self.get(variable).is_some()
    }

    /// Iterates over the bound variables and their values, ordered by variable name.
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.entries.iter().map(|(variable, term)| (variable, term))
    }

    /// Iterates over the bound variables, ordered by variable name.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.entries.iter().map(|(variable, _)| variable)
    }

    /// Two bindings are compatible if they agree on every variable that is bound in both.
    pub fn is_compatible(&self, other: &Binding) -> bool {
        let mut lhs = self.entries.iter().peekable();
        let mut rhs = other.entries.iter().peekable();
        while let (Some((lhs_var, lhs_term)), Some((rhs_var, rhs_term))) = (lhs.peek(), rhs.peek())
        {
            match lhs_var.as_str().cmp(rhs_var.as_str()) {
                Ordering::Less => {
                    lhs.next();
                }
                Ordering::Greater => {
                    rhs.next();
                }
                Ordering::Equal => {
                    if lhs_term != rhs_term {
                        return false;
                    }
                    lhs.next();
                    rhs.next();
                }
            }
        }
        true
    }

    /// Joins two bindings. Returns [None] if the bindings are not compatible.
    pub fn merge(&self, other: &Binding) -> Option<Binding> {
        self.is_compatible(other)
            .then(|| self.merge_preferring(other))
    }

    /// Joins two bindings without checking their compatibility. On conflicting values, the
    /// values of `self` are kept.
    #[must_use]
    pub fn merge_preferring(&self, other: &Binding) -> Binding {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }

        let mut result = Vec::with_capacity(self.len() + other.len());
        let mut lhs = self.entries.iter().peekable();
        let mut rhs = other.entries.iter().peekable();
        loop {
            let next = match (lhs.peek(), rhs.peek()) {
                (Some((lhs_var, _)), Some((rhs_var, _))) => {
                    match lhs_var.as_str().cmp(rhs_var.as_str()) {
                        Ordering::Less => lhs.next(),
                        Ordering::Greater => rhs.next(),
                        Ordering::Equal => {
                            rhs.next();
                            lhs.next()
                        }
                    }
                }
                (Some(_), None) => lhs.next(),
                (None, Some(_)) => rhs.next(),
                (None, None) => break,
            };
            result.extend(next.cloned());
        }

        Binding {
            entries: Arc::from(result),
        }
    }

    /// Restricts the binding to `variables`.
    #[must_use]
    pub fn project(&self, variables: &[Variable]) -> Binding {
        let entries = self
            .entries
            .iter()
            .filter(|(variable, _)| variables.contains(variable))
            .cloned()
            .collect::<Vec<_>>();
        Binding {
            entries: Arc::from(entries),
        }
    }

    /// Computes a key from the values of `variables` that can be used for hashing.
    ///
    /// The key is the concatenation of the string forms of the values in the order of
    /// `variables`. Unbound variables contribute an empty segment.
    pub fn hash_key(&self, variables: &[Variable]) -> String {
        let mut key = String::new();
        for variable in variables {
            if let Some(term) = self.get(variable) {
                key.push_str(&term.to_string());
            }
            key.push('\u{0}');
        }
        key
    }
}

impl Default for Binding {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromIterator<(Variable, Term)> for Binding {
    fn from_iter<T: IntoIterator<Item = (Variable, Term)>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl Display for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (idx, (variable, term)) in self.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{variable}: {term}")?;
        }
        f.write_str("}")
    }
}
