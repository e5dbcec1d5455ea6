#![doc(test(attr(deny(warnings))))]

//! The data model shared by all crates of RDF Federation.
//!
//! Terms and the SPARQL algebra are re-exported from Oxigraph's crates. On top of them, this crate
//! defines [Binding], the unit of data that flows through the join engine.

mod binding;

pub use binding::Binding;

// Re-export some oxrdf types.
pub use oxrdf::{
    BlankNode, BlankNodeRef, GraphName, GraphNameRef, Literal, LiteralRef, NamedNode,
    NamedNodeRef, Quad, QuadRef, Subject, SubjectRef, Term, TermRef, Triple, TripleRef, Variable,
    VariableRef,
};

// Re-export the algebra that the join engine operates on.
pub use spargebra::algebra::{Expression, GraphPattern, PropertyPathExpression};
pub use spargebra::term::{GroundTerm, NamedNodePattern, TermPattern, TriplePattern};
pub use spargebra::Query;
