#![doc(test(attr(deny(warnings))))]

//! Evaluates SPARQL queries over an in-memory quad source with the join engine of RDF Federation.
//!
//! The [QueryEngine] takes a snapshot of a [MemoryQuadSource] and evaluates a graph pattern with a
//! [MemoryQueryEvaluator]. The evaluator hands every join, including the joins between the triple
//! patterns of a basic graph pattern, to the
//! [JoinMediator](rdf_federation_physical::join::JoinMediator).

mod engine;
mod evaluator;
mod operators;
mod source;

pub use engine::QueryEngine;
pub use evaluator::MemoryQueryEvaluator;
pub use operators::{distinct, project, union, values};
pub use source::{pattern_variables, ActiveGraph, MemoryQuadSnapshot, MemoryQuadSource};
