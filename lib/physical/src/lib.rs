#![doc(test(attr(deny(warnings))))]

//! Contains the physical join operators of RDF Federation and the machinery that selects one of
//! them for a given join.
//!
//! A join of N operands is represented as a [join::JoinAction]. The [join::JoinMediator] tests
//! every registered [join::PhysicalJoin] strategy against the action, estimates the cost of the
//! applicable ones, and executes the cheapest. Strategies that decompose N-ary joins call back
//! into the mediator for the smaller joins they create.

pub mod join;
