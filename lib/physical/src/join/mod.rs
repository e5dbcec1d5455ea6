mod bind;
mod coefficients;
mod config;
mod entry;
mod hash;
mod mediator;
mod nested_loop;
mod optional;
mod sequential;
mod smallest;
mod strategy;
mod substitution;
mod trivial;

pub use bind::{BindJoin, BindOrder, OptionalBindJoin};
pub use coefficients::{CoefficientWeights, JoinCoefficients};
pub use config::{JoinConfig, DEFAULT_BIND_JOIN_BUFFER_SIZE};
pub use entry::{JoinAction, JoinEntry};
pub use hash::SymmetricHashJoin;
pub use mediator::{default_strategies, JoinMediator, JoinSelection};
pub use nested_loop::{NestedLoopJoin, OptionalNestedLoopJoin};
pub use sequential::SequentialJoin;
pub use smallest::{select_smallest_pair, SmallestFirstJoin};
pub use strategy::{JoinProperties, PhysicalJoin};
pub use substitution::{combine_operations, substitute};
pub use trivial::{NoneJoin, SingleJoin};
