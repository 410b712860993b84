pub mod boundary;
pub mod errorprop;
pub mod execution;
pub mod gateway;
pub mod lifecycle;
pub mod subprocess;
pub mod termination;

pub use execution::{Execution, InstanceStatus, Item, ItemStatus, LoopInstance, Token, TokenStatus};
