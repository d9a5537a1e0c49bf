pub mod computation;
pub mod parameters;
pub mod workflow;
