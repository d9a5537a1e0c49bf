pub mod dataset;
pub mod geometry;
pub mod job;
pub mod remote;
pub mod session;
pub mod utils;
pub mod workflow;
