//! Client side of the remote compute platform.

pub mod remote_error;
pub mod remote_store;
pub mod rest_store;
pub mod retrying_store;
pub mod simulated_store;
