//! Parallel infrastructure: data-parallel array passes and the communicator
//! façade for cross-rank collectives.

pub mod arrays;
pub mod communicator;
