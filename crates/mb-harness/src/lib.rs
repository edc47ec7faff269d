//! Runtime plumbing around the monitoring core: quota accounting, per-model
//! health, cooperative shutdown and the remote memory sink.

pub mod health;
pub mod memory_sink;
pub mod quota;
pub mod shutdown;
