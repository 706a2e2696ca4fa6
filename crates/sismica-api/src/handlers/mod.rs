//! HTTP handlers for sismica-api.

pub mod health;
pub mod process;
pub mod tasks;

pub use health::health;
pub use process::process_single;
pub use tasks::enqueue_tasks;
