pub mod calendar_sync;
pub mod status;
pub mod tasks;

pub use tasks::{FanOut, TaskService};
