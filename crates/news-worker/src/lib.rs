pub mod poller;
pub mod retry;

pub use poller::{run, WorkerOptions};
