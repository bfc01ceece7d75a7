pub mod query;

pub use query::{run_capability, run_capability_async};
