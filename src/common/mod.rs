pub mod config;
pub mod logging;
pub mod output;
pub mod payload;
pub mod progress;
pub mod types;
pub mod utils;

pub use config::*;
pub use logging::*;
pub use output::write_report;
pub use payload::Payload;
pub use progress::create_count_progress_bar;
pub use types::*;
pub use utils::*;
