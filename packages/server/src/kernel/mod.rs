//! Kernel module - server infrastructure and dependencies.

pub mod scheduler;
pub mod server_kernel;
pub mod summarizer;
pub mod telegram_source;
pub mod test_dependencies;
pub mod traits;

pub use scheduler::{FetchScheduler, SchedulerConfig};
pub use server_kernel::{ServerKernel, Stores};
pub use summarizer::HttpSummarizer;
pub use telegram_source::TelegramWebSource;
pub use traits::*;
