//! Turning a resolved version profile into a runnable Java command.

pub mod arguments;
pub mod classpath;
pub mod natives;
pub mod types;

pub use arguments::LaunchPlanBuilder;
pub use natives::{NativesProvider, ZipNativesProvider};
pub use types::{LaunchOptions, LaunchPlan, Session};
