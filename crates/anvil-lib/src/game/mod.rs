pub mod installer;
pub mod launcher;
pub mod maven;
pub mod placeholders;
pub mod store;
pub mod version;

pub use maven::Coordinate;
pub use store::LibraryStore;
pub use version::{VersionDocument, VersionProfile, VersionStore};
