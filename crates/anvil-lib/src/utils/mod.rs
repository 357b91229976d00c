pub mod hash;
pub mod process;
