pub mod loader;
pub mod parser;
pub mod roles;

pub use loader::{LocatorLoader, LocatorLoaderBuilder};
pub use parser::LocatorParser;
pub use roles::{Directive, LocatorSet, Role};
