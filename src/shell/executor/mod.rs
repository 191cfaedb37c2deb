pub mod builtins;
#[allow(clippy::module_inception)]
pub mod executor;

pub use builtins::{Builtins, Flow};
pub use executor::Executor;
