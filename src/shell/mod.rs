pub mod error;
mod executor;
mod job_manager;
mod parser;
mod process;
#[allow(clippy::module_inception)]
mod shell;
mod signals;
mod terminal;
#[cfg(test)]
mod testing;

pub use shell::Shell;
