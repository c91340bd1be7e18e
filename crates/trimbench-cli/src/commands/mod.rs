//! CLI command implementations.

mod info;
mod run;

pub use info::{info, InfoArgs};
pub use run::{run, RunArgs};
