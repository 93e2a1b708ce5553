pub mod process;

pub use process::{ProcessRuntime, ProcessRuntimeConfig};
