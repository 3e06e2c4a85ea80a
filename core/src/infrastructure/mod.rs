//! Infrastructure seams: command execution, template rendering and host
//! operations built on top of them.
//!
//! Everything that leaves the process goes through `CommandRunner` or
//! `Renderer`, so rules can be exercised end to end with the mock and
//! recording doubles.

pub mod host;
pub mod render;
pub mod runner;

pub use render::{RecordingRenderer, Renderer, TeraRenderer};
pub use runner::{CommandRunner, MockRunner, ProcessRunner};
