//! Terminal shell for the pupil simulator: environment configuration and
//! the interactive chat loop around a `pupil_core::session::Session`.

pub mod config;
pub mod repl;
