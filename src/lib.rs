// ABOUTME: Library crate for boxwatch exposing the session core for testing and embedding

#![allow(missing_docs)]

pub mod cli;
pub mod config;
pub mod docker;
pub mod session;
