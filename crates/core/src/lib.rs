//! Core business logic for mediateam.

pub mod services;

pub use services::*;
