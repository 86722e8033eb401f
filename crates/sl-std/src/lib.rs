//! Provides various utilities used throughout the codebase.
//!
//! This library can be seen as an extension to the rust standard library.

pub mod bytestream;
