//! Method-level metadata of DEX images.
//!
//! # Key Components
//!
//! - [`method`] - Method bodies: header, instruction stream, try blocks and handlers
//! - [`debuginfo`] - Line table, local variables and parameter names

/// Method bodies and their lazy views
pub mod method;

/// Debug information of a method
pub mod debuginfo;
