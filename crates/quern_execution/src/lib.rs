//! Core fragment of a columnar analytic engine.
//!
//! Two subsystems make up the fragment:
//!
//! - [`expr`]: expression actions, an ordered sequence of primitive block
//!   transformations (function application, column add/remove/copy, array
//!   unnesting, projection) with dependency-driven construction, dead column
//!   elimination and evaluation; composable into multi-stage chains.
//! - [`execution`]: a pull-based block stream abstraction and a union stream
//!   that drains several streams with a pool of worker threads, handing
//!   blocks to the consumer through a bounded queue.

pub mod arrays;
pub mod config;
pub mod execution;
pub mod expr;
pub mod functions;
