//! # Routing
//!
//! Graph-level routing built from ordinary edges.
//!
//! | Router   | Use Case |
//! |----------|----------|
//! | [`Switch`] | Send each payload of one event to the first matching case |

pub mod switch;

pub use switch::Switch;
