//! Core conversation types shared by the reasoning loop and the
//! completion-client seam.

mod message;

pub use message::{Message, Role};
