//! Matching submitted property payloads against inventory.

mod matcher;
mod populate;

pub use matcher::{PropertyMatch, PropertyMatcher};
pub use populate::NewPropertyPopulator;
