//! Context policies applied to the conversation before each model call.
//!
//! | Policy | Effect |
//! |--------|--------|
//! | [`CacheBreakpointInjector`] | marks the newest user messages as prompt-cache breakpoints |
//! | [`ImageRetentionPolicy`] | drops the oldest screenshots from historic tool results |
//!
//! The turn loop runs at most one of them per iteration: with prompt
//! caching on, rewriting old images would invalidate the cached prefix.

pub mod cache;
pub mod images;

pub use cache::{CacheBreakpointInjector, MAX_CACHE_BREAKPOINTS};
pub use images::ImageRetentionPolicy;
