//! Render pipeline, plugin registry, and browser session orchestration.

pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod plugins;
pub mod registry;
pub mod session;
pub mod template;
