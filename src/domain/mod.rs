//! Data structures for the crossposting pipeline.
//!
//! - `Item`: one unit of source content moving through the pipeline
//! - `Post`: a platform-specific rendering derived from an Item
//! - `ItemStatus::next`: the single source of truth for status transitions

pub mod item;
pub mod post;

pub use item::{Item, ItemStatus, PipelineEvent};
pub use post::{Platform, Post, PostStatus};
