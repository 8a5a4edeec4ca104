//! Widgets
//!
//! - [`markup`]: answer markup to styled, width-wrapped lines
//! - [`text_block`]: bottom-anchored scrolling region for the chat log

pub mod markup;
pub mod text_block;

pub use markup::{display_width, markup_lines};
pub use text_block::{TextBlock, TextBlockState};
