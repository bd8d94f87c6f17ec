//! Bounded conversational buffer
//!
//! An ordered window of at most `capacity` rows. Every append receives a
//! logical position from a counter that never goes backwards, and overflow is
//! resolved by dropping the oldest rows first. Summary rows get no special
//! treatment: they are evicted like any other row.
//!
//! # Example
//!
//! ```rust
//! use mneme_core::buffer::{RenderMode, TurnBuffer};
//! use mneme_core::llm::MessageRole;
//!
//! let mut buffer = TurnBuffer::new(2).with_system_prompt("Be brief.");
//! buffer
//!     .push(MessageRole::User, "Hello!")
//!     .push(MessageRole::Assistant, "Hi.")
//!     .push(MessageRole::User, "Still there?");
//!
//! assert_eq!(buffer.len(), 2);
//! assert_eq!(buffer.turns()[0].position, 2);
//! assert!(buffer.render(RenderMode::Plain).starts_with("system: Be brief."));
//! ```

mod render;
mod turn;
mod window;

pub use render::{ANNOTATED_HEADER, PROMPT_DELIMITER, RenderMode};
pub use turn::{
    Annotations, COVERED_FROM, COVERED_THROUGH, Coverage, IS_SUMMARY, NewTurn, SUMMARY_LABEL,
    Turn, WINDOW_SIZE,
};
pub use window::{AppendOutcome, TurnBuffer};
