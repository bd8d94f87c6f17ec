//! Rolling Summarization
//!
//! Compresses older raw turns into synthetic `system` rows labelled
//! `"summary"`. Each summary row records the logical positions it covers in
//! its annotations, and the next pass only considers raw turns positioned
//! after the highest covered position still visible in the buffer.
//!
//! Coverage lives only in surviving summary rows. Once every summary covering
//! a range has been evicted, that range can no longer be reconstructed.
//!
//! # Example
//!
//! ```rust,ignore
//! use mneme_core::summary::RollingSummarizer;
//! use mneme_core::config::SummaryConfig;
//!
//! let summarizer = RollingSummarizer::new(SummaryConfig::with_window(4))?;
//! buffer.append(MessageRole::User, "...");
//! if let Some(outcome) = summarizer.summarize(&mut buffer, provider.as_ref()).await {
//!     println!("covered {}..={}", outcome.coverage.covered_from, outcome.coverage.covered_through);
//! }
//! ```

mod rolling;

pub use rolling::{RollingSummarizer, SummaryOutcome, SummaryWindow};
