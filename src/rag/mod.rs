//! Answering and summarization over chunks.
//!
//! - [`GroundedAnswerer`]: one answer from the retrieved context, with
//!   conversation memory.
//! - [`ScoredMapReduceAnswerer`]: per-chunk scored answers, then a final
//!   selection that cites sources.
//! - [`RefineSummarizer`]: a running summary folded over chunks in order.

pub mod context;
mod grounded;
mod memory;
mod refine;
mod scored;

pub use context::{format_candidates, format_docs};
pub use grounded::{GroundedAnswerer, DEFAULT_MEMORY_LIMIT};
pub use memory::{ConversationMemory, ConversationState};
pub use refine::{RefineSummarizer, RunningSummary};
pub use scored::{parse_scored, ScoredAnswer, ScoredMapReduceAnswerer, DONT_KNOW, MAX_SCORE};
