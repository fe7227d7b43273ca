//! Context assembly and compaction pipeline — the core of packrat.
//!
//! Four cooperating pieces, leaves first:
//!
//! 1. **Budget** — the usable input-token ceiling, derived once
//! 2. **RecencyTruncation** — pinned-aware selection under the ceiling
//! 3. **SummaryBuffer** — rolling compaction of dropped history
//! 4. **Augmentors** — per-turn injection of user memory and retrieved
//!    context, each budget-verified
//!
//! The engine crate orchestrates these per turn; everything here is
//! deterministic given a token counter and (for the summary buffer) a
//! summarizer.

pub mod augment;
pub mod budget;
pub mod counter;
pub mod summary;
pub mod truncate;

pub use augment::memory::MemoryAugmentor;
pub use augment::rag::{RagAugmentor, RagMode};
pub use budget::Budget;
pub use counter::ApproxTokenCounter;
pub use summary::{SummaryBuffer, SummaryPolicy};
pub use truncate::RecencyTruncation;
