//! Activity timeline domain module.
//!
//! - `model`: raw agent updates (`RawEvent`) and timeline entries (`ProcessedEvent`)
//! - `classifier`: the pure mapping between the two

mod classifier;
mod model;

pub use classifier::{Classification, classify};
pub use model::{
    ActivityKind, GenerateQueryUpdate, ProcessedEvent, RawEvent, ResearchSource,
    WebResearchUpdate,
};
