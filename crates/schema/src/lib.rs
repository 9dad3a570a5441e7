//! Wire types for the detection event endpoint.
//!
//! Field names are PascalCase on the wire to stay compatible with existing
//! clients of `/event/create`.

mod detection;
mod event;

pub use detection::{DetectionResponse, DetectionResult, ErrorReport, Label};
pub use event::DetectionRequest;
