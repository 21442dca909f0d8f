pub mod icons;
pub mod progress;

pub use progress::{PipelineUI, resume_hint};
