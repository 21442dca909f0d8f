pub mod cursor;
pub mod executor;
pub mod scope;
pub mod state;

pub use cursor::ResumeCursor;
pub use executor::{
    ExecutionObserver, NoopObserver, PipelineExecutor, RunReport, RunRequest, RunState,
    StageOutcome,
};
pub use scope::{RunMode, SkipReason, resolve_scope};
pub use state::{StageStatus, StateEntry, StateManager};
