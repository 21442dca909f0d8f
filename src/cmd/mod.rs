//! CLI command implementations.
//!
//! | Module   | Commands handled              |
//! |----------|-------------------------------|
//! | `run`    | `Run` (and the bare command)  |
//! | `stages` | `List`, `Status`, `Reset`     |
//! | `config` | `Config`                      |

pub mod config;
pub mod run;
pub mod stages;

pub use config::cmd_config;
pub use run::run_pipeline;
pub use stages::{cmd_list, cmd_reset, cmd_status};
