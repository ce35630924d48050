//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `run`     | `Run`            |
//! | `markers` | `Markers`        |
//! | `config`  | `Config`         |

pub mod config;
pub mod markers;
pub mod run;

pub use config::cmd_config;
pub use markers::cmd_markers;
pub use run::cmd_run;
