//! CLI command implementations.
//!
//! | Module  | Commands handled |
//! |---------|------------------|
//! | `serve` | `Serve`          |
//! | `check` | `Check`          |
//! | `run`   | `Run`            |
//! | `seed`  | `Seed`           |

pub mod check;
pub mod run;
pub mod seed;
pub mod serve;

pub use check::cmd_check;
pub use run::cmd_run;
pub use seed::cmd_seed;
pub use serve::cmd_serve;
