//! Task webhook service: accept a task, publish a site, report back.
//!
//! ## Module Map
//!
//! ```text
//! ┌───────────┐  POST / ┌──────────────────────────────────────────────────┐
//! │ Evaluator │ ──────> │  server.rs  (axum Router, ServerOptions)         │
//! │           │         │    └─ api.rs  (route handlers, AppState)         │
//! │           │         │         │                                        │
//! │           │         │         │ PipelineRunner::start_run()            │
//! │           │         │         v                                        │
//! │           │         │  pipeline.rs  (PipelineRunner, RepoLockMap)      │
//! │           │         │         │                                        │
//! │           │         │         ├─ content.rs  (SiteContentProvider)     │
//! │           │         │         ├─ github.rs   (RepoHost, GitHubClient)  │
//! │           │ <────── │         └─ notifier.rs (CompletionNotifier)      │
//! └───────────┘ callback└──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module      | Responsibility                                            |
//! |-------------|-----------------------------------------------------------|
//! | `models`    | Shared types: `TaskRequest`, `FileSet`, `RunSummary`      |
//! | `templates` | Fallback site, README and Pages workflow text             |

pub mod api;
pub mod content;
pub mod github;
pub mod models;
pub mod notifier;
pub mod pipeline;
pub mod server;
pub mod templates;
