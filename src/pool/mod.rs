//! Supervision core: definitions, instances, and the coordinating pool.
//!
//! ## Files & responsibilities
//! - **executable.rs**: declarative service definition plus the one-shot
//!   runner (environment resolution, process group, output fanout, graceful
//!   SIGINT → SIGKILL termination).
//! - **runnable.rs**: per-instance restart loop with budget counting and a
//!   completion latch.
//! - **core.rs**: the [`Pool`] — supervisor/instance/handler registries
//!   under readers-writer locks, snapshot reads, synchronous event fanout,
//!   hot-reload listener, terminate/done signalling.
//! - **handler.rs**: the [`Handler`] observer contract.
//! - **output.rs**: sinks and line pumps for child stdout/stderr.
//!
//! ## Wiring
//! ```text
//! Executable[] ──► Pool::start_all(ctx)
//!                    │
//!                    ├──► per definition: Executable::start
//!                    │        └──► Runnable::run_loop (on the pool tracker)
//!                    │                ├──► Executable::run (one child)
//!                    │                └──► Pool::on_* ──► Handler fanout
//!                    │
//!                    ├──► reload listener (when hot reload is armed)
//!                    │        └──► starts supervisors from the reload channel
//!                    │
//!                    └──► tracker.wait() — returns when every instance exited
//! ```

mod core;
mod executable;
mod handler;
mod output;
mod runnable;

pub use self::core::{Pool, ReloadHandle};
pub use executable::Executable;
pub use handler::Handler;
pub use runnable::Runnable;
