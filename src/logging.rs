//! Thin `tracing` setup helper (spec §9 "observability"; SPEC_FULL.md §B
//! "Logging"), used instead of the teacher's ad hoc `println!`/bespoke TUI.
//!
//! Instruction trace goes at `trace!`, exception delivery at `debug!`,
//! faults at `warn!`, fatal stops at `error!` — callers in `cpu/` emit at
//! those levels; this module only wires up the subscriber.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber reading `RUST_LOG` (falling back
/// to `warn` if unset). Safe to call more than once; later calls are
/// no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}
