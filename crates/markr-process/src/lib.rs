//! Subprocess stream relaying for markr.
//!
//! External renderers are driven through [`run`], which spawns a command and
//! relays its three standard channels concurrently:
//!
//! - the supplied input bytes are written to the child's stdin, which is then closed
//! - the child's stdout is copied into a caller-supplied sink
//! - the child's stderr is copied into a second, independent sink
//!
//! All three relays run on scoped threads alongside the child and are joined
//! before [`run`] returns. Running any of them inline would deadlock as soon
//! as a tool fills one pipe while the driver is blocked on another.
//!
//! [`ToolLog`] is the usual diagnostic sink: it splits a byte stream into
//! lines and forwards each one to `tracing`.

mod log;
mod pipe;

pub use log::ToolLog;
pub use pipe::{Channel, ProcessError, RelayError, describe, run};
