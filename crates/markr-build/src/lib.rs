//! Document build driver for markr.
//!
//! [`Builder`] runs one document through the whole chain: scan the input,
//! resolve every diagram block through the artifact cache (rendering on a
//! miss), assemble the intermediate document and hand it to the typesetter.
//! Run-scoped artifacts are cleaned up whichever way the run ends.

mod builder;
mod typeset;

pub use builder::{BuildConfig, BuildError, BuildReport, Builder, clean};
pub use typeset::{TypesetError, Typesetter};
