//! Opens, reads, writes, and verifies Acorn DFS and ADFS ("old-map")
//! disc images from a host process (spec.md §1).
//!
//! The dispatcher ([`fs::Filesystem`]) is the entry point for everything
//! past [`opener::open`]: `find`/`glob`/`walk`/`load`/`save`/`mkdir`/
//! `remove`/`settitle`/`check` are all methods on it, dispatching to
//! whichever backend ([`adfs`] or [`dfs`]) the image probed as.

pub mod adfs;
pub mod dfs;
pub mod error;
pub mod fs;
pub mod host;
pub mod object;
pub mod opener;
pub mod registry;
pub mod transport;
pub mod wildmat;

pub use error::{AfsError, AfsResult};
pub use fs::Filesystem;
pub use object::{Attr, Object};
pub use opener::open;
