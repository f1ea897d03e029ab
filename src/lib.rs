//! Fixed size memory arena with a first-fit free list.
//!
//! A [`Freelist`] requests one block of memory from the operating system when it's
//! built and never asks for more. Callers reserve byte ranges from it and give them
//! back later; free ranges are tracked by a singly linked list of nodes stored in the
//! arena itself, sorted by offset and merged whenever they touch.
//!
//! ```
//! use freelist::Freelist;
//!
//! let mut freelist = Freelist::new(2048)?;
//!
//! let offset = freelist.reserve(64)?;
//! assert_eq!(offset, 2048 - 64);
//!
//! freelist.unreserve(offset, 64)?;
//! assert_eq!(freelist.free_size(), 2048);
//! # Ok::<(), freelist::FreelistError>(())
//! ```

mod config;
mod error;
mod freelist;
mod kernel;
mod list;
mod node;
mod reservation;
mod utils;

pub use config::FreelistConfig;
pub use error::{FreelistError, Result};
pub use freelist::Freelist;
pub use list::{Iter, NodeRef};
pub use reservation::Reservation;
