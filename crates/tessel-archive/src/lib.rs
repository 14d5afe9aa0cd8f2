// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 Tessel contributors

//! # tessel-archive: symmetric object-graph serialization
//!
//! The persistence core of the Tessel mesh generator: one walker writes an
//! in-memory object graph to a byte stream and reads it back isomorphic,
//! sharing, cycles and trait-object polymorphism included. The engine itself
//! is domain-agnostic; mesh types participate by implementing one hook.
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                     application types                        |
//! |        impl Archivable { fn archive(&mut, &mut Archive) }    |
//! +--------------------------------------------------------------+
//! |                        Archive session                       |
//! |   direction | identity tables | version header | registry    |
//! +--------------------------------------------------------------+
//! |                     Encoder / Decoder                        |
//! |        binary (LE, coalescing buffer)  |  text (lines)       |
//! +--------------------------------------------------------------+
//! |                  std::io::Write / Read                       |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use tessel_archive::{Archive, Result};
//!
//! fn main() -> Result<()> {
//!     let file = std::fs::File::create("surface.tsa")?;
//!     let mut ar = Archive::binary_writer(file)?;
//!     let mut samples: Vec<f64> = vec![0.0, 0.5, 1.0];
//!     ar.xfer(&mut samples)?;
//!     ar.flush()?;
//!
//!     let file = std::fs::File::open("surface.tsa")?;
//!     let mut ar = Archive::binary_reader(file)?;
//!     let mut restored: Vec<f64> = Vec::new();
//!     ar.xfer(&mut restored)?;
//!     assert_eq!(restored, samples);
//!     Ok(())
//! }
//! ```
//!
//! ## Reference forms
//!
//! | form | semantics |
//! |------|-----------|
//! | `Option<Rc<RefCell<T>>>` | owning shared reference; sharing and cycles preserved |
//! | `Option<Weak<RefCell<T>>>` | non-owning reference into the same identity space |
//! | `Option<Box<T>>` | uniquely-owned reference, body inline |
//!
//! Each form also accepts `dyn Trait` targets once the trait is enabled with
//! [`archive_pointee!`] and the concrete types are registered with
//! [`register_archive_type!`]; the most-derived type is reconstructed from
//! its registered name on the stream.
//!
//! ## Sessions
//!
//! An [`Archive`] is bound to one direction and one stream for its lifetime
//! and is strictly sequential; writer and reader must transfer the same
//! values in the same order. Registration and
//! [`set_library_version`] calls belong in process startup, before the first
//! session.

pub mod codec;
pub mod registry;

mod archive;
mod collections;
mod error;
mod macros;
mod pointers;
mod primitives;
mod traits;
mod version;

pub use archive::{Archive, Direction};
pub use codec::binary::{BinaryDecoder, BinaryEncoder};
pub use codec::text::{TextDecoder, TextEncoder};
pub use codec::{Decoder, Encoder};
pub use error::{ArchiveError, Result};
pub use traits::{Archivable, Pointee};
pub use version::{library_version, set_library_version, VersionInfo};
