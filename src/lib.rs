//! # Modex
//!
//! Streamed, dependency-ordered exchange of program-structure models:
//! libraries, packages, types, members, variables, and cross-referencing
//! relationships, carried as compact gzip-compressed tagged text.
//!
//! ## Overview
//!
//! The data model is ordinary; the protocol is not. On disk, every element
//! carries a short numeric identifier assigned in arbitrary order, and many
//! records reference identifiers that have not been read yet when the
//! record is encountered: a class's superclass may be declared a million
//! elements later, and a relationship may point forward to both of its
//! endpoints. Modex decodes such files in a single forward pass, without
//! loading the tree into memory, while guaranteeing that every record
//! reaches the consumer exactly once and only after everything it
//! references has already been delivered.
//!
//! ### Key pieces
//!
//! *   **Schema vocabulary** ([`schema`]): a closed enumeration of short
//!     tag tokens plus radix-36 identifier rendering. Unknown tokens are a
//!     hard error, never silently skipped.
//! *   **Escaping codec** ([`text`]): entity escaping with a deterministic
//!     lossy fallback for invalid code points, memoized per encode session.
//! *   **Tree model** ([`model`]): the full object graph for bulk export,
//!     with `subtree_size` for up-front progress budgets and `release` for
//!     incremental memory reclamation.
//! *   **Streaming decoder** + **precedence resolver**: the forward-only
//!     walk builds one lightweight record per element and the resolver
//!     defers each record exactly long enough to satisfy its references.
//! *   **Consumer contract** ([`Consumer`]): one callback per element
//!     kind, driven in dependency order.
//!
//! ## Architecture
//!
//! Writing walks the tree once: the root's element count is computed
//! bottom-up and written before the body, so a reader can size its
//! progress budget without a second pass. Library subtrees are encoded
//! into independent buffers in parallel and concatenated. The payload is
//! then gzip-compressed as a whole.
//!
//! Reading walks the text top-down. Each element becomes a record holding
//! its parsed fields and a prerequisite id set (structural parent plus any
//! reference ids). Records go to the resolver, which delivers ready
//! records immediately and queues the rest under each missing id; every
//! completion pops its bucket and cascades. After the walk, a diagnostic
//! pass verifies that submitted and delivered counts agree and reports any
//! reference cycle or dangling id with its full dependency path.
//!
//! ## Usage
//!
//! ```rust
//! use modex::{
//!     ElementCore, IdAllocator, Library, Model, Modex, Package, TypeDecl, TypeKind,
//! };
//!
//! // Build a model and round-trip it through an in-memory gzip stream.
//! let mut alloc = IdAllocator::new();
//! let mut model = Model::new(Some("1.2.0".into()), None);
//! let mut library = Library::new(ElementCore::named(alloc.next_id(), "rt.jar"));
//! let mut package = Package::new(ElementCore::named(alloc.next_id(), "com.example"));
//! package.types.push(TypeDecl::new(
//!     ElementCore::named(alloc.next_id(), "Widget"),
//!     TypeKind::Class,
//! ));
//! library.packages.push(package);
//! model.libraries.push(library);
//!
//! let mut buffer = Vec::new();
//! Modex::export_to_writer(&mut buffer, &model)?;
//! let back = Modex::import_from_reader(buffer.as_slice())?;
//! assert_eq!(back, model);
//! # Ok::<(), modex::ModexError>(())
//! ```
//!
//! Streaming consumption implements [`Consumer`] instead; see
//! [`Modex::import_stream`].
//!
//! ## Error handling
//!
//! No `unwrap()` or `panic!()` in the library (enforced by clippy lints);
//! every failure surfaces as a [`ModexError`]. All fatal conditions abort
//! the whole operation; there are no partial models. Cancellation is
//! cooperative, checked at every structural step, and reported as
//! [`ImportOutcome::Cancelled`] rather than as an error.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod compression;
pub mod consumer;
pub mod error;
pub mod inspector;
pub mod model;
pub mod schema;
pub mod text;

// --- INTERNAL IMPLEMENTATION MODULES ---
mod cursor;
mod reader;
mod resolver;

// --- RE-EXPORTS ---

pub use api::{ImportOptions, ImportOutcome, ImportStats, Modex, Version};
pub use consumer::{
    CancelToken, Consumer, ElementInfo, NoOpConsumer, NoProgress, Param, ProgressSink,
    ATTR_SEPARATOR,
};
pub use error::{ModexError, Result};
pub use inspector::{ModelReport, ModexInspector};
pub use model::{
    ElementCore, IdAllocator, Library, Method, Model, Package, PrimitiveType, Relationship,
    TypeDecl, TypeKind, Var, VarKind,
};
pub use schema::{Modifier, Token, RADIX};
