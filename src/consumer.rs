//! The callback contract driven by the streaming decoder, plus the small
//! host-facing seams: progress reporting and cooperative cancellation.
//!
//! A [`Consumer`] receives one call per element, in dependency order: by
//! the time a method runs, the element's structural parent and every id it
//! references have already been delivered. Each element is delivered
//! exactly once. Implementations typically build their own target
//! representation (for example, inserting nodes and edges into a graph
//! store).
//!
//! Every method has a default no-op body, so a consumer only implements
//! the kinds it cares about. [`NoOpConsumer`] implements none of them and
//! is useful for validation-only passes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::schema::Modifier;

/// Separator consumers conventionally use when folding multi-valued
/// attributes into one value string.
pub const ATTR_SEPARATOR: &str = ";";

/// The scalar fields shared by every delivered element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementInfo {
    /// Element name, if present.
    pub name: Option<String>,
    /// Element id, unique within the model.
    pub id: u64,
    /// Structural parent id; `None` for top-level elements.
    pub parent_id: Option<u64>,
    /// Modifier tags.
    pub modifiers: BTreeSet<Modifier>,
    /// Free-form attributes.
    pub attrs: BTreeMap<String, String>,
}

/// One parameter of a delivered method or constructor signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name, if present.
    pub name: Option<String>,
    /// Element id of the parameter.
    pub id: u64,
    /// Id of the owning method.
    pub parent_id: Option<u64>,
    /// Modifier tags.
    pub modifiers: BTreeSet<Modifier>,
    /// Free-form attributes.
    pub attrs: BTreeMap<String, String>,
    /// Reference to the parameter's type; already delivered.
    pub type_id: u64,
    /// Array dimension; `None` means not an array.
    pub array_dim: Option<u32>,
    /// Zero-based position in the signature.
    pub index: u32,
}

/// Callback interface the streaming decoder drives, one method per element
/// kind.
///
/// Reference ids passed to these methods (`extends`, `implements`,
/// `overrides`, `type_id`, relationship endpoints) are guaranteed to have
/// been delivered already; absent references are `None` rather than a
/// sentinel value.
#[allow(unused_variables)]
pub trait Consumer {
    /// The model header: author/version string and creation timestamp.
    /// Always the first call of an import.
    fn model(&mut self, author: Option<&str>, created: Option<NaiveDateTime>) -> Result<()> {
        Ok(())
    }

    /// A library.
    fn library(&mut self, info: ElementInfo) -> Result<()> {
        Ok(())
    }

    /// A package.
    fn package(&mut self, info: ElementInfo) -> Result<()> {
        Ok(())
    }

    /// A primitive type.
    fn primitive(&mut self, info: ElementInfo) -> Result<()> {
        Ok(())
    }

    /// A class declaration.
    fn class(
        &mut self,
        info: ElementInfo,
        extends: Option<u64>,
        implements: BTreeSet<u64>,
    ) -> Result<()> {
        Ok(())
    }

    /// An interface declaration.
    fn interface(
        &mut self,
        info: ElementInfo,
        extends: Option<u64>,
        implements: BTreeSet<u64>,
    ) -> Result<()> {
        Ok(())
    }

    /// An enum declaration.
    fn enumeration(
        &mut self,
        info: ElementInfo,
        extends: Option<u64>,
        implements: BTreeSet<u64>,
    ) -> Result<()> {
        Ok(())
    }

    /// An annotation declaration.
    fn annotation(
        &mut self,
        info: ElementInfo,
        extends: Option<u64>,
        implements: BTreeSet<u64>,
    ) -> Result<()> {
        Ok(())
    }

    /// A constructor with its parameter signature.
    fn constructor(&mut self, info: ElementInfo, params: Vec<Param>) -> Result<()> {
        Ok(())
    }

    /// A method with its overrides and parameter signature.
    fn method(
        &mut self,
        info: ElementInfo,
        overrides: BTreeSet<u64>,
        params: Vec<Param>,
    ) -> Result<()> {
        Ok(())
    }

    /// A field.
    fn field(&mut self, info: ElementInfo, type_id: u64, array_dim: Option<u32>) -> Result<()> {
        Ok(())
    }

    /// An enum constant.
    fn enum_constant(&mut self, info: ElementInfo, type_id: u64) -> Result<()> {
        Ok(())
    }

    /// A local variable.
    fn local(
        &mut self,
        info: ElementInfo,
        schema_type: &str,
        type_id: u64,
        array_dim: Option<u32>,
        param_index: Option<u32>,
    ) -> Result<()> {
        Ok(())
    }

    /// A method's `this` receiver.
    fn context_this(&mut self, info: ElementInfo, type_id: u64) -> Result<()> {
        Ok(())
    }

    /// A method's return value.
    fn returned(
        &mut self,
        info: ElementInfo,
        type_id: u64,
        array_dim: Option<u32>,
    ) -> Result<()> {
        Ok(())
    }

    /// A relationship edge between two delivered elements.
    fn relationship(
        &mut self,
        info: ElementInfo,
        schema_type: &str,
        origin: u64,
        dest: u64,
    ) -> Result<()> {
        Ok(())
    }
}

/// A consumer that ignores everything.
///
/// Useful for validation passes: the decoder still enforces the schema,
/// dependency ordering, and the post-decode diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpConsumer;

impl Consumer for NoOpConsumer {}

/// Progress reporting seam.
///
/// The declared total element count, when present, is converted into a
/// budget via [`ProgressSink::begin`]; each delivered element reports one
/// unit of work, and methods additionally report one unit per parameter.
#[allow(unused_variables)]
pub trait ProgressSink {
    /// Called once when the total budget is known.
    fn begin(&mut self, total: u64) {}

    /// Called as work completes.
    fn worked(&mut self, units: u64) {}

    /// Called when the operation finishes, successfully or not.
    fn done(&mut self) {}
}

/// A progress sink that discards all reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Cooperative cancellation flag shared between a host and a running
/// import.
///
/// Every structural decode step and every resolver operation checks the
/// flag; once set, in-flight state is abandoned without rollback. Delivery
/// already performed is not retracted, so cancellation is at-least-started,
/// not atomic.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn no_op_consumer_accepts_everything() {
        let mut consumer = NoOpConsumer;
        consumer.model(Some("1.0.0"), None).expect("model");
        consumer
            .library(ElementInfo {
                name: Some("rt".into()),
                id: 0,
                parent_id: None,
                modifiers: BTreeSet::new(),
                attrs: BTreeMap::new(),
            })
            .expect("library");
    }
}
