//! The precedence callback runner.
//!
//! Records arrive from the streaming decoder in file order, but may
//! reference ids that have not been read yet: a relationship's endpoints,
//! a class's superclass, a variable's type. The resolver defers each
//! record exactly long enough for its prerequisites to be delivered, then
//! releases it to the consumer, cascading completion to anything that was
//! waiting on it.
//!
//! The engine is purely reactive: completing a record pops its queue
//! bucket and re-examines only the records that were blocked on it, so the
//! amortized work per record is one queue push and pop per unresolved
//! prerequisite. The completion cascade runs on an explicit worklist
//! rather than the call stack, so pathological dependency chains cannot
//! overflow it.
//!
//! The resolver is single-owner: it must be driven from one logical
//! thread. Hosts that wrap the import in a worker must serialize access.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDateTime;

use crate::consumer::{CancelToken, Consumer, ElementInfo, Param, ProgressSink};
use crate::error::{ModexError, Result};
use crate::model::TypeKind;
use crate::schema::radix_string;

/// The payload of one pending record: the element kind plus its fully
/// parsed scalar fields.
#[derive(Debug)]
pub(crate) enum Record {
    Model {
        author: Option<String>,
        created: Option<NaiveDateTime>,
    },
    Library {
        info: ElementInfo,
    },
    Package {
        info: ElementInfo,
    },
    Primitive {
        info: ElementInfo,
    },
    Type {
        info: ElementInfo,
        kind: TypeKind,
        extends: Option<u64>,
        implements: BTreeSet<u64>,
    },
    Constructor {
        info: ElementInfo,
        params: Vec<Param>,
    },
    Method {
        info: ElementInfo,
        overrides: BTreeSet<u64>,
        params: Vec<Param>,
    },
    Field {
        info: ElementInfo,
        type_id: u64,
        array_dim: Option<u32>,
    },
    EnumConstant {
        info: ElementInfo,
        type_id: u64,
    },
    Local {
        info: ElementInfo,
        schema_type: String,
        type_id: u64,
        array_dim: Option<u32>,
        param_index: Option<u32>,
    },
    This {
        info: ElementInfo,
        type_id: u64,
    },
    Return {
        info: ElementInfo,
        type_id: u64,
        array_dim: Option<u32>,
    },
    /// Parameters are surfaced through their owning method's signature;
    /// the standalone record only participates in ordering and progress.
    Param {
        info: ElementInfo,
    },
    Relationship {
        info: ElementInfo,
        schema_type: String,
        origin: u64,
        dest: u64,
    },
}

impl Record {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Model { .. } => "Model",
            Self::Library { .. } => "Library",
            Self::Package { .. } => "Package",
            Self::Primitive { .. } => "Primitive",
            Self::Type { kind, .. } => match kind {
                TypeKind::Class => "Class",
                TypeKind::Interface => "Interface",
                TypeKind::Enum => "Enum",
                TypeKind::Annotation => "Annotation",
            },
            Self::Constructor { .. } => "Constructor",
            Self::Method { .. } => "Method",
            Self::Field { .. } => "Field",
            Self::EnumConstant { .. } => "EnumConstant",
            Self::Local { .. } => "Local",
            Self::This { .. } => "This",
            Self::Return { .. } => "Return",
            Self::Param { .. } => "Param",
            Self::Relationship { .. } => "Relationship",
        }
    }

    fn display_name(&self) -> Option<&str> {
        match self {
            Self::Model { .. } => None,
            Self::Library { info }
            | Self::Package { info }
            | Self::Primitive { info }
            | Self::Type { info, .. }
            | Self::Constructor { info, .. }
            | Self::Method { info, .. }
            | Self::Field { info, .. }
            | Self::EnumConstant { info, .. }
            | Self::Local { info, .. }
            | Self::This { info, .. }
            | Self::Return { info, .. }
            | Self::Param { info }
            | Self::Relationship { info, .. } => info.name.as_deref(),
        }
    }
}

/// A record plus its outstanding prerequisites.
#[derive(Debug)]
pub(crate) struct PendingRecord {
    /// The record's own id; `None` for the model header.
    pub id: Option<u64>,
    /// Ids that must be delivered before this record may be.
    pub prereqs: HashSet<u64>,
    /// Parsed fields, handed to the consumer on delivery.
    pub payload: Record,
}

impl PendingRecord {
    /// Creates a pending record with the structural parent as its first
    /// prerequisite, mirroring the decoder's contract.
    pub fn new(id: Option<u64>, parent: Option<u64>, payload: Record) -> Self {
        let mut prereqs = HashSet::new();
        if let Some(parent) = parent {
            prereqs.insert(parent);
        }
        Self {
            id,
            prereqs,
            payload,
        }
    }

    fn describe(&self) -> String {
        let mut deps: Vec<String> = self.prereqs.iter().map(|p| radix_string(*p)).collect();
        deps.sort();
        format!(
            "kind: {}, name: {}, id: {}, waiting on: {{{}}}",
            self.payload.kind_name(),
            self.payload.display_name().unwrap_or("<anonymous>"),
            self.id.map(radix_string).unwrap_or_else(|| "-".into()),
            deps.join(",")
        )
    }
}

/// Tracks outstanding prerequisites per pending record and releases each
/// record to the consumer exactly once, in dependency order.
#[derive(Debug, Default)]
pub(crate) struct Resolver {
    /// Ids whose records have been delivered.
    completed: HashSet<u64>,
    /// Pending slot indices blocked on a given id.
    queued: HashMap<u64, Vec<usize>>,
    /// Arena of submitted records; a slot is taken when delivered.
    slots: Vec<Option<PendingRecord>>,
    /// Submitted-but-undelivered records by id, for diagnostics.
    in_flight: HashMap<u64, usize>,
    submitted: u64,
    delivered: u64,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records submitted so far.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Records delivered to the consumer so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Adds a record, delivering it immediately if it is ready, and
    /// cascading completion to anything unblocked by it.
    pub fn submit<C: Consumer>(
        &mut self,
        mut record: PendingRecord,
        consumer: &mut C,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<()> {
        self.submitted += 1;
        let slot = self.slots.len();
        if let Some(id) = record.id {
            self.in_flight.insert(id, slot);
        }
        if cancel.is_cancelled() {
            self.slots.push(Some(record));
            return Ok(());
        }
        // A prerequisite may have been delivered earlier in this same pass.
        record.prereqs.retain(|p| !self.completed.contains(p));
        let ready = record.prereqs.is_empty();
        let prereqs: Vec<u64> = record.prereqs.iter().copied().collect();
        self.slots.push(Some(record));
        if ready {
            self.complete(slot, consumer, progress, cancel)
        } else {
            for prereq in prereqs {
                self.queued.entry(prereq).or_default().push(slot);
            }
            Ok(())
        }
    }

    /// Delivers the record in `slot`, then every record transitively
    /// unblocked by it. Worklist-driven; the depth of a dependency chain
    /// never touches the call stack.
    fn complete<C: Consumer>(
        &mut self,
        slot: usize,
        consumer: &mut C,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<()> {
        let mut work = vec![slot];
        while let Some(current) = work.pop() {
            let Some(record) = self.slots.get_mut(current).and_then(Option::take) else {
                continue;
            };
            self.delivered += 1;
            if cancel.is_cancelled() {
                return Ok(());
            }
            let id = record.id;
            deliver(record.payload, consumer, progress)?;
            let Some(id) = id else { continue };
            self.completed.insert(id);
            self.in_flight.remove(&id);
            let Some(waiters) = self.queued.remove(&id) else {
                continue;
            };
            for waiter in waiters {
                if let Some(waiting) = self.slots.get_mut(waiter).and_then(Option::as_mut) {
                    if waiting.prereqs.remove(&id) && waiting.prereqs.is_empty() {
                        work.push(waiter);
                    }
                }
            }
        }
        Ok(())
    }

    /// Post-decode diagnostics: every submitted record must have been
    /// delivered. A shortfall means some prerequisite chain never
    /// resolved; the walk below distinguishes a reference cycle from a
    /// dangling reference and reports the full path.
    pub fn verify(&self) -> Result<()> {
        if self.submitted == self.delivered {
            return Ok(());
        }
        for buckets in self.queued.values() {
            for &slot in buckets {
                if self.slots.get(slot).map_or(false, Option::is_some) {
                    self.walk_for_cycle(slot)?;
                }
            }
        }
        let example = self
            .slots
            .iter()
            .flatten()
            .next()
            .map(PendingRecord::describe)
            .unwrap_or_else(|| "<none>".into());
        Err(ModexError::CountMismatch(format!(
            "parsed {} stream records but {} were delivered; example stuck record: {example}",
            self.submitted, self.delivered
        )))
    }

    /// Follows prerequisite edges from a stuck record. Revisiting an id on
    /// the current path is a cycle; a prerequisite with no record and no
    /// completion is a dangling reference. Both are fatal.
    fn walk_for_cycle(&self, start: usize) -> Result<()> {
        struct Frame {
            slot: usize,
            prereqs: Vec<u64>,
            next: usize,
        }

        let frame_for = |slot: usize| -> Option<Frame> {
            self.slots.get(slot)?.as_ref().map(|r| Frame {
                slot,
                prereqs: r.prereqs.iter().copied().collect(),
                next: 0,
            })
        };

        let mut path: Vec<usize> = Vec::new();
        let mut on_path: HashSet<u64> = HashSet::new();
        let mut stack: Vec<Frame> = Vec::new();
        if let Some(frame) = frame_for(start) {
            if let Some(Some(rec)) = self.slots.get(start) {
                if let Some(id) = rec.id {
                    on_path.insert(id);
                }
            }
            path.push(start);
            stack.push(frame);
        }
        while let Some(frame) = stack.last_mut() {
            if frame.next >= frame.prereqs.len() {
                if let Some(Some(rec)) = self.slots.get(frame.slot) {
                    if let Some(id) = rec.id {
                        on_path.remove(&id);
                    }
                }
                path.pop();
                stack.pop();
                continue;
            }
            let prereq = frame.prereqs[frame.next];
            frame.next += 1;
            if self.completed.contains(&prereq) {
                continue;
            }
            if on_path.contains(&prereq) {
                let mut report = String::from("detected reference cycle:");
                for &slot in &path {
                    if let Some(Some(rec)) = self.slots.get(slot) {
                        report.push_str("\n  ");
                        report.push_str(&rec.describe());
                    }
                }
                return Err(ModexError::Dependency(report));
            }
            match self.in_flight.get(&prereq) {
                Some(&pslot) if self.slots.get(pslot).map_or(false, Option::is_some) => {
                    if let Some(next_frame) = frame_for(pslot) {
                        on_path.insert(prereq);
                        path.push(pslot);
                        stack.push(next_frame);
                    }
                }
                _ => {
                    let holder = self
                        .slots
                        .get(frame.slot)
                        .and_then(|s| s.as_ref())
                        .map(PendingRecord::describe)
                        .unwrap_or_else(|| "<unknown>".into());
                    return Err(ModexError::Dependency(format!(
                        "reference to undeclared id {}; referencing record: {holder}",
                        radix_string(prereq)
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The single point at which observable side effects occur: the consumer
/// method matching the record's kind runs here, and progress is reported.
fn deliver<C: Consumer>(
    record: Record,
    consumer: &mut C,
    progress: &mut dyn ProgressSink,
) -> Result<()> {
    match record {
        Record::Model { author, created } => {
            consumer.model(author.as_deref(), created)?;
            progress.worked(1);
        }
        Record::Library { info } => {
            consumer.library(info)?;
            progress.worked(1);
        }
        Record::Package { info } => {
            consumer.package(info)?;
            progress.worked(1);
        }
        Record::Primitive { info } => {
            consumer.primitive(info)?;
            progress.worked(1);
        }
        Record::Type {
            info,
            kind,
            extends,
            implements,
        } => {
            match kind {
                TypeKind::Class => consumer.class(info, extends, implements)?,
                TypeKind::Interface => consumer.interface(info, extends, implements)?,
                TypeKind::Enum => consumer.enumeration(info, extends, implements)?,
                TypeKind::Annotation => consumer.annotation(info, extends, implements)?,
            }
            progress.worked(1);
        }
        Record::Constructor { info, params } => {
            let weight = 1 + params.len() as u64;
            consumer.constructor(info, params)?;
            progress.worked(weight);
        }
        Record::Method {
            info,
            overrides,
            params,
        } => {
            let weight = 1 + params.len() as u64;
            consumer.method(info, overrides, params)?;
            progress.worked(weight);
        }
        Record::Field {
            info,
            type_id,
            array_dim,
        } => {
            consumer.field(info, type_id, array_dim)?;
            progress.worked(1);
        }
        Record::EnumConstant { info, type_id } => {
            consumer.enum_constant(info, type_id)?;
            progress.worked(1);
        }
        Record::Local {
            info,
            schema_type,
            type_id,
            array_dim,
            param_index,
        } => {
            consumer.local(info, &schema_type, type_id, array_dim, param_index)?;
            progress.worked(1);
        }
        Record::This { info, type_id } => {
            consumer.context_this(info, type_id)?;
            progress.worked(1);
        }
        Record::Return {
            info,
            type_id,
            array_dim,
        } => {
            consumer.returned(info, type_id, array_dim)?;
            progress.worked(1);
        }
        Record::Param { .. } => {
            progress.worked(1);
        }
        Record::Relationship {
            info,
            schema_type,
            origin,
            dest,
        } => {
            consumer.relationship(info, &schema_type, origin, dest)?;
            progress.worked(1);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::NoProgress;
    use std::collections::BTreeMap;

    fn info(id: u64, parent: Option<u64>) -> ElementInfo {
        ElementInfo {
            name: Some(format!("el{id}")),
            id,
            parent_id: parent,
            modifiers: BTreeSet::new(),
            attrs: BTreeMap::new(),
        }
    }

    fn library(id: u64, parent: Option<u64>) -> PendingRecord {
        PendingRecord::new(
            Some(id),
            parent,
            Record::Library {
                info: info(id, parent),
            },
        )
    }

    fn class(id: u64, parent: Option<u64>, extends: Option<u64>) -> PendingRecord {
        let mut record = PendingRecord::new(
            Some(id),
            parent,
            Record::Type {
                info: info(id, parent),
                kind: TypeKind::Class,
                extends,
                implements: BTreeSet::new(),
            },
        );
        if let Some(extends) = extends {
            record.prereqs.insert(extends);
        }
        record
    }

    /// Records element ids in delivery order.
    #[derive(Default)]
    struct Recording {
        order: Vec<u64>,
    }

    impl Consumer for Recording {
        fn library(&mut self, info: ElementInfo) -> Result<()> {
            self.order.push(info.id);
            Ok(())
        }

        fn class(
            &mut self,
            info: ElementInfo,
            _extends: Option<u64>,
            _implements: BTreeSet<u64>,
        ) -> Result<()> {
            self.order.push(info.id);
            Ok(())
        }
    }

    fn submit_all(records: Vec<PendingRecord>) -> (Resolver, Recording) {
        let mut resolver = Resolver::new();
        let mut consumer = Recording::default();
        let cancel = CancelToken::new();
        for record in records {
            resolver
                .submit(record, &mut consumer, &mut NoProgress, &cancel)
                .expect("submit");
        }
        (resolver, consumer)
    }

    #[test]
    fn ready_records_deliver_immediately() {
        let (resolver, consumer) = submit_all(vec![library(1, None)]);
        assert_eq!(consumer.order, vec![1]);
        resolver.verify().expect("verified");
    }

    #[test]
    fn forward_reference_defers_until_target_arrives() {
        // Class 2 extends class 9, which is declared later in the stream.
        let records = vec![library(1, None), class(2, Some(1), Some(9)), class(9, Some(1), None)];
        let (resolver, consumer) = submit_all(records);
        assert_eq!(consumer.order, vec![1, 9, 2]);
        resolver.verify().expect("verified");
    }

    #[test]
    fn delivery_is_exactly_once_across_long_chains() {
        // 0 <- 1 <- 2 <- ... declared in reverse order, so every record
        // waits until the final submission releases the whole chain.
        let n = 5_000u64;
        let mut records: Vec<PendingRecord> = (1..n)
            .rev()
            .map(|id| class(id, None, Some(id - 1)))
            .collect();
        records.push(class(0, None, None));
        let (resolver, consumer) = submit_all(records);
        assert_eq!(consumer.order.len() as u64, n);
        let expected: Vec<u64> = (0..n).collect();
        assert_eq!(consumer.order, expected);
        resolver.verify().expect("verified");
    }

    #[test]
    fn submission_order_does_not_change_the_outcome() {
        let build = |flip: bool| {
            let mut records = vec![library(1, None)];
            if flip {
                records.push(class(3, Some(1), None));
                records.push(class(2, Some(1), Some(3)));
            } else {
                records.push(class(2, Some(1), Some(3)));
                records.push(class(3, Some(1), None));
            }
            records
        };
        let (_, early) = submit_all(build(false));
        let (_, late) = submit_all(build(true));
        let as_set = |v: &[u64]| v.iter().copied().collect::<BTreeSet<u64>>();
        assert_eq!(as_set(&early.order), as_set(&late.order));
        // Dependency order holds in both runs: 3 before 2.
        for order in [&early.order, &late.order] {
            let pos = |id: u64| order.iter().position(|x| *x == id).expect("delivered");
            assert!(pos(3) < pos(2));
            assert!(pos(1) < pos(2));
        }
    }

    #[test]
    fn cycle_is_reported_with_both_participants() {
        let records = vec![class(1, None, Some(2)), class(2, None, Some(1))];
        let (resolver, consumer) = submit_all(records);
        assert!(consumer.order.is_empty());
        let err = resolver.verify().expect_err("cycle");
        let message = err.to_string();
        assert!(message.contains("cycle"), "unexpected: {message}");
        assert!(message.contains("id: 1"), "unexpected: {message}");
        assert!(message.contains("id: 2"), "unexpected: {message}");
    }

    #[test]
    fn dangling_reference_is_reported_with_the_missing_id() {
        let records = vec![class(1, None, Some(42))];
        let (resolver, _) = submit_all(records);
        let err = resolver.verify().expect_err("dangling");
        let message = err.to_string();
        assert!(message.contains("undeclared"), "unexpected: {message}");
        assert!(message.contains("16"), "radix-36 of 42: {message}");
    }

    #[test]
    fn cancelled_submission_suppresses_delivery() {
        let mut resolver = Resolver::new();
        let mut consumer = Recording::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        resolver
            .submit(library(1, None), &mut consumer, &mut NoProgress, &cancel)
            .expect("submit");
        assert!(consumer.order.is_empty());
        assert_eq!(resolver.delivered(), 0);
        assert_eq!(resolver.submitted(), 1);
    }
}
