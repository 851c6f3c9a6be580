//! Tools for inspecting model files without materializing them.
//!
//! The inspector runs an ordinary streaming import with a counting
//! consumer, so a report doubles as a validation pass: schema errors,
//! dangling references, and cycles all surface exactly as they would for a
//! real consumer.

use std::fmt;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::api::{ImportOptions, ImportOutcome, Modex};
use crate::consumer::{Consumer, ElementInfo, Param};
use crate::error::{ModexError, Result};

/// Per-kind element counts and header metadata for one model file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModelReport {
    /// Author / producer version string from the header.
    pub author: Option<String>,
    /// Creation timestamp from the header.
    pub created: Option<NaiveDateTime>,
    /// Element count declared in the header, if present.
    pub declared: Option<u64>,
    /// Records actually delivered by the decode.
    pub delivered: u64,
    /// Libraries.
    pub libraries: u64,
    /// Packages.
    pub packages: u64,
    /// Primitive types.
    pub primitives: u64,
    /// Class declarations.
    pub classes: u64,
    /// Interface declarations.
    pub interfaces: u64,
    /// Enum declarations.
    pub enums: u64,
    /// Annotation declarations.
    pub annotations: u64,
    /// Constructors.
    pub constructors: u64,
    /// Methods.
    pub methods: u64,
    /// Parameters across all signatures.
    pub params: u64,
    /// Fields.
    pub fields: u64,
    /// Enum constants.
    pub enum_constants: u64,
    /// Local variables.
    pub locals: u64,
    /// Return values.
    pub returns: u64,
    /// `this` receivers.
    pub receivers: u64,
    /// Relationships.
    pub relationships: u64,
}

impl fmt::Display for ModelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "model by {} ({} elements delivered)",
            self.author.as_deref().unwrap_or("<unknown>"),
            self.delivered
        )?;
        writeln!(
            f,
            "  libraries: {}, packages: {}, primitives: {}",
            self.libraries, self.packages, self.primitives
        )?;
        writeln!(
            f,
            "  types: {} classes, {} interfaces, {} enums, {} annotations",
            self.classes, self.interfaces, self.enums, self.annotations
        )?;
        writeln!(
            f,
            "  members: {} constructors, {} methods ({} params), {} fields, {} constants",
            self.constructors, self.methods, self.params, self.fields, self.enum_constants
        )?;
        write!(
            f,
            "  bodies: {} locals, {} returns, {} receivers; relationships: {}",
            self.locals, self.returns, self.receivers, self.relationships
        )
    }
}

/// Counts every delivered element by kind.
#[derive(Debug, Default)]
struct CountingConsumer {
    report: ModelReport,
}

impl Consumer for CountingConsumer {
    fn model(&mut self, author: Option<&str>, created: Option<NaiveDateTime>) -> Result<()> {
        self.report.author = author.map(str::to_owned);
        self.report.created = created;
        Ok(())
    }

    fn library(&mut self, _info: ElementInfo) -> Result<()> {
        self.report.libraries += 1;
        Ok(())
    }

    fn package(&mut self, _info: ElementInfo) -> Result<()> {
        self.report.packages += 1;
        Ok(())
    }

    fn primitive(&mut self, _info: ElementInfo) -> Result<()> {
        self.report.primitives += 1;
        Ok(())
    }

    fn class(
        &mut self,
        _info: ElementInfo,
        _extends: Option<u64>,
        _implements: std::collections::BTreeSet<u64>,
    ) -> Result<()> {
        self.report.classes += 1;
        Ok(())
    }

    fn interface(
        &mut self,
        _info: ElementInfo,
        _extends: Option<u64>,
        _implements: std::collections::BTreeSet<u64>,
    ) -> Result<()> {
        self.report.interfaces += 1;
        Ok(())
    }

    fn enumeration(
        &mut self,
        _info: ElementInfo,
        _extends: Option<u64>,
        _implements: std::collections::BTreeSet<u64>,
    ) -> Result<()> {
        self.report.enums += 1;
        Ok(())
    }

    fn annotation(
        &mut self,
        _info: ElementInfo,
        _extends: Option<u64>,
        _implements: std::collections::BTreeSet<u64>,
    ) -> Result<()> {
        self.report.annotations += 1;
        Ok(())
    }

    fn constructor(&mut self, _info: ElementInfo, params: Vec<Param>) -> Result<()> {
        self.report.constructors += 1;
        self.report.params += params.len() as u64;
        Ok(())
    }

    fn method(
        &mut self,
        _info: ElementInfo,
        _overrides: std::collections::BTreeSet<u64>,
        params: Vec<Param>,
    ) -> Result<()> {
        self.report.methods += 1;
        self.report.params += params.len() as u64;
        Ok(())
    }

    fn field(&mut self, _info: ElementInfo, _type_id: u64, _array_dim: Option<u32>) -> Result<()> {
        self.report.fields += 1;
        Ok(())
    }

    fn enum_constant(&mut self, _info: ElementInfo, _type_id: u64) -> Result<()> {
        self.report.enum_constants += 1;
        Ok(())
    }

    fn local(
        &mut self,
        _info: ElementInfo,
        _schema_type: &str,
        _type_id: u64,
        _array_dim: Option<u32>,
        _param_index: Option<u32>,
    ) -> Result<()> {
        self.report.locals += 1;
        Ok(())
    }

    fn context_this(&mut self, _info: ElementInfo, _type_id: u64) -> Result<()> {
        self.report.receivers += 1;
        Ok(())
    }

    fn returned(
        &mut self,
        _info: ElementInfo,
        _type_id: u64,
        _array_dim: Option<u32>,
    ) -> Result<()> {
        self.report.returns += 1;
        Ok(())
    }

    fn relationship(
        &mut self,
        _info: ElementInfo,
        _schema_type: &str,
        _origin: u64,
        _dest: u64,
    ) -> Result<()> {
        self.report.relationships += 1;
        Ok(())
    }
}

/// The Modex inspection tool.
#[derive(Debug)]
pub struct ModexInspector;

impl ModexInspector {
    /// Analyzes a model file and returns its per-kind counts.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<ModelReport> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::inspect_from_reader(file)
    }

    /// Analyzes a gzip stream and returns its per-kind counts.
    pub fn inspect_from_reader<R: Read>(reader: R) -> Result<ModelReport> {
        let mut counting = CountingConsumer::default();
        let outcome = Modex::import_stream_from_reader(
            reader,
            &mut counting,
            ImportOptions::default(),
        )?;
        let mut report = counting.report;
        match outcome {
            ImportOutcome::Completed(stats) => {
                report.declared = stats.declared;
                report.delivered = stats.delivered;
                Ok(report)
            }
            // No token is exposed here, so a cancelled outcome means the
            // options were tampered with mid-run.
            ImportOutcome::Cancelled => Err(ModexError::Format(
                "inspection was cancelled before completion".into(),
            )),
        }
    }
}
