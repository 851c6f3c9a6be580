//! The main entry points for exporting and importing model files.
//!
//! Two read paths are offered, mirroring the two producer/consumer seams:
//!
//! - [`Modex::import`] builds the whole [`Model`] tree in memory: the
//!   bulk path, for callers that want the object graph.
//! - [`Modex::import_stream`] never materializes the tree: it drives a
//!   [`Consumer`] one element at a time, in dependency order, and is the
//!   path of choice for large files.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::compression::{compress_to_writer, decompress_from_reader};
use crate::consumer::{CancelToken, Consumer, NoProgress, ProgressSink};
use crate::error::{ModexError, Result};
use crate::model::Model;
use crate::reader::stream_import;

/// Buffer size for file transport, matching the original exporter's
/// 64 KiB buffered gzip streams.
const IO_BUFFER_SIZE: usize = 64 * 1024;

/// A producer version: the author field of a model doubles as the version
/// string of the tool that wrote it.
///
/// Compatibility is judged on major and minor only; micro releases and
/// qualifiers may differ freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Micro version.
    pub micro: u32,
}

impl Version {
    /// Parses a `major.minor.micro[.qualifier]` string. Missing trailing
    /// segments default to zero.
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = text.split('.');
        let mut numeric = |label: &str| -> Result<u32> {
            match segments.next() {
                None | Some("") => Ok(0),
                Some(segment) => segment.parse().map_err(|_| {
                    ModexError::Version(format!(
                        "unparseable {label} segment in version string {text:?}"
                    ))
                }),
            }
        };
        Ok(Self {
            major: numeric("major")?,
            minor: numeric("minor")?,
            micro: numeric("micro")?,
        })
    }

    /// The version of this crate, for use as an author field.
    pub fn current() -> Self {
        Self::parse(env!("CARGO_PKG_VERSION")).unwrap_or(Self {
            major: 0,
            minor: 0,
            micro: 0,
        })
    }

    /// True when the major and minor components agree.
    pub fn compatible_with(&self, other: &Self) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

/// Counters describing a finished streaming import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    /// Records submitted to the resolver.
    pub submitted: u64,
    /// Records delivered to the consumer; equals `submitted` on success.
    pub delivered: u64,
    /// The count declared in the file header, if present. Advisory only:
    /// it sizes progress reporting and is never enforced against the body.
    pub declared: Option<u64>,
}

/// How a streaming import ended.
///
/// Cancellation is not an error: already-delivered elements are not
/// retracted, and the result simply reports that the run was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The whole file was decoded and every record delivered.
    Completed(ImportStats),
    /// The cancellation token fired; delivery stopped mid-file.
    Cancelled,
}

/// Options for a streaming import.
#[derive(Default)]
pub struct ImportOptions {
    /// When set, the file's author field is parsed as a producer version
    /// and a major/minor mismatch aborts the import before any element is
    /// delivered.
    pub expected_version: Option<Version>,
    /// Cooperative cancellation flag, checked at every structural step.
    pub cancel: CancelToken,
    /// Progress sink; the declared element count becomes its budget.
    pub progress: Option<Box<dyn ProgressSink>>,
}

impl fmt::Debug for ImportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportOptions")
            .field("expected_version", &self.expected_version)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.as_ref().map(|_| "..."))
            .finish()
    }
}

/// The main entry point for reading and writing model files.
#[derive(Debug)]
pub struct Modex;

impl Modex {
    /// Exports a model to a gzip-compressed file.
    ///
    /// ```no_run
    /// use modex::{ElementCore, IdAllocator, Library, Model, Modex};
    ///
    /// let mut alloc = IdAllocator::new();
    /// let mut model = Model::new(Some("1.2.0".into()), None);
    /// model
    ///     .libraries
    ///     .push(Library::new(ElementCore::named(alloc.next_id(), "rt.jar")));
    /// Modex::export("summaries.gz", &model)?;
    /// # Ok::<(), modex::ModexError>(())
    /// ```
    pub fn export<P: AsRef<Path>>(path: P, model: &Model) -> Result<()> {
        let file = File::create(path.as_ref())?;
        Self::export_to_writer(BufWriter::with_capacity(IO_BUFFER_SIZE, file), model)
    }

    /// Exports a model as a gzip stream onto any writer.
    pub fn export_to_writer<W: Write>(writer: W, model: &Model) -> Result<()> {
        let payload = model.to_text();
        debug!(bytes = payload.len(), "encoded model payload");
        compress_to_writer(&payload, writer)
    }

    /// Imports a whole model tree from a gzip-compressed file.
    pub fn import<P: AsRef<Path>>(path: P) -> Result<Model> {
        let file = File::open(path.as_ref())?;
        Self::import_from_reader(BufReader::with_capacity(IO_BUFFER_SIZE, file))
    }

    /// Imports a whole model tree from a gzip stream.
    pub fn import_from_reader<R: Read>(reader: R) -> Result<Model> {
        let payload = decompress_from_reader(reader)?;
        Model::from_text(&payload)
    }

    /// Streams a file into a consumer with default options.
    ///
    /// ```no_run
    /// use modex::{Modex, NoOpConsumer};
    ///
    /// let outcome = Modex::import_stream("summaries.gz", &mut NoOpConsumer)?;
    /// # Ok::<(), modex::ModexError>(())
    /// ```
    pub fn import_stream<P: AsRef<Path>, C: Consumer>(
        path: P,
        consumer: &mut C,
    ) -> Result<ImportOutcome> {
        Self::import_stream_with(path, consumer, ImportOptions::default())
    }

    /// Streams a file into a consumer with explicit options.
    pub fn import_stream_with<P: AsRef<Path>, C: Consumer>(
        path: P,
        consumer: &mut C,
        options: ImportOptions,
    ) -> Result<ImportOutcome> {
        let file = File::open(path.as_ref())?;
        Self::import_stream_from_reader(
            BufReader::with_capacity(IO_BUFFER_SIZE, file),
            consumer,
            options,
        )
    }

    /// Streams a gzip stream into a consumer.
    pub fn import_stream_from_reader<R: Read, C: Consumer>(
        reader: R,
        consumer: &mut C,
        mut options: ImportOptions,
    ) -> Result<ImportOutcome> {
        if options.cancel.is_cancelled() {
            return Ok(ImportOutcome::Cancelled);
        }
        let payload = decompress_from_reader(reader)?;
        let mut default_progress = NoProgress;
        let progress: &mut dyn ProgressSink = match options.progress.as_deref_mut() {
            Some(sink) => sink,
            None => &mut default_progress,
        };
        let result = stream_import(
            &payload,
            consumer,
            progress,
            &options.cancel,
            options.expected_version.as_ref(),
        );
        progress.done();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parsing_accepts_partial_and_qualified_strings() {
        assert_eq!(
            Version::parse("1.2.3").expect("full"),
            Version {
                major: 1,
                minor: 2,
                micro: 3
            }
        );
        assert_eq!(
            Version::parse("2").expect("major only"),
            Version {
                major: 2,
                minor: 0,
                micro: 0
            }
        );
        // A fourth qualifier segment is ignored.
        assert_eq!(
            Version::parse("1.2.3.beta").expect("qualified"),
            Version {
                major: 1,
                minor: 2,
                micro: 3
            }
        );
        assert!(Version::parse("one.two").is_err());
    }

    #[test]
    fn compatibility_ignores_micro() {
        let a = Version::parse("1.2.0").expect("a");
        let b = Version::parse("1.2.9").expect("b");
        let c = Version::parse("1.3.0").expect("c");
        assert!(a.compatible_with(&b));
        assert!(!a.compatible_with(&c));
    }

    #[test]
    fn current_version_matches_the_crate() {
        let current = Version::current();
        assert_eq!(current.to_string(), env!("CARGO_PKG_VERSION"));
    }
}
