//! The streaming decoder.
//!
//! Walks the payload text structurally, top-down and forward-only: each
//! element's ordered fields are read in place, repeated children of a
//! declared kind are consumed in a loop, and control returns to the parent
//! when a non-matching tag appears. For every schema element one
//! lightweight record is built, carrying the parsed scalar fields and a
//! prerequisite id set (the structural parent plus any reference ids
//! gathered so far), and handed to the [`crate::resolver::Resolver`],
//! the only route by which the consumer is ever invoked.
//!
//! The declared total element count, when present, becomes the progress
//! budget. Every structural step checks the cancellation token first and
//! returns early, abandoning partially built state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use tracing::debug;

use crate::api::{ImportOutcome, ImportStats, Version};
use crate::consumer::{CancelToken, Consumer, ElementInfo, Param, ProgressSink};
use crate::cursor::Cursor;
use crate::error::{ModexError, Result};
use crate::model::{TypeKind, TIMESTAMP_FORMAT};
use crate::resolver::{PendingRecord, Record, Resolver};
use crate::schema::{parse_id, parse_index, Modifier, Token};

/// Runs a streaming import over decompressed payload text.
pub(crate) fn stream_import<C: Consumer>(
    text: &str,
    consumer: &mut C,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
    expected_version: Option<&Version>,
) -> Result<ImportOutcome> {
    let decoder = StreamDecoder {
        cur: Cursor::new(text),
        resolver: Resolver::new(),
        consumer,
        progress,
        cancel: cancel.clone(),
        expected_version,
    };
    decoder.run()
}

struct StreamDecoder<'a, C: Consumer> {
    cur: Cursor<'a>,
    resolver: Resolver,
    consumer: &'a mut C,
    progress: &'a mut dyn ProgressSink,
    cancel: CancelToken,
    expected_version: Option<&'a Version>,
}

impl<'a, C: Consumer> StreamDecoder<'a, C> {
    fn run(mut self) -> Result<ImportOutcome> {
        self.cur.open_expect(Token::Model)?;
        let author = self.cur.leaf_if(Token::ModelAuthor)?;
        let created = match self.cur.leaf_if(Token::ModelCreated)? {
            Some(text) => Some(
                NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT).map_err(|e| {
                    ModexError::Format(format!("invalid timestamp {text:?}: {e}"))
                })?,
            ),
            None => None,
        };
        let declared = match self.cur.leaf_if(Token::ModelNumElements)? {
            Some(text) => Some(parse_id(&text)?),
            None => None,
        };
        if let Some(total) = declared {
            self.progress.begin(total);
        }
        if let Some(expected) = self.expected_version {
            check_version(author.as_deref(), expected)?;
        }
        debug!(?author, ?declared, "starting streaming import");

        self.submit(PendingRecord::new(
            None,
            None,
            Record::Model { author, created },
        ))?;

        self.read_children(Token::ModelPrimitive, |s| s.read_primitive(None))?;
        self.read_children(Token::ModelLibrary, |s| s.read_library(None))?;
        self.read_children(Token::ModelRelationship, |s| s.read_relationship())?;

        if self.cancel.is_cancelled() {
            debug!("streaming import cancelled");
            return Ok(ImportOutcome::Cancelled);
        }
        self.cur.close(Token::Model)?;
        if !self.cur.at_end()? {
            return Err(ModexError::Format(
                "trailing content after model root".into(),
            ));
        }
        self.resolver.verify()?;
        let stats = ImportStats {
            submitted: self.resolver.submitted(),
            delivered: self.resolver.delivered(),
            declared,
        };
        debug!(
            submitted = stats.submitted,
            delivered = stats.delivered,
            "streaming import finished"
        );
        Ok(ImportOutcome::Completed(stats))
    }

    fn submit(&mut self, record: PendingRecord) -> Result<()> {
        self.resolver
            .submit(record, self.consumer, self.progress, &self.cancel)
    }

    /// Consumes consecutive children wrapped in `tag`, invoking `f` for
    /// each with the cursor positioned just past the open tag.
    fn read_children<F>(&mut self, tag: Token, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Self) -> Result<()>,
    {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            match self.cur.peek_open()? {
                Some(name) if name == tag.text() => {
                    self.cur.open()?;
                    f(self)?;
                    if self.cancel.is_cancelled() {
                        // The child may have bailed out mid-element; the
                        // cursor is abandoned where it stands.
                        return Ok(());
                    }
                    self.cur.close(tag)?;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Reads the four leading fields in their fixed order.
    fn read_core(&mut self, parent: Option<u64>) -> Result<ElementInfo> {
        let name = self.cur.leaf_if(Token::ElementName)?;
        let id = parse_id(&self.cur.leaf_required(Token::ElementId)?)?;
        let mut modifiers = BTreeSet::new();
        while let Some(text) = self.cur.leaf_if(Token::ElementTag)? {
            let modifier = Token::parse(&text)
                .and_then(Modifier::from_token)
                .ok_or_else(|| {
                    ModexError::UnknownTag(format!("{text:?} is not a modifier tag"))
                })?;
            modifiers.insert(modifier);
        }
        let mut attrs = BTreeMap::new();
        while let Some(name) = self.cur.peek_open()? {
            if name != Token::ElementAttr.text() {
                break;
            }
            self.cur.open()?;
            let key = self.cur.leaf_required(Token::AttrKey)?;
            let value = self.cur.leaf_required(Token::AttrVal)?;
            self.cur.close(Token::ElementAttr)?;
            attrs.insert(key, value);
        }
        Ok(ElementInfo {
            name,
            id,
            parent_id: parent,
            modifiers,
            attrs,
        })
    }

    fn read_primitive(&mut self, parent: Option<u64>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        let info = self.read_core(parent)?;
        let id = info.id;
        self.submit(PendingRecord::new(
            Some(id),
            parent,
            Record::Primitive { info },
        ))
    }

    fn read_library(&mut self, parent: Option<u64>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        let info = self.read_core(parent)?;
        let id = info.id;
        self.submit(PendingRecord::new(
            Some(id),
            parent,
            Record::Library { info },
        ))?;
        self.read_children(Token::LibraryPackage, |s| s.read_package(Some(id)))
    }

    fn read_package(&mut self, parent: Option<u64>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        let info = self.read_core(parent)?;
        let id = info.id;
        self.submit(PendingRecord::new(
            Some(id),
            parent,
            Record::Package { info },
        ))?;
        self.read_children(Token::PackageClass, |s| {
            s.read_type(Some(id), TypeKind::Class)
        })?;
        self.read_children(Token::PackageInterface, |s| {
            s.read_type(Some(id), TypeKind::Interface)
        })?;
        self.read_children(Token::PackageEnum, |s| {
            s.read_type(Some(id), TypeKind::Enum)
        })?;
        self.read_children(Token::PackageAnnotation, |s| {
            s.read_type(Some(id), TypeKind::Annotation)
        })
    }

    fn read_type(&mut self, parent: Option<u64>, kind: TypeKind) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        let info = self.read_core(parent)?;
        let id = info.id;
        let extends = match self.cur.leaf_if(Token::TypeExtends)? {
            Some(text) => Some(parse_id(&text)?),
            None => None,
        };
        let mut implements = BTreeSet::new();
        while let Some(text) = self.cur.leaf_if(Token::TypeImplements)? {
            implements.insert(parse_id(&text)?);
        }
        let mut record = PendingRecord::new(
            Some(id),
            parent,
            Record::Type {
                info,
                kind,
                extends,
                implements: implements.clone(),
            },
        );
        if let Some(extends) = extends {
            record.prereqs.insert(extends);
        }
        record.prereqs.extend(implements.iter().copied());
        self.submit(record)?;

        self.read_children(Token::TypeConstructor, |s| {
            s.read_method(Some(id), true)
        })?;
        self.read_children(Token::TypeMethod, |s| s.read_method(Some(id), false))?;
        self.read_children(Token::TypeField, |s| s.read_var(Some(id), VarShape::Field))?;
        self.read_children(Token::TypeNestedClass, |s| {
            s.read_type(Some(id), TypeKind::Class)
        })?;
        self.read_children(Token::TypeNestedInterface, |s| {
            s.read_type(Some(id), TypeKind::Interface)
        })?;
        self.read_children(Token::TypeNestedEnum, |s| {
            s.read_type(Some(id), TypeKind::Enum)
        })?;
        self.read_children(Token::TypeNestedAnnotation, |s| {
            s.read_type(Some(id), TypeKind::Annotation)
        })?;
        if kind == TypeKind::Enum {
            self.read_children(Token::EnumConstant, |s| {
                s.read_var(Some(id), VarShape::EnumConstant)
            })?;
        }
        Ok(())
    }

    fn read_method(&mut self, parent: Option<u64>, constructor: bool) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        let info = self.read_core(parent)?;
        let id = info.id;

        // Parameters are parsed (and submitted) before the method record
        // itself; their type references join the method's prerequisites so
        // the delivered signature only names already-delivered types.
        let mut params: Vec<Param> = Vec::new();
        self.read_children(Token::MethodParam, |s| {
            if let Some(param) = s.read_param(Some(id))? {
                params.push(param);
            }
            Ok(())
        })?;

        let mut overrides = BTreeSet::new();
        while let Some(text) = self.cur.leaf_if(Token::MethodOverrides)? {
            overrides.insert(parse_id(&text)?);
        }

        let mut record = PendingRecord::new(
            Some(id),
            parent,
            if constructor {
                Record::Constructor {
                    info,
                    params: params.clone(),
                }
            } else {
                Record::Method {
                    info,
                    overrides: overrides.clone(),
                    params: params.clone(),
                }
            },
        );
        record.prereqs.extend(params.iter().map(|p| p.type_id));
        record.prereqs.extend(overrides.iter().copied());
        self.submit(record)?;

        self.read_children(Token::MethodReturn, |s| s.read_var(Some(id), VarShape::Return))?;
        self.read_children(Token::MethodContextThis, |s| {
            s.read_var(Some(id), VarShape::This)
        })?;
        self.read_children(Token::MethodLocalClass, |s| {
            s.read_type(Some(id), TypeKind::Class)
        })?;
        self.read_children(Token::MethodLocalInterface, |s| {
            s.read_type(Some(id), TypeKind::Interface)
        })?;
        self.read_children(Token::MethodLocalEnum, |s| {
            s.read_type(Some(id), TypeKind::Enum)
        })?;
        self.read_children(Token::MethodLocalAnnotation, |s| {
            s.read_type(Some(id), TypeKind::Annotation)
        })?;
        self.read_children(Token::MethodLocalVar, |s| s.read_var(Some(id), VarShape::Local))
    }

    /// Reads one parameter element, submits its ordering record, and
    /// returns the aggregated signature entry for the owning method.
    fn read_param(&mut self, parent: Option<u64>) -> Result<Option<Param>> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }
        let info = self.read_core(parent)?;
        let id = info.id;
        let type_id = parse_id(&self.cur.leaf_required(Token::VarType)?)?;
        let array_dim = match self.cur.leaf_if(Token::VarArrayDim)? {
            Some(text) => Some(parse_index(&text)?),
            None => None,
        };
        let index = parse_index(&self.cur.leaf_required(Token::ParamIndex)?)?;
        let param = Param {
            name: info.name.clone(),
            id,
            parent_id: parent,
            modifiers: info.modifiers.clone(),
            attrs: info.attrs.clone(),
            type_id,
            array_dim,
            index,
        };
        let mut record = PendingRecord::new(Some(id), parent, Record::Param { info });
        record.prereqs.insert(type_id);
        self.submit(record)?;
        Ok(Some(param))
    }

    fn read_var(&mut self, parent: Option<u64>, shape: VarShape) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        let info = self.read_core(parent)?;
        let id = info.id;
        let type_id = parse_id(&self.cur.leaf_required(Token::VarType)?)?;
        let array_dim = match self.cur.leaf_if(Token::VarArrayDim)? {
            Some(text) => Some(parse_index(&text)?),
            None => None,
        };
        let payload = match shape {
            VarShape::Field => Record::Field {
                info,
                type_id,
                array_dim,
            },
            VarShape::Return => Record::Return {
                info,
                type_id,
                array_dim,
            },
            VarShape::This => Record::This { info, type_id },
            VarShape::EnumConstant => Record::EnumConstant { info, type_id },
            VarShape::Local => {
                let schema_type = self.cur.leaf_required(Token::LocalSchemaType)?;
                let param_index = match self.cur.leaf_if(Token::ParamIndex)? {
                    Some(text) => Some(parse_index(&text)?),
                    None => None,
                };
                Record::Local {
                    info,
                    schema_type,
                    type_id,
                    array_dim,
                    param_index,
                }
            }
        };
        let mut record = PendingRecord::new(Some(id), parent, payload);
        record.prereqs.insert(type_id);
        self.submit(record)
    }

    fn read_relationship(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        let info = self.read_core(None)?;
        let id = info.id;
        let origin = parse_id(&self.cur.leaf_required(Token::RelationshipOriginId)?)?;
        let dest = parse_id(&self.cur.leaf_required(Token::RelationshipDestId)?)?;
        let schema_type = self.cur.leaf_required(Token::RelationshipSchemaType)?;
        let mut record = PendingRecord::new(
            Some(id),
            None,
            Record::Relationship {
                info,
                schema_type,
                origin,
                dest,
            },
        );
        record.prereqs.insert(origin);
        record.prereqs.insert(dest);
        self.submit(record)
    }
}

/// Variable roles the decoder distinguishes while reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarShape {
    Field,
    Return,
    This,
    Local,
    EnumConstant,
}

fn check_version(author: Option<&str>, expected: &Version) -> Result<()> {
    let Some(author) = author else {
        return Err(ModexError::Version(
            "file does not declare a producer version".into(),
        ));
    };
    let found = Version::parse(author)?;
    if !found.compatible_with(expected) {
        return Err(ModexError::Version(format!(
            "importer is at version {expected}, but the file was exported with version {found}"
        )));
    }
    Ok(())
}
