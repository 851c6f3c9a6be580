//! The in-memory tree model and its text codec.
//!
//! Producers that hold a whole model before writing it out build a
//! [`Model`], then hand it to [`crate::Modex::export`]. The root is encoded
//! bottom-up-count/top-down-body: the total element count is computed from
//! the tree and written before the body so a streaming reader can size its
//! progress budget without a second pass.
//!
//! Every element type supports `encode`, `decode`, `subtree_size`, and
//! `release`. Decoding tolerates absent optional fields by inspecting the
//! current tag; required fields produce
//! [`crate::ModexError::MissingField`] when absent, and tags outside the
//! schema produce [`crate::ModexError::UnknownTag`].

mod core;
mod elements;
mod id;

pub use self::core::ElementCore;
pub use self::elements::{
    Library, Method, Package, PrimitiveType, Relationship, TypeDecl, TypeKind, Var, VarKind,
};
pub use self::id::IdAllocator;

pub(crate) use self::elements::{misplaced, unknown_tag};

use chrono::NaiveDateTime;
use rayon::prelude::*;

use crate::cursor::Cursor;
use crate::error::{ModexError, Result};
use crate::schema::{parse_id, Token};
use crate::text::MarkupWriter;

/// Wire format of the creation timestamp.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The model root: metadata plus the three top-level forests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Model {
    /// Author string; doubles as the producer version.
    pub author: Option<String>,
    /// Creation timestamp.
    pub created: Option<NaiveDateTime>,
    /// Primitive types.
    pub primitives: Vec<PrimitiveType>,
    /// Libraries, each recursively holding packages, types, and members.
    pub libraries: Vec<Library>,
    /// Cross-reference relationships.
    pub relationships: Vec<Relationship>,
}

impl Model {
    /// Creates an empty model with the given metadata.
    pub fn new(author: Option<String>, created: Option<NaiveDateTime>) -> Self {
        Self {
            author,
            created,
            ..Self::default()
        }
    }

    /// Number of elements declared in the model.
    ///
    /// This is the value written into the count field ahead of the body.
    pub fn subtree_size(&self) -> usize {
        self.primitives
            .iter()
            .map(PrimitiveType::subtree_size)
            .sum::<usize>()
            + self
                .libraries
                .iter()
                .map(Library::subtree_size)
                .sum::<usize>()
            + self
                .relationships
                .iter()
                .map(Relationship::subtree_size)
                .sum::<usize>()
    }

    /// Drops all owned content.
    pub fn release(&mut self) {
        self.author = None;
        self.created = None;
        self.primitives = Vec::new();
        self.libraries = Vec::new();
        self.relationships = Vec::new();
    }

    /// Encodes the model to uncompressed payload text.
    ///
    /// Libraries are independent subtrees and are encoded into separate
    /// buffers on the rayon pool, then concatenated in order; elements do
    /// not mutate shared state during encode, so this is safe parallelism.
    pub fn to_text(&self) -> String {
        let mut w = MarkupWriter::with_capacity(1024);
        w.prologue();
        w.open(Token::Model);
        if let Some(author) = &self.author {
            w.leaf(Token::ModelAuthor, author);
        }
        if let Some(created) = &self.created {
            w.leaf(
                Token::ModelCreated,
                &created.format(TIMESTAMP_FORMAT).to_string(),
            );
        }
        w.leaf_radix(Token::ModelNumElements, self.subtree_size() as u64);
        for primitive in &self.primitives {
            primitive.encode(&mut w, Token::ModelPrimitive);
        }
        let fragments: Vec<String> = self
            .libraries
            .par_iter()
            .map(|library| {
                let mut lw = MarkupWriter::new();
                library.encode(&mut lw, Token::ModelLibrary);
                lw.into_string()
            })
            .collect();
        for fragment in &fragments {
            w.splice(fragment);
        }
        for relationship in &self.relationships {
            relationship.encode(&mut w, Token::ModelRelationship);
        }
        w.close(Token::Model);
        w.into_string()
    }

    /// Decodes a model from uncompressed payload text.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut cur = Cursor::new(text);
        let model = Self::decode(&mut cur)?;
        if !cur.at_end()? {
            return Err(ModexError::Format(
                "trailing content after model root".into(),
            ));
        }
        Ok(model)
    }

    fn decode(cur: &mut Cursor<'_>) -> Result<Self> {
        cur.open_expect(Token::Model)?;
        let mut model = Self::default();
        while let Some(tag) = cur.peek_open()? {
            let token = Token::parse(tag).ok_or_else(|| unknown_tag(tag))?;
            match token {
                Token::ModelAuthor => {
                    model.author = Some(cur.leaf_required(token)?);
                }
                Token::ModelCreated => {
                    let text = cur.leaf_required(token)?;
                    let created = NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT)
                        .map_err(|e| {
                            ModexError::Format(format!("invalid timestamp {text:?}: {e}"))
                        })?;
                    model.created = Some(created);
                }
                // The declared count is advisory (progress sizing only);
                // the tree decoder ignores it.
                Token::ModelNumElements => {
                    parse_id(&cur.leaf_required(token)?)?;
                }
                Token::ModelPrimitive => model
                    .primitives
                    .push(PrimitiveType::decode(cur, token)?),
                Token::ModelLibrary => model.libraries.push(Library::decode(cur, token)?),
                Token::ModelRelationship => {
                    model.relationships.push(Relationship::decode(cur, token)?)
                }
                other => return Err(misplaced(other, Token::Model)),
            }
        }
        cur.close(Token::Model)?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_created() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 3, 9)
            .and_then(|d| d.and_hms_opt(14, 30, 0))
            .expect("valid timestamp")
    }

    fn sample_model() -> Model {
        let mut alloc = IdAllocator::new();
        let mut model = Model::new(Some("1.2.0".into()), Some(sample_created()));

        let int_id = alloc.next_id();
        model
            .primitives
            .push(PrimitiveType::new(ElementCore::named(int_id, "int")));

        let mut library = Library::new(ElementCore::named(alloc.next_id(), "rt.jar"));
        let mut package = Package::new(ElementCore::named(alloc.next_id(), "com.example"));
        let mut class = TypeDecl::new(
            ElementCore::named(alloc.next_id(), "Widget"),
            TypeKind::Class,
        );
        let class_id = class.core.id;
        let mut method = Method::new(ElementCore::named(alloc.next_id(), "get"));
        method.params.push(Var::new(
            ElementCore::named(alloc.next_id(), "i"),
            VarKind::Param { index: 0 },
            int_id,
        ));
        method.returned = Some(Var::new(
            ElementCore::new(alloc.next_id()),
            VarKind::Return,
            int_id,
        ));
        class.methods.push(method);
        package.types.push(class);
        library.packages.push(package);
        model.libraries.push(library);

        model.relationships.push(Relationship::new(
            ElementCore::new(alloc.next_id()),
            class_id,
            int_id,
            "uses",
        ));
        model
    }

    #[test]
    fn model_round_trips_through_text() {
        let model = sample_model();
        let text = model.to_text();
        let decoded = Model::from_text(&text).expect("decode");
        assert_eq!(decoded, model);
    }

    #[test]
    fn declared_count_precedes_the_body() {
        let model = sample_model();
        let text = model.to_text();
        // primitive, library, package, class, method, param, return,
        // relationship.
        assert_eq!(model.subtree_size(), 8);
        let count_pos = text.find("<m>").expect("count field");
        let first_primitive = text.find("<j>").expect("primitive");
        assert!(count_pos < first_primitive);
    }

    #[test]
    fn metadata_is_optional() {
        let model = Model::default();
        let decoded = Model::from_text(&model.to_text()).expect("decode");
        assert_eq!(decoded.author, None);
        assert_eq!(decoded.created, None);
    }

    #[test]
    fn unknown_root_child_is_fatal() {
        let err = Model::from_text("<g><zz>5</zz></g>").expect_err("unknown tag");
        assert!(matches!(err, ModexError::UnknownTag(_)));
    }

    #[test]
    fn trailing_content_is_fatal() {
        let err = Model::from_text("<g></g><g></g>").expect_err("trailing");
        assert!(matches!(err, ModexError::Format(_)));
    }

    #[test]
    fn timestamp_round_trips_exactly() {
        let model = Model::new(None, Some(sample_created()));
        let text = model.to_text();
        assert!(text.contains("<l>2016-03-09T14:30:00</l>"), "{text}");
        let decoded = Model::from_text(&text).expect("decode");
        assert_eq!(decoded.created, Some(sample_created()));
    }
}
