//! The container and leaf element types of the tree model.
//!
//! Containment is strictly tree-shaped: Library → Package → type
//! declarations → members. Reference fields (`extends`, `implements`,
//! `overrides`, variable types, relationship endpoints) form a second
//! directed graph over the same id space and may point at elements declared
//! anywhere in the model, including later in the file.

use std::collections::BTreeSet;

use crate::cursor::Cursor;
use crate::error::{ModexError, Result};
use crate::model::core::{CoreBuilder, ElementCore};
use crate::schema::{parse_id, parse_index, Token};
use crate::text::MarkupWriter;

pub(crate) fn unknown_tag(tag: &str) -> ModexError {
    ModexError::UnknownTag(format!("<{tag}>"))
}

pub(crate) fn misplaced(found: Token, context: Token) -> ModexError {
    ModexError::Format(format!(
        "<{}> ({}) is not valid inside <{}>",
        found.text(),
        found.field_name(),
        context.text()
    ))
}

fn required(token: Token) -> ModexError {
    ModexError::MissingField(format!("{} ({})", token.text(), token.field_name()))
}

/// A primitive type declared at the model root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveType {
    /// Shared leading fields.
    pub core: ElementCore,
}

impl PrimitiveType {
    /// Creates a primitive type element.
    pub fn new(core: ElementCore) -> Self {
        Self { core }
    }

    pub(crate) fn encode(&self, w: &mut MarkupWriter, wrapper: Token) {
        w.open(wrapper);
        self.core.encode(w);
        w.close(wrapper);
    }

    pub(crate) fn decode(cur: &mut Cursor<'_>, wrapper: Token) -> Result<Self> {
        cur.open_expect(wrapper)?;
        let mut core = CoreBuilder::default();
        while let Some(tag) = cur.peek_open()? {
            let token = Token::parse(tag).ok_or_else(|| unknown_tag(tag))?;
            if !core.interpret(token, cur)? {
                return Err(misplaced(token, wrapper));
            }
        }
        cur.close(wrapper)?;
        Ok(Self {
            core: core.finish()?,
        })
    }

    /// This element plus all structurally contained elements.
    pub fn subtree_size(&self) -> usize {
        1
    }

    /// Drops owned text and collections.
    pub fn release(&mut self) {
        self.core.release();
    }
}

/// A library: the outermost container of declared code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    /// Shared leading fields.
    pub core: ElementCore,
    /// Packages declared by this library.
    pub packages: Vec<Package>,
}

impl Library {
    /// Creates a library with no packages.
    pub fn new(core: ElementCore) -> Self {
        Self {
            core,
            packages: Vec::new(),
        }
    }

    pub(crate) fn encode(&self, w: &mut MarkupWriter, wrapper: Token) {
        w.open(wrapper);
        self.core.encode(w);
        for package in &self.packages {
            package.encode(w, Token::LibraryPackage);
        }
        w.close(wrapper);
    }

    pub(crate) fn decode(cur: &mut Cursor<'_>, wrapper: Token) -> Result<Self> {
        cur.open_expect(wrapper)?;
        let mut core = CoreBuilder::default();
        let mut packages = Vec::new();
        while let Some(tag) = cur.peek_open()? {
            let token = Token::parse(tag).ok_or_else(|| unknown_tag(tag))?;
            if core.interpret(token, cur)? {
                continue;
            }
            match token {
                Token::LibraryPackage => {
                    packages.push(Package::decode(cur, Token::LibraryPackage)?)
                }
                other => return Err(misplaced(other, wrapper)),
            }
        }
        cur.close(wrapper)?;
        Ok(Self {
            core: core.finish()?,
            packages,
        })
    }

    /// This element plus all structurally contained elements.
    pub fn subtree_size(&self) -> usize {
        1 + self
            .packages
            .iter()
            .map(Package::subtree_size)
            .sum::<usize>()
    }

    /// Drops owned children so memory can be reclaimed incrementally.
    pub fn release(&mut self) {
        self.core.release();
        self.packages = Vec::new();
    }
}

/// A package inside a library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Shared leading fields.
    pub core: ElementCore,
    /// Type declarations in this package, all four kinds together.
    pub types: Vec<TypeDecl>,
}

impl Package {
    /// Creates a package with no types.
    pub fn new(core: ElementCore) -> Self {
        Self {
            core,
            types: Vec::new(),
        }
    }

    pub(crate) fn encode(&self, w: &mut MarkupWriter, wrapper: Token) {
        w.open(wrapper);
        self.core.encode(w);
        encode_types_grouped(
            w,
            &self.types,
            Token::PackageClass,
            Token::PackageInterface,
            Token::PackageEnum,
            Token::PackageAnnotation,
        );
        w.close(wrapper);
    }

    pub(crate) fn decode(cur: &mut Cursor<'_>, wrapper: Token) -> Result<Self> {
        cur.open_expect(wrapper)?;
        let mut core = CoreBuilder::default();
        let mut types = Vec::new();
        while let Some(tag) = cur.peek_open()? {
            let token = Token::parse(tag).ok_or_else(|| unknown_tag(tag))?;
            if core.interpret(token, cur)? {
                continue;
            }
            match token {
                Token::PackageClass => {
                    types.push(TypeDecl::decode(cur, token, TypeKind::Class)?)
                }
                Token::PackageInterface => {
                    types.push(TypeDecl::decode(cur, token, TypeKind::Interface)?)
                }
                Token::PackageEnum => types.push(TypeDecl::decode(cur, token, TypeKind::Enum)?),
                Token::PackageAnnotation => {
                    types.push(TypeDecl::decode(cur, token, TypeKind::Annotation)?)
                }
                other => return Err(misplaced(other, wrapper)),
            }
        }
        cur.close(wrapper)?;
        Ok(Self {
            core: core.finish()?,
            types,
        })
    }

    /// This element plus all structurally contained elements.
    pub fn subtree_size(&self) -> usize {
        1 + self
            .types
            .iter()
            .map(TypeDecl::subtree_size)
            .sum::<usize>()
    }

    /// Drops owned children so memory can be reclaimed incrementally.
    pub fn release(&mut self) {
        self.core.release();
        self.types = Vec::new();
    }
}

/// The four non-primitive type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// A class declaration.
    Class,
    /// An interface declaration.
    Interface,
    /// An enum declaration.
    Enum,
    /// An annotation declaration.
    Annotation,
}

/// A non-primitive type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    /// Shared leading fields.
    pub core: ElementCore,
    /// Which of the four kinds this declaration is.
    pub kind: TypeKind,
    /// Superclass reference; classes only, possibly forward.
    pub extends: Option<u64>,
    /// Implemented-interface references, possibly forward.
    pub implements: BTreeSet<u64>,
    /// Declared constructors.
    pub constructors: Vec<Method>,
    /// Declared methods.
    pub methods: Vec<Method>,
    /// Declared fields.
    pub fields: Vec<Var>,
    /// Nested type declarations, all kinds together.
    pub nested: Vec<TypeDecl>,
    /// Enum constants; meaningful only when `kind` is [`TypeKind::Enum`].
    pub constants: Vec<Var>,
}

impl TypeDecl {
    /// Creates an empty declaration of the given kind.
    pub fn new(core: ElementCore, kind: TypeKind) -> Self {
        Self {
            core,
            kind,
            extends: None,
            implements: BTreeSet::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            nested: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub(crate) fn encode(&self, w: &mut MarkupWriter, wrapper: Token) {
        w.open(wrapper);
        self.core.encode(w);
        if let Some(extends) = self.extends {
            w.leaf_radix(Token::TypeExtends, extends);
        }
        for implemented in &self.implements {
            w.leaf_radix(Token::TypeImplements, *implemented);
        }
        for constructor in &self.constructors {
            constructor.encode(w, Token::TypeConstructor);
        }
        for method in &self.methods {
            method.encode(w, Token::TypeMethod);
        }
        for field in &self.fields {
            field.encode(w, Token::TypeField);
        }
        encode_types_grouped(
            w,
            &self.nested,
            Token::TypeNestedClass,
            Token::TypeNestedInterface,
            Token::TypeNestedEnum,
            Token::TypeNestedAnnotation,
        );
        if self.kind == TypeKind::Enum {
            for constant in &self.constants {
                constant.encode(w, Token::EnumConstant);
            }
        }
        w.close(wrapper);
    }

    pub(crate) fn decode(cur: &mut Cursor<'_>, wrapper: Token, kind: TypeKind) -> Result<Self> {
        cur.open_expect(wrapper)?;
        let mut core = CoreBuilder::default();
        let mut decl = Self::new(ElementCore::new(0), kind);
        while let Some(tag) = cur.peek_open()? {
            let token = Token::parse(tag).ok_or_else(|| unknown_tag(tag))?;
            if core.interpret(token, cur)? {
                continue;
            }
            match token {
                Token::TypeExtends => {
                    decl.extends = Some(parse_id(&cur.leaf_required(token)?)?);
                }
                Token::TypeImplements => {
                    decl.implements.insert(parse_id(&cur.leaf_required(token)?)?);
                }
                Token::TypeConstructor => {
                    decl.constructors.push(Method::decode(cur, token)?);
                }
                Token::TypeMethod => decl.methods.push(Method::decode(cur, token)?),
                Token::TypeField => decl.fields.push(Var::decode(cur, token, VarRole::Field)?),
                Token::TypeNestedClass => {
                    decl.nested.push(Self::decode(cur, token, TypeKind::Class)?)
                }
                Token::TypeNestedInterface => decl
                    .nested
                    .push(Self::decode(cur, token, TypeKind::Interface)?),
                Token::TypeNestedEnum => {
                    decl.nested.push(Self::decode(cur, token, TypeKind::Enum)?)
                }
                Token::TypeNestedAnnotation => decl
                    .nested
                    .push(Self::decode(cur, token, TypeKind::Annotation)?),
                Token::EnumConstant if kind == TypeKind::Enum => decl
                    .constants
                    .push(Var::decode(cur, token, VarRole::EnumConstant)?),
                other => return Err(misplaced(other, wrapper)),
            }
        }
        cur.close(wrapper)?;
        decl.core = core.finish()?;
        Ok(decl)
    }

    /// This element plus all structurally contained elements.
    pub fn subtree_size(&self) -> usize {
        1 + self
            .constructors
            .iter()
            .chain(&self.methods)
            .map(Method::subtree_size)
            .sum::<usize>()
            + self.fields.len()
            + self
                .nested
                .iter()
                .map(TypeDecl::subtree_size)
                .sum::<usize>()
            + self.constants.len()
    }

    /// Drops owned children so memory can be reclaimed incrementally.
    pub fn release(&mut self) {
        self.core.release();
        self.implements = BTreeSet::new();
        self.constructors = Vec::new();
        self.methods = Vec::new();
        self.fields = Vec::new();
        self.nested = Vec::new();
        self.constants = Vec::new();
    }
}

/// A method or constructor declaration.
///
/// The distinction is carried by the containing [`TypeDecl`] collection,
/// not by the struct: both kinds have the same field layout on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    /// Shared leading fields.
    pub core: ElementCore,
    /// Parameters, ordered by their index field.
    pub params: Vec<Var>,
    /// References to overridden methods, possibly forward.
    pub overrides: BTreeSet<u64>,
    /// Return value, if any.
    pub returned: Option<Var>,
    /// The `this` receiver, if any.
    pub context_this: Option<Var>,
    /// Types declared locally inside the method body.
    pub local_types: Vec<TypeDecl>,
    /// Local variables.
    pub locals: Vec<Var>,
}

impl Method {
    /// Creates an empty method.
    pub fn new(core: ElementCore) -> Self {
        Self {
            core,
            params: Vec::new(),
            overrides: BTreeSet::new(),
            returned: None,
            context_this: None,
            local_types: Vec::new(),
            locals: Vec::new(),
        }
    }

    pub(crate) fn encode(&self, w: &mut MarkupWriter, wrapper: Token) {
        w.open(wrapper);
        self.core.encode(w);
        for param in &self.params {
            param.encode(w, Token::MethodParam);
        }
        for overridden in &self.overrides {
            w.leaf_radix(Token::MethodOverrides, *overridden);
        }
        if let Some(returned) = &self.returned {
            returned.encode(w, Token::MethodReturn);
        }
        if let Some(receiver) = &self.context_this {
            receiver.encode(w, Token::MethodContextThis);
        }
        encode_types_grouped(
            w,
            &self.local_types,
            Token::MethodLocalClass,
            Token::MethodLocalInterface,
            Token::MethodLocalEnum,
            Token::MethodLocalAnnotation,
        );
        for local in &self.locals {
            local.encode(w, Token::MethodLocalVar);
        }
        w.close(wrapper);
    }

    pub(crate) fn decode(cur: &mut Cursor<'_>, wrapper: Token) -> Result<Self> {
        cur.open_expect(wrapper)?;
        let mut core = CoreBuilder::default();
        let mut method = Self::new(ElementCore::new(0));
        while let Some(tag) = cur.peek_open()? {
            let token = Token::parse(tag).ok_or_else(|| unknown_tag(tag))?;
            if core.interpret(token, cur)? {
                continue;
            }
            match token {
                Token::MethodParam => {
                    method.params.push(Var::decode(cur, token, VarRole::Param)?)
                }
                Token::MethodOverrides => {
                    method.overrides.insert(parse_id(&cur.leaf_required(token)?)?);
                }
                Token::MethodReturn => {
                    method.returned = Some(Var::decode(cur, token, VarRole::Return)?)
                }
                Token::MethodContextThis => {
                    method.context_this = Some(Var::decode(cur, token, VarRole::This)?)
                }
                Token::MethodLocalClass => method
                    .local_types
                    .push(TypeDecl::decode(cur, token, TypeKind::Class)?),
                Token::MethodLocalInterface => method
                    .local_types
                    .push(TypeDecl::decode(cur, token, TypeKind::Interface)?),
                Token::MethodLocalEnum => method
                    .local_types
                    .push(TypeDecl::decode(cur, token, TypeKind::Enum)?),
                Token::MethodLocalAnnotation => method
                    .local_types
                    .push(TypeDecl::decode(cur, token, TypeKind::Annotation)?),
                Token::MethodLocalVar => {
                    method.locals.push(Var::decode(cur, token, VarRole::Local)?)
                }
                other => return Err(misplaced(other, wrapper)),
            }
        }
        cur.close(wrapper)?;
        method.core = core.finish()?;
        Ok(method)
    }

    /// This element plus all structurally contained elements.
    pub fn subtree_size(&self) -> usize {
        1 + self.params.len()
            + self.locals.len()
            + self
                .local_types
                .iter()
                .map(TypeDecl::subtree_size)
                .sum::<usize>()
            + usize::from(self.returned.is_some())
            + usize::from(self.context_this.is_some())
    }

    /// Drops owned children so memory can be reclaimed incrementally.
    pub fn release(&mut self) {
        self.core.release();
        self.params = Vec::new();
        self.overrides = BTreeSet::new();
        self.returned = None;
        self.context_this = None;
        self.local_types = Vec::new();
        self.locals = Vec::new();
    }
}

/// The roles a typed variable can play; some carry extra fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarKind {
    /// A field of a type.
    Field,
    /// A method parameter with its positional index.
    Param {
        /// Zero-based position in the signature.
        index: u32,
    },
    /// A method return value.
    Return,
    /// A method's `this` receiver.
    This,
    /// A local variable.
    Local {
        /// Free-form schema kind string.
        schema_type: String,
        /// Set when the local shadows a parameter.
        param_index: Option<u32>,
    },
    /// An enum constant.
    EnumConstant,
}

/// Role selector used while decoding; the extra fields arrive from the
/// wire rather than the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VarRole {
    Field,
    Param,
    Return,
    This,
    Local,
    EnumConstant,
}

/// A typed variable: field, parameter, return, receiver, local, or enum
/// constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    /// Shared leading fields.
    pub core: ElementCore,
    /// Which role this variable plays.
    pub kind: VarKind,
    /// Reference to the variable's type, possibly forward.
    pub type_id: u64,
    /// Array dimension; `None` means not an array.
    pub array_dim: Option<u32>,
}

impl Var {
    /// Creates a variable of the given role.
    pub fn new(core: ElementCore, kind: VarKind, type_id: u64) -> Self {
        Self {
            core,
            kind,
            type_id,
            array_dim: None,
        }
    }

    pub(crate) fn encode(&self, w: &mut MarkupWriter, wrapper: Token) {
        w.open(wrapper);
        self.core.encode(w);
        w.leaf_radix(Token::VarType, self.type_id);
        if let Some(dim) = self.array_dim {
            w.leaf_radix(Token::VarArrayDim, u64::from(dim));
        }
        match &self.kind {
            VarKind::Param { index } => {
                w.leaf_radix(Token::ParamIndex, u64::from(*index));
            }
            VarKind::Local {
                schema_type,
                param_index,
            } => {
                w.leaf(Token::LocalSchemaType, schema_type);
                if let Some(index) = param_index {
                    w.leaf_radix(Token::ParamIndex, u64::from(*index));
                }
            }
            _ => {}
        }
        w.close(wrapper);
    }

    pub(crate) fn decode(cur: &mut Cursor<'_>, wrapper: Token, role: VarRole) -> Result<Self> {
        cur.open_expect(wrapper)?;
        let mut core = CoreBuilder::default();
        let mut type_id = None;
        let mut array_dim = None;
        let mut param_index = None;
        let mut schema_type = None;
        while let Some(tag) = cur.peek_open()? {
            let token = Token::parse(tag).ok_or_else(|| unknown_tag(tag))?;
            if core.interpret(token, cur)? {
                continue;
            }
            match token {
                Token::VarType => type_id = Some(parse_id(&cur.leaf_required(token)?)?),
                Token::VarArrayDim => {
                    array_dim = Some(parse_index(&cur.leaf_required(token)?)?)
                }
                Token::ParamIndex if matches!(role, VarRole::Param | VarRole::Local) => {
                    param_index = Some(parse_index(&cur.leaf_required(token)?)?)
                }
                Token::LocalSchemaType if role == VarRole::Local => {
                    schema_type = Some(cur.leaf_required(token)?)
                }
                other => return Err(misplaced(other, wrapper)),
            }
        }
        cur.close(wrapper)?;
        let kind = match role {
            VarRole::Field => VarKind::Field,
            VarRole::Param => VarKind::Param {
                index: param_index.ok_or_else(|| required(Token::ParamIndex))?,
            },
            VarRole::Return => VarKind::Return,
            VarRole::This => VarKind::This,
            VarRole::Local => VarKind::Local {
                schema_type: schema_type.ok_or_else(|| required(Token::LocalSchemaType))?,
                param_index,
            },
            VarRole::EnumConstant => VarKind::EnumConstant,
        };
        Ok(Self {
            core: core.finish()?,
            kind,
            type_id: type_id.ok_or_else(|| required(Token::VarType))?,
            array_dim,
        })
    }

    /// Always 1; variables contain nothing.
    pub fn subtree_size(&self) -> usize {
        1
    }

    /// Drops owned text.
    pub fn release(&mut self) {
        self.core.release();
        if let VarKind::Local { schema_type, .. } = &mut self.kind {
            schema_type.clear();
        }
    }
}

/// A typed, attributed edge between two element ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Shared leading fields.
    pub core: ElementCore,
    /// Origin element id, possibly forward.
    pub origin: u64,
    /// Destination element id, possibly forward.
    pub dest: u64,
    /// Free-form kind string classifying the edge.
    pub schema_type: String,
}

impl Relationship {
    /// Creates a relationship edge.
    pub fn new(core: ElementCore, origin: u64, dest: u64, schema_type: impl Into<String>) -> Self {
        Self {
            core,
            origin,
            dest,
            schema_type: schema_type.into(),
        }
    }

    pub(crate) fn encode(&self, w: &mut MarkupWriter, wrapper: Token) {
        w.open(wrapper);
        self.core.encode(w);
        w.leaf_radix(Token::RelationshipOriginId, self.origin);
        w.leaf_radix(Token::RelationshipDestId, self.dest);
        w.leaf(Token::RelationshipSchemaType, &self.schema_type);
        w.close(wrapper);
    }

    pub(crate) fn decode(cur: &mut Cursor<'_>, wrapper: Token) -> Result<Self> {
        cur.open_expect(wrapper)?;
        let mut core = CoreBuilder::default();
        let mut origin = None;
        let mut dest = None;
        let mut schema_type = None;
        while let Some(tag) = cur.peek_open()? {
            let token = Token::parse(tag).ok_or_else(|| unknown_tag(tag))?;
            if core.interpret(token, cur)? {
                continue;
            }
            match token {
                Token::RelationshipOriginId => {
                    origin = Some(parse_id(&cur.leaf_required(token)?)?)
                }
                Token::RelationshipDestId => {
                    dest = Some(parse_id(&cur.leaf_required(token)?)?)
                }
                Token::RelationshipSchemaType => {
                    schema_type = Some(cur.leaf_required(token)?)
                }
                other => return Err(misplaced(other, wrapper)),
            }
        }
        cur.close(wrapper)?;
        Ok(Self {
            core: core.finish()?,
            origin: origin.ok_or_else(|| required(Token::RelationshipOriginId))?,
            dest: dest.ok_or_else(|| required(Token::RelationshipDestId))?,
            schema_type: schema_type.ok_or_else(|| required(Token::RelationshipSchemaType))?,
        })
    }

    /// Always 1; relationships contain nothing.
    pub fn subtree_size(&self) -> usize {
        1
    }

    /// Drops owned text.
    pub fn release(&mut self) {
        self.core.release();
        self.schema_type = String::new();
    }
}

/// Writes mixed-kind type declarations grouped by kind, in the fixed wire
/// order class, interface, enum, annotation.
fn encode_types_grouped(
    w: &mut MarkupWriter,
    types: &[TypeDecl],
    class_token: Token,
    interface_token: Token,
    enum_token: Token,
    annotation_token: Token,
) {
    for (kind, token) in [
        (TypeKind::Class, class_token),
        (TypeKind::Interface, interface_token),
        (TypeKind::Enum, enum_token),
        (TypeKind::Annotation, annotation_token),
    ] {
        for decl in types.iter().filter(|t| t.kind == kind) {
            decl.encode(w, token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Modifier;

    fn roundtrip_type(decl: &TypeDecl, wrapper: Token, kind: TypeKind) -> TypeDecl {
        let mut w = MarkupWriter::new();
        decl.encode(&mut w, wrapper);
        let text = w.into_string();
        let mut cur = Cursor::new(&text);
        TypeDecl::decode(&mut cur, wrapper, kind).expect("decode")
    }

    #[test]
    fn class_round_trips_with_members() {
        let mut class = TypeDecl::new(ElementCore::named(1, "Widget"), TypeKind::Class);
        class.extends = Some(9);
        class.implements.insert(4);
        class.implements.insert(7);
        class.core.modifiers.insert(Modifier::Public);

        let mut field = Var::new(ElementCore::named(2, "count"), VarKind::Field, 20);
        field.array_dim = Some(1);
        class.fields.push(field);

        let mut method = Method::new(ElementCore::named(3, "get"));
        method.overrides.insert(17);
        method.params.push(Var::new(
            ElementCore::named(5, "idx"),
            VarKind::Param { index: 0 },
            20,
        ));
        method.returned = Some(Var::new(ElementCore::new(6), VarKind::Return, 20));
        class.methods.push(method);

        let decoded = roundtrip_type(&class, Token::PackageClass, TypeKind::Class);
        assert_eq!(decoded, class);
    }

    #[test]
    fn enum_constants_round_trip() {
        let mut decl = TypeDecl::new(ElementCore::named(10, "Color"), TypeKind::Enum);
        decl.constants
            .push(Var::new(ElementCore::named(11, "RED"), VarKind::EnumConstant, 10));
        decl.constants
            .push(Var::new(ElementCore::named(12, "BLUE"), VarKind::EnumConstant, 10));

        let decoded = roundtrip_type(&decl, Token::PackageEnum, TypeKind::Enum);
        assert_eq!(decoded, decl);
    }

    #[test]
    fn enum_constant_inside_class_is_rejected() {
        let text = "<q><d>1</d><ad><d>2</d><ao>1</ao></ad></q>";
        let mut cur = Cursor::new(text);
        let err =
            TypeDecl::decode(&mut cur, Token::PackageClass, TypeKind::Class).expect_err("reject");
        assert!(matches!(err, ModexError::Format(_)));
    }

    #[test]
    fn nested_types_group_by_kind_on_the_wire() {
        let mut outer = TypeDecl::new(ElementCore::named(1, "Outer"), TypeKind::Class);
        outer
            .nested
            .push(TypeDecl::new(ElementCore::named(2, "I"), TypeKind::Interface));
        outer
            .nested
            .push(TypeDecl::new(ElementCore::named(3, "C"), TypeKind::Class));

        let mut w = MarkupWriter::new();
        outer.encode(&mut w, Token::PackageClass);
        let text = w.into_string();
        let class_pos = text.find("<w>").expect("nested class");
        let iface_pos = text.find("<x>").expect("nested interface");
        assert!(class_pos < iface_pos, "classes precede interfaces: {text}");
    }

    #[test]
    fn local_var_requires_schema_type() {
        let text = "<al><d>4</d><ao>2</ao></al>";
        let mut cur = Cursor::new(text);
        let err = Var::decode(&mut cur, Token::MethodLocalVar, VarRole::Local)
            .expect_err("schema type required");
        assert!(matches!(err, ModexError::MissingField(_)));
    }

    #[test]
    fn param_requires_index() {
        let text = "<ae><d>4</d><ao>2</ao></ae>";
        let mut cur = Cursor::new(text);
        let err =
            Var::decode(&mut cur, Token::MethodParam, VarRole::Param).expect_err("index required");
        assert!(matches!(err, ModexError::MissingField(_)));
    }

    #[test]
    fn relationship_round_trips() {
        let rel = Relationship::new(ElementCore::named(40, "flow"), 3, 17, "data.flow");
        let mut w = MarkupWriter::new();
        rel.encode(&mut w, Token::ModelRelationship);
        let text = w.into_string();
        let mut cur = Cursor::new(&text);
        let decoded = Relationship::decode(&mut cur, Token::ModelRelationship).expect("decode");
        assert_eq!(decoded, rel);
    }

    #[test]
    fn subtree_sizes_count_structural_children_only() {
        let mut lib = Library::new(ElementCore::named(0, "rt"));
        let mut pkg = Package::new(ElementCore::named(1, "util"));
        let mut class = TypeDecl::new(ElementCore::named(2, "List"), TypeKind::Class);
        let mut method = Method::new(ElementCore::named(3, "size"));
        method.returned = Some(Var::new(ElementCore::new(4), VarKind::Return, 8));
        class.methods.push(method);
        class
            .fields
            .push(Var::new(ElementCore::named(5, "len"), VarKind::Field, 8));
        pkg.types.push(class);
        lib.packages.push(pkg);

        // library + package + class + method + return + field
        assert_eq!(lib.subtree_size(), 6);
    }

    #[test]
    fn release_drops_children() {
        let mut lib = Library::new(ElementCore::named(0, "rt"));
        lib.packages.push(Package::new(ElementCore::named(1, "p")));
        lib.release();
        assert!(lib.packages.is_empty());
        assert_eq!(lib.core.name, None);
    }
}
