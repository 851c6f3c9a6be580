//! The closed schema vocabulary of the Modex text format.
//!
//! Every element and field on the wire is identified by a short token
//! (`a` through `bc`). The vocabulary is a closed, versioned enumeration:
//! decoding a token with no [`Token`] entry is a hard error, never a silent
//! skip, so that the absence of a field stays distinguishable from
//! corruption.
//!
//! All numeric identifiers and indices are rendered in radix [`RADIX`] for
//! compactness. The "not defined" sentinel is never written as a digit
//! sequence; it is represented by the absence of the field and surfaces in
//! the API as `Option::None`.

use crate::error::{ModexError, Result};

/// Numeric radix used to render every identifier and index.
pub const RADIX: u32 = 36;

/// One token of the schema vocabulary.
///
/// The token text is what appears as the element name on the wire; the
/// field name is the stable diagnostic name reported in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    /// Key half of an attribute pair.
    AttrKey,
    /// Value half of an attribute pair.
    AttrVal,
    /// Optional element name.
    ElementName,
    /// Required element id (radix-36).
    ElementId,
    /// One attribute pair owned by an element.
    ElementAttr,
    /// One modifier tag owned by an element.
    ElementTag,
    /// The model root.
    Model,
    /// One library under the root.
    ModelLibrary,
    /// One relationship under the root.
    ModelRelationship,
    /// One primitive type under the root.
    ModelPrimitive,
    /// Author / producer version string.
    ModelAuthor,
    /// Creation timestamp.
    ModelCreated,
    /// Declared total element count.
    ModelNumElements,
    /// Relationship origin id.
    RelationshipOriginId,
    /// Relationship destination id.
    RelationshipDestId,
    /// Relationship kind string.
    RelationshipSchemaType,
    /// Class declared by a package.
    PackageClass,
    /// Interface declared by a package.
    PackageInterface,
    /// Enum declared by a package.
    PackageEnum,
    /// Annotation declared by a package.
    PackageAnnotation,
    /// Field declared by a type.
    TypeField,
    /// Method declared by a type.
    TypeMethod,
    /// Nested class declared by a type.
    TypeNestedClass,
    /// Nested interface declared by a type.
    TypeNestedInterface,
    /// Nested enum declared by a type.
    TypeNestedEnum,
    /// Nested annotation declared by a type.
    TypeNestedAnnotation,
    /// Constructor declared by a type.
    TypeConstructor,
    /// Superclass reference of a type.
    TypeExtends,
    /// One implemented-interface reference of a type.
    TypeImplements,
    /// One constant declared by an enum.
    EnumConstant,
    /// One parameter of a method.
    MethodParam,
    /// Return value of a method.
    MethodReturn,
    /// One overridden-method reference.
    MethodOverrides,
    /// Local class declared inside a method.
    MethodLocalClass,
    /// Local interface declared inside a method.
    MethodLocalInterface,
    /// Local enum declared inside a method.
    MethodLocalEnum,
    /// Local annotation declared inside a method.
    MethodLocalAnnotation,
    /// Local variable declared inside a method.
    MethodLocalVar,
    /// The method's `this` receiver.
    MethodContextThis,
    /// Array dimension of a typed variable.
    VarArrayDim,
    /// Type reference of a typed variable.
    VarType,
    /// Positional index of a parameter.
    ParamIndex,
    /// Schema kind string of a local variable.
    LocalSchemaType,
    /// Package declared by a library.
    LibraryPackage,
    /// `public` modifier.
    TagPublic,
    /// `protected` modifier.
    TagProtected,
    /// `private` modifier.
    TagPrivate,
    /// `abstract` modifier.
    TagAbstract,
    /// `final` modifier.
    TagFinal,
    /// `native` modifier.
    TagNative,
    /// `static` modifier.
    TagStatic,
    /// `synchronized` modifier.
    TagSynchronized,
    /// `strictfp` modifier.
    TagStrictfp,
    /// `transient` modifier.
    TagTransient,
    /// `volatile` modifier.
    TagVolatile,
}

impl Token {
    /// The token text as it appears on the wire.
    pub const fn text(self) -> &'static str {
        match self {
            Self::AttrKey => "a",
            Self::AttrVal => "b",
            Self::ElementName => "c",
            Self::ElementId => "d",
            Self::ElementAttr => "e",
            Self::ElementTag => "f",
            Self::Model => "g",
            Self::ModelLibrary => "h",
            Self::ModelRelationship => "i",
            Self::ModelPrimitive => "j",
            Self::ModelAuthor => "k",
            Self::ModelCreated => "l",
            Self::ModelNumElements => "m",
            Self::RelationshipOriginId => "n",
            Self::RelationshipDestId => "o",
            Self::RelationshipSchemaType => "p",
            Self::PackageClass => "q",
            Self::PackageInterface => "r",
            Self::PackageEnum => "s",
            Self::PackageAnnotation => "t",
            Self::TypeField => "u",
            Self::TypeMethod => "v",
            Self::TypeNestedClass => "w",
            Self::TypeNestedInterface => "x",
            Self::TypeNestedEnum => "y",
            Self::TypeNestedAnnotation => "z",
            Self::TypeConstructor => "aa",
            Self::TypeExtends => "ab",
            Self::TypeImplements => "ac",
            Self::EnumConstant => "ad",
            Self::MethodParam => "ae",
            Self::MethodReturn => "af",
            Self::MethodOverrides => "ag",
            Self::MethodLocalClass => "ah",
            Self::MethodLocalInterface => "ai",
            Self::MethodLocalEnum => "aj",
            Self::MethodLocalAnnotation => "ak",
            Self::MethodLocalVar => "al",
            Self::MethodContextThis => "am",
            Self::VarArrayDim => "an",
            Self::VarType => "ao",
            Self::ParamIndex => "ap",
            Self::LocalSchemaType => "aq",
            Self::LibraryPackage => "ar",
            Self::TagPublic => "as",
            Self::TagProtected => "at",
            Self::TagPrivate => "au",
            Self::TagAbstract => "av",
            Self::TagFinal => "aw",
            Self::TagNative => "ax",
            Self::TagStatic => "ay",
            Self::TagSynchronized => "az",
            Self::TagStrictfp => "ba",
            Self::TagTransient => "bb",
            Self::TagVolatile => "bc",
        }
    }

    /// The stable field name used in diagnostics.
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::AttrKey => "ATTR_KEY",
            Self::AttrVal => "ATTR_VAL",
            Self::ElementName => "ELEMENT_NAME",
            Self::ElementId => "ELEMENT_ID",
            Self::ElementAttr => "ELEMENT_ATTR",
            Self::ElementTag => "ELEMENT_TAG",
            Self::Model => "MODEL",
            Self::ModelLibrary => "MODEL_LIBRARY",
            Self::ModelRelationship => "MODEL_RELATIONSHIP",
            Self::ModelPrimitive => "MODEL_PRIMITIVE",
            Self::ModelAuthor => "MODEL_AUTHOR",
            Self::ModelCreated => "MODEL_CREATED",
            Self::ModelNumElements => "MODEL_NUM_ELEMENTS",
            Self::RelationshipOriginId => "RELATIONSHIP_ORIGIN_ID",
            Self::RelationshipDestId => "RELATIONSHIP_DEST_ID",
            Self::RelationshipSchemaType => "RELATIONSHIP_SCHEMA_TYPE",
            Self::PackageClass => "PACKAGE_CLASS",
            Self::PackageInterface => "PACKAGE_INTERFACE",
            Self::PackageEnum => "PACKAGE_ENUM",
            Self::PackageAnnotation => "PACKAGE_ANNOTATION",
            Self::TypeField => "TYPE_FIELD",
            Self::TypeMethod => "TYPE_METHOD",
            Self::TypeNestedClass => "TYPE_NESTED_CLASS",
            Self::TypeNestedInterface => "TYPE_NESTED_INTERFACE",
            Self::TypeNestedEnum => "TYPE_NESTED_ENUM",
            Self::TypeNestedAnnotation => "TYPE_NESTED_ANNOTATION",
            Self::TypeConstructor => "TYPE_CONSTRUCTOR",
            Self::TypeExtends => "TYPE_EXTENDS",
            Self::TypeImplements => "TYPE_IMPLEMENTS",
            Self::EnumConstant => "ENUM_CONSTANT",
            Self::MethodParam => "METHOD_PARAM",
            Self::MethodReturn => "METHOD_RETURN",
            Self::MethodOverrides => "METHOD_OVERRIDES",
            Self::MethodLocalClass => "METHOD_LOCAL_CLASS",
            Self::MethodLocalInterface => "METHOD_LOCAL_INTERFACE",
            Self::MethodLocalEnum => "METHOD_LOCAL_ENUM",
            Self::MethodLocalAnnotation => "METHOD_LOCAL_ANNOTATION",
            Self::MethodLocalVar => "METHOD_LOCAL_VAR",
            Self::MethodContextThis => "METHOD_CONTEXT_THIS",
            Self::VarArrayDim => "VAR_ARRAY_DIM",
            Self::VarType => "VAR_TYPE",
            Self::ParamIndex => "PARAM_INDEX",
            Self::LocalSchemaType => "LOCAL_SCHEMA_TYPE",
            Self::LibraryPackage => "LIBRARY_PACKAGE",
            Self::TagPublic => "TAG_PUBLIC",
            Self::TagProtected => "TAG_PROTECTED",
            Self::TagPrivate => "TAG_PRIVATE",
            Self::TagAbstract => "TAG_ABSTRACT",
            Self::TagFinal => "TAG_FINAL",
            Self::TagNative => "TAG_NATIVE",
            Self::TagStatic => "TAG_STATIC",
            Self::TagSynchronized => "TAG_SYNCHRONIZED",
            Self::TagStrictfp => "TAG_STRICTFP",
            Self::TagTransient => "TAG_TRANSIENT",
            Self::TagVolatile => "TAG_VOLATILE",
        }
    }

    /// Looks up the token for a wire string. Returns `None` for text outside
    /// the vocabulary; callers turn that into [`ModexError::UnknownTag`].
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "a" => Self::AttrKey,
            "b" => Self::AttrVal,
            "c" => Self::ElementName,
            "d" => Self::ElementId,
            "e" => Self::ElementAttr,
            "f" => Self::ElementTag,
            "g" => Self::Model,
            "h" => Self::ModelLibrary,
            "i" => Self::ModelRelationship,
            "j" => Self::ModelPrimitive,
            "k" => Self::ModelAuthor,
            "l" => Self::ModelCreated,
            "m" => Self::ModelNumElements,
            "n" => Self::RelationshipOriginId,
            "o" => Self::RelationshipDestId,
            "p" => Self::RelationshipSchemaType,
            "q" => Self::PackageClass,
            "r" => Self::PackageInterface,
            "s" => Self::PackageEnum,
            "t" => Self::PackageAnnotation,
            "u" => Self::TypeField,
            "v" => Self::TypeMethod,
            "w" => Self::TypeNestedClass,
            "x" => Self::TypeNestedInterface,
            "y" => Self::TypeNestedEnum,
            "z" => Self::TypeNestedAnnotation,
            "aa" => Self::TypeConstructor,
            "ab" => Self::TypeExtends,
            "ac" => Self::TypeImplements,
            "ad" => Self::EnumConstant,
            "ae" => Self::MethodParam,
            "af" => Self::MethodReturn,
            "ag" => Self::MethodOverrides,
            "ah" => Self::MethodLocalClass,
            "ai" => Self::MethodLocalInterface,
            "aj" => Self::MethodLocalEnum,
            "ak" => Self::MethodLocalAnnotation,
            "al" => Self::MethodLocalVar,
            "am" => Self::MethodContextThis,
            "an" => Self::VarArrayDim,
            "ao" => Self::VarType,
            "ap" => Self::ParamIndex,
            "aq" => Self::LocalSchemaType,
            "ar" => Self::LibraryPackage,
            "as" => Self::TagPublic,
            "at" => Self::TagProtected,
            "au" => Self::TagPrivate,
            "av" => Self::TagAbstract,
            "aw" => Self::TagFinal,
            "ax" => Self::TagNative,
            "ay" => Self::TagStatic,
            "az" => Self::TagSynchronized,
            "ba" => Self::TagStrictfp,
            "bb" => Self::TagTransient,
            "bc" => Self::TagVolatile,
            _ => return None,
        })
    }
}

/// Boolean visibility/modifier tags an element may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    /// Publicly visible.
    Public,
    /// Visible to subtypes and the declaring package.
    Protected,
    /// Visible to the declaring type only.
    Private,
    /// Abstract type or method.
    Abstract,
    /// Final type, method, or variable.
    Final,
    /// Natively implemented method.
    Native,
    /// Static member.
    Static,
    /// Synchronized method.
    Synchronized,
    /// Strict floating-point semantics.
    Strictfp,
    /// Transient field.
    Transient,
    /// Volatile field.
    Volatile,
}

impl Modifier {
    /// The schema token that carries this modifier on the wire.
    pub const fn token(self) -> Token {
        match self {
            Self::Public => Token::TagPublic,
            Self::Protected => Token::TagProtected,
            Self::Private => Token::TagPrivate,
            Self::Abstract => Token::TagAbstract,
            Self::Final => Token::TagFinal,
            Self::Native => Token::TagNative,
            Self::Static => Token::TagStatic,
            Self::Synchronized => Token::TagSynchronized,
            Self::Strictfp => Token::TagStrictfp,
            Self::Transient => Token::TagTransient,
            Self::Volatile => Token::TagVolatile,
        }
    }

    /// The modifier corresponding to a schema token, if the token is one of
    /// the modifier group.
    pub const fn from_token(token: Token) -> Option<Self> {
        Some(match token {
            Token::TagPublic => Self::Public,
            Token::TagProtected => Self::Protected,
            Token::TagPrivate => Self::Private,
            Token::TagAbstract => Self::Abstract,
            Token::TagFinal => Self::Final,
            Token::TagNative => Self::Native,
            Token::TagStatic => Self::Static,
            Token::TagSynchronized => Self::Synchronized,
            Token::TagStrictfp => Self::Strictfp,
            Token::TagTransient => Self::Transient,
            Token::TagVolatile => Self::Volatile,
            _ => return None,
        })
    }
}

/// Renders an unsigned value in radix-36, appending to `out`.
pub fn format_radix(mut value: u64, out: &mut String) {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    // 13 digits cover u64::MAX in base 36.
    let mut buf = [0u8; 13];
    let mut i = buf.len();
    loop {
        i -= 1;
        buf[i] = DIGITS[(value % u64::from(RADIX)) as usize];
        value /= u64::from(RADIX);
        if value == 0 {
            break;
        }
    }
    for b in &buf[i..] {
        out.push(*b as char);
    }
}

/// Renders an unsigned value in radix-36 as an owned string.
pub fn radix_string(value: u64) -> String {
    let mut s = String::with_capacity(4);
    format_radix(value, &mut s);
    s
}

/// Parses a radix-36 identifier.
pub fn parse_id(text: &str) -> Result<u64> {
    u64::from_str_radix(text.trim(), RADIX)
        .map_err(|e| ModexError::Format(format!("invalid radix-36 id {text:?}: {e}")))
}

/// Parses a radix-36 index or dimension.
pub fn parse_index(text: &str) -> Result<u32> {
    u32::from_str_radix(text.trim(), RADIX)
        .map_err(|e| ModexError::Format(format!("invalid radix-36 index {text:?}: {e}")))
}
