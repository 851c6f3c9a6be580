//! The fields shared by every element: id, optional name, modifier tags,
//! and free-form attributes.

use std::collections::{BTreeMap, BTreeSet};

use crate::cursor::Cursor;
use crate::error::{ModexError, Result};
use crate::schema::{parse_id, Modifier, Token};
use crate::text::MarkupWriter;

/// The four leading fields every element carries.
///
/// On the wire they appear in fixed order: name (optional), id (required),
/// repeated modifier tags, repeated attribute pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementCore {
    /// Unique id within the model.
    pub id: u64,
    /// Optional display name.
    pub name: Option<String>,
    /// Visibility and modifier tags.
    pub modifiers: BTreeSet<Modifier>,
    /// Free-form key/value attributes.
    pub attrs: BTreeMap<String, String>,
}

impl ElementCore {
    /// Creates an anonymous core with the given id.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: None,
            modifiers: BTreeSet::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// Creates a named core with the given id.
    pub fn named(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            modifiers: BTreeSet::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// Writes the four leading fields.
    pub(crate) fn encode(&self, w: &mut MarkupWriter) {
        if let Some(name) = &self.name {
            w.leaf(Token::ElementName, name);
        }
        w.leaf_radix(Token::ElementId, self.id);
        for modifier in &self.modifiers {
            w.leaf(Token::ElementTag, modifier.token().text());
        }
        for (key, value) in &self.attrs {
            w.open(Token::ElementAttr);
            w.leaf(Token::AttrKey, key);
            w.leaf(Token::AttrVal, value);
            w.close(Token::ElementAttr);
        }
    }

    /// Drops owned text and collections, keeping only the id.
    pub fn release(&mut self) {
        self.name = None;
        self.modifiers = BTreeSet::new();
        self.attrs = BTreeMap::new();
    }
}

/// Accumulates core fields during decoding; the id may arrive at any point
/// in the field order but must be present by the end of the element.
#[derive(Debug, Default)]
pub(crate) struct CoreBuilder {
    id: Option<u64>,
    name: Option<String>,
    modifiers: BTreeSet<Modifier>,
    attrs: BTreeMap<String, String>,
}

impl CoreBuilder {
    /// Consumes the child element if `token` is one of the core fields.
    /// Returns `true` when the token was handled.
    pub fn interpret(&mut self, token: Token, cur: &mut Cursor<'_>) -> Result<bool> {
        match token {
            Token::ElementName => {
                self.name = Some(cur.leaf_required(Token::ElementName)?);
                Ok(true)
            }
            Token::ElementId => {
                self.id = Some(parse_id(&cur.leaf_required(Token::ElementId)?)?);
                Ok(true)
            }
            Token::ElementTag => {
                let text = cur.leaf_required(Token::ElementTag)?;
                let modifier = Token::parse(&text)
                    .and_then(Modifier::from_token)
                    .ok_or_else(|| {
                        ModexError::UnknownTag(format!("{text:?} is not a modifier tag"))
                    })?;
                self.modifiers.insert(modifier);
                Ok(true)
            }
            Token::ElementAttr => {
                cur.open()?;
                let key = cur.leaf_required(Token::AttrKey)?;
                let value = cur.leaf_required(Token::AttrVal)?;
                cur.close(Token::ElementAttr)?;
                self.attrs.insert(key, value);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Finishes the builder, enforcing the required id.
    pub fn finish(self) -> Result<ElementCore> {
        let id = self.id.ok_or_else(|| {
            ModexError::MissingField(format!(
                "{} ({})",
                Token::ElementId.text(),
                Token::ElementId.field_name()
            ))
        })?;
        Ok(ElementCore {
            id,
            name: self.name,
            modifiers: self.modifiers,
            attrs: self.attrs,
        })
    }
}
