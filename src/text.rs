//! The escaping codec and the markup writer.
//!
//! Free text stored in the model (names, attribute keys and values,
//! relationship kinds) passes through [`escape_into`] on the way out and
//! [`unescape`] on the way in. The reserved markup characters `< > ' " &`
//! become entity references; embedded newlines and tabs become numeric
//! character references so a round trip through any compliant reader
//! preserves the exact string. Code points outside the permitted text
//! ranges are replaced with a single `?` instead of raising an error,
//! matching the encoders this format interoperates with. The replacement
//! is lossy but deterministic and is reported at `warn` level.
//!
//! [`MarkupWriter`] couples the codec with tag emission and a per-session
//! memo cache: models repeat a small set of short strings (attribute keys,
//! relationship kinds) enormously often, so each distinct string is escaped
//! once and reused.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{ModexError, Result};
use crate::schema::Token;

/// Replacement emitted for a code point outside the permitted ranges.
const REPLACEMENT: char = '?';

/// True if `c` may appear literally (or via an entity) in payload text.
///
/// Permitted code points are tab, LF, CR, and the non-control planes minus
/// the noncharacter blocks. Everything else is replaced.
fn is_permitted(c: char) -> bool {
    let cp = c as u32;
    if cp < 0x20 {
        return cp == 0x9 || cp == 0xA || cp == 0xD;
    }
    // C1 controls, except NEL which the reference encoder lets through.
    if (0x7F..=0x9F).contains(&cp) && cp != 0x85 {
        return false;
    }
    // Noncharacters: U+FDD0..=U+FDDF and the two final code points of
    // every plane.
    if (cp & !0xF) == 0xFDD0 {
        return false;
    }
    if (cp & 0xFFFE) == 0xFFFE {
        return false;
    }
    true
}

/// Escapes `s` onto the end of `out`.
pub fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            '&' => out.push_str("&amp;"),
            // Raw newlines and tabs survive markup, but historical readers
            // normalize them to spaces; numeric references do not.
            '\n' => out.push_str("&#010;"),
            '\t' => out.push_str("&#009;"),
            c if is_permitted(c) => out.push(c),
            c => {
                warn!(code_point = c as u32, "replacing invalid code point in text");
                out.push(REPLACEMENT);
            }
        }
    }
}

/// Escapes `s` into an owned string.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    escape_into(&mut out, s);
    out
}

/// The paired inverse of [`escape`].
///
/// Resolves the five named entities and decimal character references. Any
/// other use of `&` is malformed input.
pub fn unescape(s: &str) -> Result<String> {
    if !s.contains('&') {
        return Ok(s.to_owned());
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let semi = tail
            .find(';')
            .ok_or_else(|| ModexError::Format(format!("unterminated entity in text {s:?}")))?;
        let entity = &tail[1..semi];
        match entity {
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "apos" => out.push('\''),
            "quot" => out.push('"'),
            "amp" => out.push('&'),
            _ => {
                let digits = entity.strip_prefix('#').ok_or_else(|| {
                    ModexError::Format(format!("unknown entity &{entity}; in text"))
                })?;
                let cp: u32 = digits.parse().map_err(|_| {
                    ModexError::Format(format!("bad character reference &#{digits}; in text"))
                })?;
                let c = char::from_u32(cp).ok_or_else(|| {
                    ModexError::Format(format!("character reference &#{digits}; out of range"))
                })?;
                out.push(c);
            }
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Buffer-building writer for the tagged text format.
///
/// Tag tokens come from the closed vocabulary and are markup-safe by
/// construction, so only payload text is escaped. Escape results are
/// memoized per writer; a writer lives for one encode session (one buffer),
/// which keeps the cache bounded by the session's distinct strings.
#[derive(Debug)]
pub struct MarkupWriter {
    buf: String,
    cache: HashMap<String, String>,
}

impl MarkupWriter {
    /// Creates a writer with an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            cache: HashMap::new(),
        }
    }

    /// Creates a writer with a pre-sized buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: String::with_capacity(capacity),
            cache: HashMap::new(),
        }
    }

    /// Writes the payload prologue.
    pub fn prologue(&mut self) {
        self.buf.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    }

    /// Opens an element.
    pub fn open(&mut self, token: Token) {
        self.buf.push('<');
        self.buf.push_str(token.text());
        self.buf.push('>');
    }

    /// Closes an element.
    pub fn close(&mut self, token: Token) {
        self.buf.push_str("</");
        self.buf.push_str(token.text());
        self.buf.push('>');
    }

    /// Writes a leaf element holding escaped text content.
    pub fn leaf(&mut self, token: Token, content: &str) {
        self.open(token);
        if content.contains(['<', '>', '\'', '"', '&', '\n', '\t'])
            || content.chars().any(|c| !is_permitted(c))
        {
            // Escaping is the slow path; memoize it per distinct string.
            if let Some(cached) = self.cache.get(content) {
                self.buf.push_str(cached);
            } else {
                let escaped = escape(content);
                self.buf.push_str(&escaped);
                self.cache.insert(content.to_owned(), escaped);
            }
        } else {
            self.buf.push_str(content);
        }
        self.close(token);
    }

    /// Writes a leaf element holding a radix-36 value.
    pub fn leaf_radix(&mut self, token: Token, value: u64) {
        self.open(token);
        crate::schema::format_radix(value, &mut self.buf);
        self.close(token);
    }

    /// Appends an already-encoded fragment verbatim.
    pub fn splice(&mut self, fragment: &str) {
        self.buf.push_str(fragment);
    }

    /// Consumes the writer, returning the built payload.
    pub fn into_string(self) -> String {
        self.buf
    }

    /// Current length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Default for MarkupWriter {
    fn default() -> Self {
        Self::new()
    }
}
