//! Forward-only structural cursor over the payload text.
//!
//! The decoder walks the input strictly forward: descend to the first
//! child, interpret its tag, consume its value, advance to the next
//! sibling, return to the parent. The cursor exposes exactly those moves
//! and nothing else; there is no random access and no second pass.
//!
//! A processing instruction prologue and comments are skipped as
//! insignificant, and attributes inside start tags are tolerated (the
//! format itself never relies on them). Self-closing elements are treated
//! as an open immediately followed by its close.

use memchr::memchr;

use crate::error::{ModexError, Result};
use crate::schema::Token;
use crate::text::unescape;

/// One scanned piece of markup.
enum Scan<'a> {
    /// A start tag; `end` is the position just past `>`.
    Open {
        name: &'a str,
        end: usize,
        self_closing: bool,
    },
    /// An end tag; `end` is the position just past `>`.
    Close { name: &'a str, end: usize },
    /// End of input.
    Eof,
}

/// Forward-only cursor over a payload string.
#[derive(Debug)]
pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    /// Set when a self-closing tag was opened; the synthetic close is
    /// consumed by the next `close` call.
    pending_close: Option<&'a str>,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor at the start of `src`.
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            pending_close: None,
        }
    }

    /// Skips whitespace, the prologue, and comments.
    fn skip_insignificant(&mut self) -> Result<()> {
        let bytes = self.src.as_bytes();
        loop {
            while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.src[self.pos..].starts_with("<?") {
                match self.src[self.pos..].find("?>") {
                    Some(rel) => self.pos += rel + 2,
                    None => {
                        return Err(ModexError::Format(format!(
                            "unterminated processing instruction at byte {}",
                            self.pos
                        )))
                    }
                }
            } else if self.src[self.pos..].starts_with("<!--") {
                match self.src[self.pos..].find("-->") {
                    Some(rel) => self.pos += rel + 3,
                    None => {
                        return Err(ModexError::Format(format!(
                            "unterminated comment at byte {}",
                            self.pos
                        )))
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    /// Scans the next markup item without consuming it.
    fn scan(&mut self) -> Result<Scan<'a>> {
        if let Some(name) = self.pending_close {
            return Ok(Scan::Close {
                name,
                end: self.pos,
            });
        }
        self.skip_insignificant()?;
        if self.pos >= self.src.len() {
            return Ok(Scan::Eof);
        }
        let bytes = self.src.as_bytes();
        if bytes[self.pos] != b'<' {
            return Err(ModexError::Format(format!(
                "expected markup at byte {}, found text",
                self.pos
            )));
        }
        let tag_end = memchr(b'>', &bytes[self.pos..])
            .map(|rel| self.pos + rel)
            .ok_or_else(|| {
                ModexError::Format(format!("unterminated tag at byte {}", self.pos))
            })?;
        if bytes[self.pos + 1] == b'/' {
            let name = self.src[self.pos + 2..tag_end].trim_end();
            if name.is_empty() {
                return Err(ModexError::Format(format!(
                    "empty end tag at byte {}",
                    self.pos
                )));
            }
            return Ok(Scan::Close {
                name,
                end: tag_end + 1,
            });
        }
        let self_closing = bytes[tag_end - 1] == b'/';
        let inner_end = if self_closing { tag_end - 1 } else { tag_end };
        let inner = &self.src[self.pos + 1..inner_end];
        // Attributes, if present, follow the first whitespace and are ignored.
        let name = inner
            .split_ascii_whitespace()
            .next()
            .unwrap_or("");
        if name.is_empty() {
            return Err(ModexError::Format(format!(
                "empty start tag at byte {}",
                self.pos
            )));
        }
        Ok(Scan::Open {
            name,
            end: tag_end + 1,
            self_closing,
        })
    }

    /// Returns the tag name of the next start tag, if the next markup is
    /// one. Does not consume anything.
    pub fn peek_open(&mut self) -> Result<Option<&'a str>> {
        match self.scan()? {
            Scan::Open { name, .. } => Ok(Some(name)),
            _ => Ok(None),
        }
    }

    /// Consumes a start tag and returns its name.
    pub fn open(&mut self) -> Result<&'a str> {
        match self.scan()? {
            Scan::Open {
                name,
                end,
                self_closing,
            } => {
                self.pos = end;
                if self_closing {
                    self.pending_close = Some(name);
                }
                Ok(name)
            }
            Scan::Close { name, .. } => Err(ModexError::Format(format!(
                "expected start tag at byte {}, found </{name}>",
                self.pos
            ))),
            Scan::Eof => Err(ModexError::Format(
                "expected start tag, found end of input".into(),
            )),
        }
    }

    /// Consumes a start tag, requiring the given token.
    pub fn open_expect(&mut self, token: Token) -> Result<()> {
        let name = self.open()?;
        if name != token.text() {
            return Err(ModexError::MissingField(format!(
                "{} ({}), found <{name}>",
                token.text(),
                token.field_name()
            )));
        }
        Ok(())
    }

    /// Consumes the raw text content up to the next markup.
    pub fn text(&mut self) -> Result<&'a str> {
        if self.pending_close.is_some() {
            return Ok("");
        }
        let bytes = self.src.as_bytes();
        let end = memchr(b'<', &bytes[self.pos..])
            .map(|rel| self.pos + rel)
            .ok_or_else(|| {
                ModexError::Format(format!("unterminated text at byte {}", self.pos))
            })?;
        let slice = &self.src[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Consumes an end tag, verifying it matches the given token.
    pub fn close(&mut self, token: Token) -> Result<()> {
        if let Some(pending) = self.pending_close.take() {
            if pending != token.text() {
                return Err(ModexError::Format(format!(
                    "mismatched tags: <{pending}/> closed as </{}>",
                    token.text()
                )));
            }
            return Ok(());
        }
        match self.scan()? {
            Scan::Close { name, end } => {
                if name != token.text() {
                    return Err(ModexError::Format(format!(
                        "mismatched tags: expected </{}>, found </{name}>",
                        token.text()
                    )));
                }
                self.pos = end;
                Ok(())
            }
            // A start tag here is either a child outside the schema or a
            // known field in the wrong position.
            Scan::Open { name, .. } if Token::parse(name).is_none() => {
                Err(ModexError::UnknownTag(format!("<{name}>")))
            }
            Scan::Open { name, .. } => Err(ModexError::Format(format!(
                "expected </{}>, found <{name}>",
                token.text()
            ))),
            Scan::Eof => Err(ModexError::Format(format!(
                "expected </{}>, found end of input",
                token.text()
            ))),
        }
    }

    /// True when all input has been consumed.
    pub fn at_end(&mut self) -> Result<bool> {
        if self.pending_close.is_some() {
            return Ok(false);
        }
        self.skip_insignificant()?;
        Ok(self.pos >= self.src.len())
    }

    /// If the next element is `token`, consumes the whole leaf and returns
    /// its unescaped text. Otherwise leaves the cursor untouched.
    pub fn leaf_if(&mut self, token: Token) -> Result<Option<String>> {
        match self.peek_open()? {
            Some(name) if name == token.text() => {
                self.open()?;
                let raw = self.text()?;
                self.close(token)?;
                Ok(Some(unescape(raw)?))
            }
            _ => Ok(None),
        }
    }

    /// Like [`Cursor::leaf_if`], but the element is required.
    pub fn leaf_required(&mut self, token: Token) -> Result<String> {
        self.leaf_if(token)?.ok_or_else(|| {
            ModexError::MissingField(format!("{} ({})", token.text(), token.field_name()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_nested_elements() {
        let mut cur = Cursor::new("<e><a>key</a><b>val</b></e>");
        assert_eq!(cur.open().expect("open"), "e");
        assert_eq!(
            cur.leaf_required(Token::AttrKey).expect("key"),
            "key"
        );
        assert_eq!(cur.leaf_required(Token::AttrVal).expect("val"), "val");
        assert_eq!(cur.peek_open().expect("peek"), None);
        cur.close(Token::ElementAttr).expect("close");
        assert!(cur.at_end().expect("end"));
    }

    #[test]
    fn skips_prologue_and_comments() {
        let mut cur = Cursor::new(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- header -->\n<g></g>",
        );
        cur.open_expect(Token::Model).expect("open");
        cur.close(Token::Model).expect("close");
    }

    #[test]
    fn tolerates_attributes_in_start_tags() {
        let mut cur = Cursor::new("<g xmlns=\"http://example\"><c>n</c></g>");
        assert_eq!(cur.open().expect("open"), "g");
        assert_eq!(cur.leaf_required(Token::ElementName).expect("name"), "n");
        cur.close(Token::Model).expect("close");
    }

    #[test]
    fn self_closing_reads_as_empty_element() {
        let mut cur = Cursor::new("<c/>");
        assert_eq!(cur.open().expect("open"), "c");
        assert_eq!(cur.text().expect("text"), "");
        cur.close(Token::ElementName).expect("close");
        assert!(cur.at_end().expect("end"));
    }

    #[test]
    fn leaf_if_leaves_cursor_on_absent_field() {
        let mut cur = Cursor::new("<d>z</d>");
        assert_eq!(cur.leaf_if(Token::ElementName).expect("peek"), None);
        assert_eq!(cur.leaf_required(Token::ElementId).expect("id"), "z");
    }

    #[test]
    fn missing_required_field_names_the_schema_token() {
        let mut cur = Cursor::new("<c>x</c>");
        let err = cur.leaf_required(Token::ElementId).expect_err("required");
        let msg = err.to_string();
        assert!(msg.contains("d (ELEMENT_ID)"), "unexpected message: {msg}");
    }

    #[test]
    fn mismatched_close_tags_are_rejected() {
        let mut cur = Cursor::new("<e></f>");
        cur.open().expect("open");
        assert!(cur.close(Token::ElementAttr).is_err());
    }

    #[test]
    fn unescapes_leaf_content() {
        let mut cur = Cursor::new("<c>a&lt;b&#010;c</c>");
        assert_eq!(
            cur.leaf_required(Token::ElementName).expect("name"),
            "a<b\nc"
        );
    }
}
