//! Incremental streaming XML tokenizer.
//!
//! Feed arbitrary byte fragments (their boundaries need not align with
//! token boundaries) and pull start/end element events out as they
//! complete. Text content, comments, processing instructions, DOCTYPE
//! and CDATA sections are consumed and discarded; this is a coverage
//! report walker, not a general XML library.
//!
//! Memory is bounded by the largest single tag plus whatever the caller
//! retains: the tokenizer never buffers more than the current incomplete
//! token.

use crate::error::{Result, StreamError};

/// A parsed start tag with its attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl StartTag {
    /// Look up an attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Element events emitted by the tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// Opening tag (also emitted for self-closing tags, followed by End)
    Start(StartTag),
    /// Closing tag
    End(String),
}

/// Pull-style tokenizer over an internally buffered byte stream
#[derive(Debug, Default)]
pub struct XmlTokenizer {
    buf: Vec<u8>,
    pos: usize,
    /// End event queued by a self-closing tag
    pending_end: Option<String>,
}

impl XmlTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment to the internal buffer
    pub fn feed(&mut self, fragment: &[u8]) {
        // Drop the consumed prefix before growing the buffer
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        self.buf.extend_from_slice(fragment);
    }

    /// Pull the next complete element event, or `None` if the buffered
    /// bytes end mid-token and more input is needed.
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if let Some(name) = self.pending_end.take() {
            return Ok(Some(XmlEvent::End(name)));
        }

        loop {
            // Text between tags is discarded outright
            match self.buf[self.pos..].iter().position(|&b| b == b'<') {
                Some(off) => self.pos += off,
                None => {
                    self.pos = self.buf.len();
                    return Ok(None);
                }
            }

            let rest = &self.buf[self.pos..];
            if rest.len() < 2 {
                return Ok(None);
            }

            match rest[1] {
                b'!' => {
                    if let Some(consumed) = skip_declaration(rest)? {
                        self.pos += consumed;
                    } else {
                        return Ok(None);
                    }
                }
                b'?' => match find_terminated(rest, b"?>") {
                    Some(end) => self.pos += end,
                    None => return Ok(None),
                },
                b'/' => {
                    let Some(close) = find_tag_close(rest) else {
                        return Ok(None);
                    };
                    let name = std::str::from_utf8(&rest[2..close])
                        .map_err(|_| StreamError::malformed("end tag is not UTF-8"))?
                        .trim()
                        .to_string();
                    if !is_valid_name(&name) {
                        return Err(StreamError::malformed(format!(
                            "invalid end tag name {name:?}"
                        )));
                    }
                    self.pos += close + 1;
                    return Ok(Some(XmlEvent::End(name)));
                }
                _ => {
                    let Some(close) = find_tag_close(rest) else {
                        return Ok(None);
                    };
                    let mut body = &rest[1..close];
                    let self_closing = body.ends_with(b"/");
                    if self_closing {
                        body = &body[..body.len() - 1];
                    }
                    let tag = parse_start_tag(body)?;
                    self.pos += close + 1;
                    if self_closing {
                        self.pending_end = Some(tag.name.clone());
                    }
                    return Ok(Some(XmlEvent::Start(tag)));
                }
            }
        }
    }
}

/// Skip `<!--...-->`, `<![CDATA[...]]>` or `<!DOCTYPE...>`; returns the
/// consumed length, or `None` if the construct is still incomplete.
fn skip_declaration(rest: &[u8]) -> Result<Option<usize>> {
    if rest.len() < 4 {
        return Ok(None);
    }
    if rest.starts_with(b"<!--") {
        return Ok(find_terminated(rest, b"-->"));
    }
    if rest.starts_with(b"<![") {
        if rest.len() < 9 {
            return Ok(None);
        }
        if !rest.starts_with(b"<![CDATA[") {
            return Err(StreamError::malformed("unsupported <![ section"));
        }
        return Ok(find_terminated(rest, b"]]>"));
    }
    // DOCTYPE and friends: quote-aware scan to the closing '>'
    Ok(find_tag_close(rest).map(|close| close + 1))
}

/// Find `terminator` and return the index just past it
fn find_terminated(rest: &[u8], terminator: &[u8]) -> Option<usize> {
    rest.windows(terminator.len())
        .position(|w| w == terminator)
        .map(|p| p + terminator.len())
}

/// Find the index of the `>` closing the tag that starts at `rest[0]`,
/// ignoring `>` inside quoted attribute values.
fn find_tag_close(rest: &[u8]) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in rest.iter().enumerate() {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Some(i),
                _ => {}
            },
        }
    }
    None
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
}

/// Parse `name attr="value" ...` (the inside of a start tag)
fn parse_start_tag(body: &[u8]) -> Result<StartTag> {
    let body = std::str::from_utf8(body)
        .map_err(|_| StreamError::malformed("start tag is not UTF-8"))?;
    let name_end = body
        .find(|c: char| c.is_whitespace())
        .unwrap_or(body.len());
    let name = &body[..name_end];
    if !is_valid_name(name) {
        return Err(StreamError::malformed(format!(
            "invalid start tag name {name:?}"
        )));
    }
    let mut attrs = Vec::new();
    let mut rest = body[name_end..].trim_start();
    while !rest.is_empty() {
        let eq = rest.find('=').ok_or_else(|| {
            StreamError::malformed(format!("attribute without value in <{name}>"))
        })?;
        let attr_name = rest[..eq].trim_end();
        if !is_valid_name(attr_name) {
            return Err(StreamError::malformed(format!(
                "invalid attribute name {attr_name:?} in <{name}>"
            )));
        }
        let after_eq = rest[eq + 1..].trim_start();
        let mut value_chars = after_eq.chars();
        let quote = match value_chars.next() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                return Err(StreamError::malformed(format!(
                    "unquoted attribute value in <{name}>"
                )))
            }
        };
        let value_body = value_chars.as_str();
        let close = value_body.find(quote).ok_or_else(|| {
            StreamError::malformed(format!("unterminated attribute value in <{name}>"))
        })?;
        attrs.push((
            attr_name.to_string(),
            decode_entities(&value_body[..close])?,
        ));
        rest = value_body[close + quote.len_utf8()..].trim_start();
    }
    Ok(StartTag {
        name: name.to_string(),
        attrs,
    })
}

/// Decode the predefined and numeric character references
fn decode_entities(value: &str) -> Result<String> {
    if !value.contains('&') {
        return Ok(value.to_string());
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let entity_rest = &rest[amp + 1..];
        let semi = entity_rest
            .find(';')
            .ok_or_else(|| StreamError::malformed("unterminated entity reference"))?;
        let entity = &entity_rest[..semi];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(|dec| dec.parse::<u32>()));
                match code.map(|r| r.ok().and_then(char::from_u32)) {
                    Some(Some(c)) => out.push(c),
                    _ => {
                        return Err(StreamError::malformed(format!(
                            "unknown entity reference &{entity};"
                        )))
                    }
                }
            }
        }
        rest = &entity_rest[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
