//! Hit evaluation over a streamed coverage document.
//!
//! Cobertura-style reports record one `class` element per source file,
//! with `lines/line` children carrying `number` and `hits` attributes.
//! The evaluator walks start/end events from the tokenizer and answers
//! one question: did any `class` matching the target file contain the
//! target line with a non-zero hit count?
//!
//! Subtrees are discarded as soon as their closing event is processed.
//! The only exception is the currently open `class` element, whose
//! children must stay addressable until the class closes and its lines
//! can be checked. Peak retained memory is therefore the open ancestor
//! chain plus at most one class subtree, independent of document size.

use crate::error::{Result, StreamError};
use crate::xml::{StartTag, XmlEvent, XmlTokenizer};

/// The file and line the scan is looking for.
///
/// The line is kept as text: reports encode line numbers as strings and
/// the comparison is textual, so `"007"` and `"7"` are different lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub path: String,
    pub line: String,
}

impl Target {
    pub fn new(path: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: line.into(),
        }
    }
}

/// An element retained while its `class` ancestor is still open
#[derive(Debug)]
struct Node {
    tag: StartTag,
    children: Vec<Node>,
}

impl Node {
    fn descendant_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(Node::descendant_count)
            .sum::<usize>()
    }
}

/// Incremental evaluator for one report stream
#[derive(Debug)]
pub struct CoverageEvaluator {
    target: Target,
    tokenizer: XmlTokenizer,
    stack: Vec<Node>,
    /// While a `class` element is open, closed descendants are attached
    /// to their parent instead of being dropped
    retain: bool,
    hit: bool,
}

impl CoverageEvaluator {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            tokenizer: XmlTokenizer::new(),
            stack: Vec::new(),
            retain: false,
            hit: false,
        }
    }

    /// Feed one fragment of the XML body and process every event it
    /// completes. Fragments may split tokens arbitrarily.
    pub fn feed(&mut self, fragment: &[u8]) -> Result<()> {
        self.tokenizer.feed(fragment);
        while let Some(event) = self.tokenizer.next_event()? {
            self.apply(event)?;
        }
        Ok(())
    }

    /// Whether a matching hit has been seen so far
    pub fn has_hit(&self) -> bool {
        self.hit
    }

    /// Finalize the stream and yield the verdict. Unclosed elements are
    /// tolerated: a truncated body still yields whatever accumulated.
    pub fn into_verdict(self) -> bool {
        if !self.stack.is_empty() {
            log::debug!(
                "coverage document closed with {} unclosed element(s)",
                self.stack.len()
            );
        }
        self.hit
    }

    /// Number of element nodes currently held in memory; stays bounded
    /// by the open ancestor chain plus one class subtree
    pub fn retained_nodes(&self) -> usize {
        self.stack.iter().map(Node::descendant_count).sum()
    }

    fn apply(&mut self, event: XmlEvent) -> Result<()> {
        match event {
            XmlEvent::Start(tag) => {
                if tag.name == "class" {
                    self.retain = true;
                }
                self.stack.push(Node {
                    tag,
                    children: Vec::new(),
                });
            }
            XmlEvent::End(name) => {
                let node = self.stack.pop().ok_or_else(|| {
                    StreamError::malformed(format!("unmatched end tag </{name}>"))
                })?;
                if node.tag.name != name {
                    return Err(StreamError::malformed(format!(
                        "mismatched end tag: expected </{}>, got </{name}>",
                        node.tag.name
                    )));
                }
                if name == "class" {
                    if !self.hit {
                        self.check_class(&node);
                    }
                    self.retain = false;
                    // node and its subtree drop here regardless of match
                } else if self.retain {
                    if let Some(parent) = self.stack.last_mut() {
                        parent.children.push(node);
                    }
                }
                // retain == false: node drops immediately
            }
        }
        Ok(())
    }

    /// Scan a closed `class` element's `lines/line` children for the
    /// target line, latching the verdict on the first non-zero hit.
    fn check_class(&mut self, class: &Node) {
        if class.tag.attr("filename") != Some(self.target.path.as_str()) {
            return;
        }
        for lines in class.children.iter().filter(|c| c.tag.name == "lines") {
            for line in lines.children.iter().filter(|c| c.tag.name == "line") {
                if line.tag.attr("number") == Some(self.target.line.as_str())
                    && line.tag.attr("hits") != Some("0")
                {
                    log::debug!(
                        "hit for {}:{} (hits={:?})",
                        self.target.path,
                        self.target.line,
                        line.tag.attr("hits")
                    );
                    self.hit = true;
                    return;
                }
            }
        }
    }
}
