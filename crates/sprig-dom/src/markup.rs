//! Markup loading
//!
//! A small, forgiving HTML-ish tokenizer and tree builder for fixtures and
//! host bootstrapping. Handles start/end/self-closing tags, quoted and bare
//! attributes, comments, void elements and `<template>` content. Unmatched
//! end tags are ignored and open elements close at end of input.

use crate::{DomError, DomResult, DomTree, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    StartTag {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Text(String),
    Comment(String),
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: &str) -> DomError {
        DomError::Markup {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.input[start..self.pos]
    }

    fn next_token(&mut self) -> DomResult<Option<Token>> {
        if self.pos >= self.input.len() {
            return Ok(None);
        }
        let rest = self.rest();
        if let Some(body) = rest.strip_prefix("<!--") {
            let end = body.find("-->").ok_or_else(|| self.error("unterminated comment"))?;
            let text = body[..end].to_string();
            self.pos += 4 + end + 3;
            return Ok(Some(Token::Comment(text)));
        }
        if rest.starts_with("</") {
            self.pos += 2;
            let name = self.take_while(|c| !c.is_whitespace() && c != '>');
            let name = name.to_ascii_lowercase();
            self.skip_whitespace();
            if self.bump() != Some('>') {
                return Err(self.error("unterminated end tag"));
            }
            return Ok(Some(Token::EndTag { name }));
        }
        if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            self.pos += 1;
            return self.start_tag().map(Some);
        }

        // Character data up to the next tag
        let first = rest.chars().next().map_or(1, char::len_utf8);
        let len = rest[first..].find('<').map_or(rest.len(), |i| i + first);
        let text = decode_entities(&rest[..len]);
        self.pos += len;
        Ok(Some(Token::Text(text)))
    }

    fn start_tag(&mut self) -> DomResult<Token> {
        let name = self
            .take_while(|c| !c.is_whitespace() && c != '>' && c != '/')
            .to_ascii_lowercase();
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error("unterminated start tag")),
                Some('>') => {
                    self.bump();
                    return Ok(Token::StartTag { name, attributes, self_closing: false });
                }
                Some('/') => {
                    self.bump();
                    if self.bump() != Some('>') {
                        return Err(self.error("expected '>' after '/'"));
                    }
                    return Ok(Token::StartTag { name, attributes, self_closing: true });
                }
                Some(_) => attributes.push(self.attribute()?),
            }
        }
    }

    fn attribute(&mut self) -> DomResult<(String, String)> {
        let name = self
            .take_while(|c| !c.is_whitespace() && !matches!(c, '=' | '>' | '/'))
            .to_string();
        if name.is_empty() {
            return Err(self.error("expected attribute name"));
        }
        self.skip_whitespace();
        if self.peek() != Some('=') {
            return Ok((name, String::new()));
        }
        self.bump();
        self.skip_whitespace();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let raw = self.take_while(|c| c != q);
                if self.bump() != Some(q) {
                    return Err(self.error("unterminated attribute value"));
                }
                raw
            }
            _ => self.take_while(|c| !c.is_whitespace() && c != '>'),
        };
        Ok((name, decode_entities(value)))
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Check if element is a void element (no closing tag)
fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "param" | "source" | "track" | "wbr"
    )
}

impl DomTree {
    /// Parse `markup` and append the resulting nodes to `parent`.
    ///
    /// The subtree is built detached and attached top-level node by
    /// top-level node, so observers see one insertion per top-level node.
    /// Whitespace-only text runs are dropped. Returns the top-level nodes.
    pub fn load_markup(&mut self, parent: NodeId, markup: &str) -> DomResult<Vec<NodeId>> {
        let staging = self.create_fragment();
        // (open element, container its children go into)
        let mut open: Vec<(NodeId, NodeId)> = Vec::new();
        let mut tokenizer = Tokenizer::new(markup);

        while let Some(token) = tokenizer.next_token()? {
            let container = open.last().map_or(staging, |(_, c)| *c);
            match token {
                Token::StartTag { name, attributes, self_closing } => {
                    let el = self.create_element(&name);
                    for (attr, value) in &attributes {
                        self.set_attribute(el, attr, value)?;
                    }
                    self.append_child(container, el)?;
                    if !self_closing && !is_void_element(&name) {
                        let inner = self.template_content(el).unwrap_or(el);
                        open.push((el, inner));
                    }
                }
                Token::EndTag { name } => {
                    if let Some(pos) = open
                        .iter()
                        .rposition(|(el, _)| self.tag_name(*el) == Some(name.as_str()))
                    {
                        open.truncate(pos);
                    }
                }
                Token::Text(text) => {
                    if !text.trim().is_empty() {
                        let node = self.create_text(&text);
                        self.append_child(container, node)?;
                    }
                }
                Token::Comment(text) => {
                    let node = self.create_comment(&text);
                    self.append_child(container, node)?;
                }
            }
        }

        let top = self.children(staging);
        for node in &top {
            self.append_child(parent, *node)?;
        }
        tracing::debug!(nodes = top.len(), %parent, "markup loaded");
        Ok(top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenizer_attributes() {
        let mut t = Tokenizer::new(r#"<input type="checkbox" r-model=done @click.prevent='go()' disabled>"#);
        let token = t.next_token().unwrap().unwrap();
        assert_eq!(
            token,
            Token::StartTag {
                name: "input".into(),
                attributes: vec![
                    ("type".into(), "checkbox".into()),
                    ("r-model".into(), "done".into()),
                    ("@click.prevent".into(), "go()".into()),
                    ("disabled".into(), String::new()),
                ],
                self_closing: false,
            }
        );
    }

    #[test]
    fn test_load_nested_with_template() {
        let mut tree = DomTree::new();
        let top = tree
            .load_markup(
                NodeId::ROOT,
                r#"<ul id="list">
                     <template r-for="item in items"><li>&lt;x&gt;</li></template>
                     <!-- marker -->
                     <br>
                   </ul>"#,
            )
            .unwrap();

        assert_eq!(top.len(), 1);
        let ul = top[0];
        let kids = tree.children(ul);
        assert_eq!(kids.len(), 3);

        let template = kids[0];
        assert!(tree.element_children(template).is_empty());
        let content = tree.template_content(template).unwrap();
        let li = tree.element_children(content)[0];
        assert_eq!(tree.text_content(li), "<x>");
        assert_eq!(tree.tag_name(kids[2]), Some("br"));
    }

    #[test]
    fn test_unterminated_tag_is_error() {
        let mut tree = DomTree::new();
        let err = tree.load_markup(NodeId::ROOT, "<div class=\"x").unwrap_err();
        assert!(matches!(err, DomError::Markup { .. }));
    }

    #[test]
    fn test_stray_end_tag_ignored() {
        let mut tree = DomTree::new();
        let top = tree.load_markup(NodeId::ROOT, "<p>a</span>b</p>").unwrap();
        assert_eq!(tree.text_content(top[0]), "ab");
    }
}
