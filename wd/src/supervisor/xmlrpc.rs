//! XML-RPC codec
//!
//! Encodes `<methodCall>` documents and decodes `<methodResponse>` documents
//! into a loosely typed [`Value`] tree. Typed records are built on top of this
//! in [`super::types`].

use std::collections::BTreeMap;
use std::fmt::Write as _;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::trace;

use super::error::RpcError;

/// A decoded XML-RPC value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    Double(f64),
    Nil,
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Look up a member of a struct value
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.get(key),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// Encode a method call document
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall>");
    let _ = write!(out, "<methodName>{}</methodName><params>", escape(method));
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>\n");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::String(s) => {
            let _ = write!(out, "<string>{}</string>", escape(s.as_str()));
        }
        Value::Int(i) => {
            let _ = write!(out, "<int>{}</int>", i);
        }
        Value::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
        }
        Value::Double(d) => {
            let _ = write!(out, "<double>{}</double>", d);
        }
        Value::Nil => out.push_str("<nil/>"),
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                let _ = write!(out, "<member><name>{}</name>", escape(name.as_str()));
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

/// Decode a method response document
///
/// Returns the single response parameter, or [`RpcError::Fault`] when the
/// server answered with a fault struct.
pub fn decode_response(body: &[u8]) -> Result<Value, RpcError> {
    let tokens = tokenize(body)?;
    trace!(count = tokens.len(), "decode_response: tokenized");
    let mut parser = Parser { tokens, pos: 0 };

    parser.open("methodResponse")?;
    let result = if parser.is_open("params") {
        parser.open("params")?;
        parser.open("param")?;
        let value = parser.value()?;
        parser.close("param")?;
        parser.close("params")?;
        Ok(value)
    } else if parser.is_open("fault") {
        parser.open("fault")?;
        let fault = parser.value()?;
        parser.close("fault")?;
        let code = fault.get("faultCode").and_then(Value::as_i64).unwrap_or_default();
        let message = fault
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Err(RpcError::Fault { code, message })
    } else {
        return Err(RpcError::malformed(format!(
            "expected params or fault, found {:?}",
            parser.peek()
        )));
    };
    parser.close("methodResponse")?;
    result
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open(String),
    Close(String),
    Text(String),
}

/// Flatten the document into open/close/text tokens
///
/// Self-closing tags become an open/close pair and adjacent text runs are merged.
/// Whitespace-only text is layout and is dropped unless it is the whole content
/// of a text element, so `<string>  </string>` keeps its spaces.
fn tokenize(body: &[u8]) -> Result<Vec<Token>, RpcError> {
    let text = std::str::from_utf8(body).map_err(RpcError::xml)?;
    let mut reader = Reader::from_str(text);

    let mut tokens = Vec::new();
    let mut pending = String::new();
    loop {
        match reader.read_event().map_err(RpcError::xml)? {
            Event::Start(e) => {
                flush_text(&mut tokens, &mut pending, None);
                tokens.push(Token::Open(tag_name(e.name().as_ref())));
            }
            Event::End(e) => {
                let name = tag_name(e.name().as_ref());
                flush_text(&mut tokens, &mut pending, Some(&name));
                tokens.push(Token::Close(name));
            }
            Event::Empty(e) => {
                flush_text(&mut tokens, &mut pending, None);
                let name = tag_name(e.name().as_ref());
                tokens.push(Token::Open(name.clone()));
                tokens.push(Token::Close(name));
            }
            Event::Text(e) => pending.push_str(&e.unescape().map_err(RpcError::xml)?),
            Event::CData(e) => pending.push_str(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(tokens)
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Elements whose content is character data rather than child elements
const TEXT_ELEMENTS: &[&str] = &["value", "string", "name", "base64"];

/// Emit buffered text before a tag; `closing` names the element being closed
fn flush_text(tokens: &mut Vec<Token>, pending: &mut String, closing: Option<&str>) {
    if pending.is_empty() {
        return;
    }
    let text = std::mem::take(pending);
    let leaf = matches!(
        (tokens.last(), closing),
        (Some(Token::Open(open)), Some(close)) if open == close && TEXT_ELEMENTS.contains(&close)
    );
    if leaf || !text.trim().is_empty() {
        tokens.push(Token::Text(text));
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn open(&mut self, name: &str) -> Result<(), RpcError> {
        match self.next() {
            Some(Token::Open(tag)) if tag == name => Ok(()),
            other => Err(RpcError::malformed(format!("expected <{}>, found {:?}", name, other))),
        }
    }

    fn close(&mut self, name: &str) -> Result<(), RpcError> {
        match self.next() {
            Some(Token::Close(tag)) if tag == name => Ok(()),
            other => Err(RpcError::malformed(format!("expected </{}>, found {:?}", name, other))),
        }
    }

    /// Consume an optional text token
    fn text(&mut self) -> String {
        if let Some(Token::Text(text)) = self.peek() {
            let text = text.clone();
            self.pos += 1;
            text
        } else {
            String::new()
        }
    }

    fn is_open(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Open(tag)) if tag == name)
    }

    fn value(&mut self) -> Result<Value, RpcError> {
        self.open("value")?;
        let value = match self.next() {
            // <value/> or <value></value>
            Some(Token::Close(tag)) if tag == "value" => return Ok(Value::String(String::new())),
            // Untyped values are strings
            Some(Token::Text(text)) => Value::String(text),
            Some(Token::Open(tag)) => self.typed(&tag)?,
            other => return Err(RpcError::malformed(format!("unexpected token in <value>: {:?}", other))),
        };
        self.close("value")?;
        Ok(value)
    }

    fn typed(&mut self, tag: &str) -> Result<Value, RpcError> {
        let value = match tag {
            "string" | "base64" | "dateTime.iso8601" => Value::String(self.text()),
            "int" | "i4" | "i8" => {
                let text = self.text();
                let int = text
                    .trim()
                    .parse()
                    .map_err(|_| RpcError::malformed(format!("invalid integer: {:?}", text)))?;
                Value::Int(int)
            }
            "boolean" => match self.text().trim() {
                "1" => Value::Bool(true),
                "0" => Value::Bool(false),
                other => return Err(RpcError::malformed(format!("invalid boolean: {:?}", other))),
            },
            "double" => {
                let text = self.text();
                let double = text
                    .trim()
                    .parse()
                    .map_err(|_| RpcError::malformed(format!("invalid double: {:?}", text)))?;
                Value::Double(double)
            }
            "nil" => Value::Nil,
            "struct" => {
                let mut members = BTreeMap::new();
                while self.is_open("member") {
                    self.open("member")?;
                    self.open("name")?;
                    let name = self.text();
                    self.close("name")?;
                    let member = self.value()?;
                    self.close("member")?;
                    members.insert(name, member);
                }
                Value::Struct(members)
            }
            "array" => {
                let mut items = Vec::new();
                self.open("data")?;
                while self.is_open("value") {
                    items.push(self.value()?);
                }
                self.close("data")?;
                Value::Array(items)
            }
            other => return Err(RpcError::malformed(format!("unknown value type <{}>", other))),
        };
        self.close(tag)?;
        Ok(value)
    }
}
