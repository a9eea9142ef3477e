/// The value model for documents found in log bodies.
///
/// This is deliberately not a conforming BSON implementation.  It covers the
/// types the server actually prints into its logs, plus the `Any` sentinel
/// that the pattern canonicalizer substitutes for literal leaves.
///
/// Rendering via Display produces text the relaxed parser reads back:
/// ordinary JSON for the plain types, extended-JSON wrappers for the typed
/// scalars, and `/pat/flags` for regexes.  Numeric width is not preserved
/// across a round trip (an Int64 that fits in 32 bits re-parses as Int32).
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    /// Subtype byte plus payload.
    Binary(u8, Vec<u8>),
    /// Pattern and flags, both verbatim.
    Regex(String, String),
    ObjectId([u8; 12]),
    /// Seconds and increment.
    Timestamp(u32, u32),
    Date(DateTime<Utc>),
    MinKey,
    MaxKey,
    Undefined,
    /// DBRef: collection name and id.
    Ref(String, Box<Value>),
    Object(Document),
    Array(Vec<Value>),
    /// The "any value" sentinel.  Only patterns contain this.
    Any,
}

/// An insertion-ordered document with unique keys.  Inserting an existing
/// key replaces the value in place, which gives relaxed-mode parsing its
/// last-wins duplicate behavior without disturbing key order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Document {
        Document { fields: vec![] }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    pub fn insert(&mut self, key: String, value: Value) {
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key, value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// The first key in insertion order.  Pre-2.6 command bodies name the
    /// command only by the leading key of the payload.
    pub fn first_key(&self) -> Option<&str> {
        self.fields.first().map(|(k, _)| k.as_str())
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Document {
        let mut d = Document::new();
        for (k, v) in iter {
            d.insert(k, v);
        }
        d
    }
}

pub fn hex_decode_oid(s: &str) -> Option<[u8; 12]> {
    if s.len() != 24 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let mut out = [0u8; 12];
    let bytes = s.as_bytes();
    for i in 0..12 {
        let hi = (bytes[2 * i] as char).to_digit(16).unwrap() as u8;
        let lo = (bytes[2 * i + 1] as char).to_digit(16).unwrap() as u8;
        out[i] = (hi << 4) | lo;
    }
    Some(out)
}

pub fn hex_encode_oid(oid: &[u8; 12]) -> String {
    let mut s = String::with_capacity(24);
    for b in oid {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

fn escape_string(s: &str, out: &mut fmt::Formatter) -> fmt::Result {
    out.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(out, "\\u{:04x}", c as u32)?,
            c => write!(out, "{}", c)?,
        }
    }
    out.write_str("\"")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            // {:?} always keeps a decimal point or exponent, so the text
            // re-parses as a double rather than an integer.
            Value::Double(n) => write!(f, "{:?}", n),
            Value::String(s) => escape_string(s, f),
            Value::Binary(subtype, data) => write!(
                f,
                "{{\"$binary\": \"{}\", \"$type\": \"{:02x}\"}}",
                BASE64.encode(data),
                subtype
            ),
            Value::Regex(pat, flags) => write!(f, "/{}/{}", pat, flags),
            Value::ObjectId(oid) => write!(f, "{{\"$oid\": \"{}\"}}", hex_encode_oid(oid)),
            Value::Timestamp(t, i) => {
                write!(f, "{{\"$timestamp\": {{\"t\": {}, \"i\": {}}}}}", t, i)
            }
            Value::Date(d) => write!(
                f,
                "{{\"$date\": \"{}\"}}",
                d.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            Value::MinKey => write!(f, "{{\"$minKey\": 1}}"),
            Value::MaxKey => write!(f, "{{\"$maxKey\": 1}}"),
            Value::Undefined => write!(f, "{{\"$undefined\": true}}"),
            Value::Ref(collection, id) => {
                write!(f, "{{\"$ref\": ")?;
                escape_string(collection, f)?;
                write!(f, ", \"$id\": {}}}", id)
            }
            Value::Object(doc) => write!(f, "{}", doc),
            Value::Array(values) => {
                write!(f, "[")?;
                for (ix, v) in values.iter().enumerate() {
                    if ix > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Any => write!(f, "V"),
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (ix, (k, v)) in self.fields.iter().enumerate() {
            if ix > 0 {
                write!(f, ", ")?;
            }
            escape_string(k, f)?;
            write!(f, ": {}", v)?;
        }
        write!(f, "}}")
    }
}

#[test]
fn test_document_insert_order_and_replacement() {
    let mut d = Document::new();
    d.insert("b".to_string(), Value::Int32(1));
    d.insert("a".to_string(), Value::Int32(2));
    d.insert("b".to_string(), Value::Int32(3));
    assert!(d.len() == 2);
    assert!(d.keys().collect::<Vec<&str>>() == vec!["b", "a"]);
    assert!(*d.get("b").unwrap() == Value::Int32(3));
    assert!(d.first_key() == Some("b"));
}

#[test]
fn test_oid_hex() {
    let oid = hex_decode_oid("507f1f77bcf86cd799439011").unwrap();
    assert!(hex_encode_oid(&oid) == "507f1f77bcf86cd799439011");
    assert!(hex_decode_oid("507f1f77").is_none());
    assert!(hex_decode_oid("zzzf1f77bcf86cd799439011").is_none());
}

#[test]
fn test_render() {
    let mut d = Document::new();
    d.insert("s".to_string(), Value::String("a\"b".to_string()));
    d.insert("n".to_string(), Value::Int32(5));
    d.insert("f".to_string(), Value::Double(1000.0));
    d.insert("r".to_string(), Value::Regex("abc".to_string(), "i".to_string()));
    assert!(
        d.to_string() == r#"{"s": "a\"b", "n": 5, "f": 1000.0, "r": /abc/i}"#,
        "got {}",
        d
    );
}
