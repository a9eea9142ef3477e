/// Permissive parser for the JSON-ish documents MongoDB prints into its
/// logs.
///
/// The server does not emit strict JSON: keys are frequently unquoted,
/// strings may be single-quoted, regexes appear as bare `/pat/flags`
/// literals, and typed scalars show up either as constructors
/// (`ObjectId(...)`) or as extended-JSON wrapper objects (`{"$oid": ...}`).
///
/// `strict == true` restricts the grammar to ordinary JSON plus the wrapper
/// objects; everything else above is rejected.  `strict == false` admits
/// the full log syntax.  Anything that parses in strict mode parses in
/// relaxed mode with the same result.
///
/// The top level of a parse is always a document.  Errors are plain
/// messages; callers treat any failure as "this line does not match the
/// grammar I expected" and either fall back to another version parser or
/// count the line as an error.
use crate::dates;
use crate::rune::RuneReader;
use crate::value::{hex_decode_oid, Document, Value};

use anyhow::{bail, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Parse a complete string as one document.  Trailing whitespace is
/// allowed, trailing anything else is not.
pub fn parse_json(s: &str, strict: bool) -> Result<Document> {
    let mut r = RuneReader::new(s);
    let doc = parse_json_runes(&mut r, strict)?;
    r.chomp_ws();
    if !r.eol() {
        bail!("unexpected character after document at {}", r.pos());
    }
    Ok(doc)
}

/// Parse one document starting at the cursor, leaving the cursor just past
/// its closing brace.  This is the entry point the version parsers use to
/// read payloads embedded in a larger message.
pub fn parse_json_runes(r: &mut RuneReader, strict: bool) -> Result<Document> {
    r.chomp_ws();
    parse_object(r, strict)
}

fn parse_object(r: &mut RuneReader, strict: bool) -> Result<Document> {
    if !r.expect_rune('{') {
        match r.peek_rune() {
            Some(c) => bail!("unexpected character '{}' at {}", c, r.pos()),
            None => bail!("premature end of line"),
        }
    }
    let mut doc = Document::new();
    r.chomp_ws();
    if r.expect_rune('}') {
        return Ok(doc);
    }
    loop {
        r.chomp_ws();
        let key = parse_key(r, strict)?;
        r.chomp_ws();
        if !r.expect_rune(':') {
            bail!("expected ':' after key '{}' at {}", key, r.pos());
        }
        r.chomp_ws();
        let value = parse_value(r, strict)?;
        if strict && doc.contains_key(&key) {
            bail!("duplicate key '{}'", key);
        }
        doc.insert(key, value);
        r.chomp_ws();
        if r.expect_rune(',') {
            continue;
        }
        if r.expect_rune('}') {
            return Ok(doc);
        }
        if r.eol() {
            bail!("unterminated document");
        }
        bail!("unexpected character '{}' at {}", r.peek_rune().unwrap(), r.pos());
    }
}

fn parse_key(r: &mut RuneReader, strict: bool) -> Result<String> {
    match r.peek_rune() {
        Some('"') => parse_string(r, '"'),
        Some('\'') if !strict => parse_string(r, '\''),
        Some('\'') => bail!("single-quoted key forbidden in strict mode"),
        _ => {
            if strict {
                bail!("unquoted key forbidden in strict mode");
            }
            let mut key = String::new();
            while let Some(c) = r.peek_rune() {
                if c.is_alphanumeric() || c == '$' || c == '_' || c == '.' || c == '*' || c == '-' {
                    key.push(c);
                    r.skip(1);
                } else {
                    break;
                }
            }
            if key.is_empty() {
                bail!("empty key at {}", r.pos());
            }
            Ok(key)
        }
    }
}

fn parse_value(r: &mut RuneReader, strict: bool) -> Result<Value> {
    match r.peek_rune() {
        None => bail!("premature end of line"),
        Some('{') => Ok(promote(parse_object(r, strict)?)),
        Some('[') => parse_array(r, strict),
        Some('"') => Ok(Value::String(parse_string(r, '"')?)),
        Some('\'') => {
            if strict {
                bail!("single-quoted string forbidden in strict mode");
            }
            Ok(Value::String(parse_string(r, '\'')?))
        }
        Some('/') => {
            if strict {
                bail!("regex literal forbidden in strict mode");
            }
            parse_regex(r)
        }
        Some(c) if c == '-' || c.is_ascii_digit() => parse_number(r),
        Some(c) if c.is_alphabetic() || c == '$' => parse_keyword(r, strict),
        Some(c) => bail!("unexpected character '{}' at {}", c, r.pos()),
    }
}

fn parse_array(r: &mut RuneReader, strict: bool) -> Result<Value> {
    // '[' is known to be present.
    r.skip(1);
    let mut values = vec![];
    r.chomp_ws();
    if r.expect_rune(']') {
        return Ok(Value::Array(values));
    }
    loop {
        r.chomp_ws();
        values.push(parse_value(r, strict)?);
        r.chomp_ws();
        if r.expect_rune(',') {
            continue;
        }
        if r.expect_rune(']') {
            return Ok(Value::Array(values));
        }
        bail!("unterminated array");
    }
}

fn parse_string(r: &mut RuneReader, quote: char) -> Result<String> {
    // The opening quote is known to be present.
    r.skip(1);
    let mut out = String::new();
    loop {
        match r.next() {
            None => bail!("unterminated string"),
            Some(c) if c == quote => return Ok(out),
            Some('\\') => match r.next() {
                None => bail!("unterminated string"),
                Some('"') => out.push('"'),
                Some('\'') => out.push('\''),
                Some('\\') => out.push('\\'),
                Some('/') => out.push('/'),
                Some('b') => out.push('\u{0008}'),
                Some('f') => out.push('\u{000c}'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('u') => {
                    let hex = r.peek(4);
                    if hex.len() != 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                        bail!("bad escape '\\u{}'", hex);
                    }
                    r.skip(4);
                    match char::from_u32(u32::from_str_radix(&hex, 16).unwrap()) {
                        Some(c) => out.push(c),
                        None => bail!("bad escape '\\u{}'", hex),
                    }
                }
                Some(e) => bail!("bad escape '\\{}'", e),
            },
            Some(c) => out.push(c),
        }
    }
}

fn parse_regex(r: &mut RuneReader) -> Result<Value> {
    // The cursor sits on the opening '/'.
    let pattern = r
        .enclosed_string('/', true)
        .map_err(|_| anyhow::anyhow!("unterminated regex"))?;
    let mut flags = String::new();
    while let Some(c) = r.peek_rune() {
        if c.is_alphabetic() {
            flags.push(c);
            r.skip(1);
        } else {
            break;
        }
    }
    Ok(Value::Regex(pattern, flags))
}

/// Integer-looking tokens become Int32, promoting to Int64 on overflow;
/// a decimal point or exponent forces Double.
fn parse_number(r: &mut RuneReader) -> Result<Value> {
    let mut text = String::new();
    let mut float = false;
    if r.expect_rune('-') {
        text.push('-');
    }
    let digits_start = text.len();
    while let Some(c) = r.peek_rune() {
        if c.is_ascii_digit() {
            text.push(c);
            r.skip(1);
        } else {
            break;
        }
    }
    if text.len() == digits_start {
        bail!("bad number at {}", r.pos());
    }
    if r.peek_rune() == Some('.') {
        float = true;
        text.push('.');
        r.skip(1);
        let before = text.len();
        while let Some(c) = r.peek_rune() {
            if c.is_ascii_digit() {
                text.push(c);
                r.skip(1);
            } else {
                break;
            }
        }
        if text.len() == before {
            bail!("bad number '{}'", text);
        }
    }
    if matches!(r.peek_rune(), Some('e') | Some('E')) {
        float = true;
        text.push('e');
        r.skip(1);
        if let Some(c) = r.peek_rune() {
            if c == '+' || c == '-' {
                text.push(c);
                r.skip(1);
            }
        }
        let before = text.len();
        while let Some(c) = r.peek_rune() {
            if c.is_ascii_digit() {
                text.push(c);
                r.skip(1);
            } else {
                break;
            }
        }
        if text.len() == before {
            bail!("bad number '{}'", text);
        }
    }
    // The token must end at a structural boundary; "-1-" is an error, not a
    // number followed by junk.
    match r.peek_rune() {
        None => {}
        Some(c) if c.is_whitespace() || c == ',' || c == '}' || c == ']' => {}
        Some(c) => bail!("bad number '{}{}'", text, c),
    }
    if float {
        match text.parse::<f64>() {
            Ok(n) => Ok(Value::Double(n)),
            Err(_) => bail!("bad number '{}'", text),
        }
    } else if let Ok(n) = text.parse::<i32>() {
        Ok(Value::Int32(n))
    } else if let Ok(n) = text.parse::<i64>() {
        Ok(Value::Int64(n))
    } else {
        bail!("bad number '{}'", text)
    }
}

fn parse_keyword(r: &mut RuneReader, strict: bool) -> Result<Value> {
    let start = r.pos();
    let mut word = String::new();
    while let Some(c) = r.peek_rune() {
        if c.is_alphanumeric() || c == '$' || c == '_' {
            word.push(c);
            r.skip(1);
        } else {
            break;
        }
    }
    match word.as_str() {
        "true" => return Ok(Value::Boolean(true)),
        "false" => return Ok(Value::Boolean(false)),
        "null" => return Ok(Value::Null),
        _ => {}
    }
    if !strict && word.to_ascii_lowercase() == "objectid" {
        return parse_objectid_constructor(r);
    }
    bail!("unexpected value '{}' at {}", word, start)
}

/// `ObjectId(...)` with an optionally quoted hex payload.  24 hex digits
/// parse as the real id; the 26-digit form the server sometimes emits is
/// accepted and fabricates the zero id; everything else is rejected.
fn parse_objectid_constructor(r: &mut RuneReader) -> Result<Value> {
    if !r.expect_rune('(') {
        bail!("malformed objectid constructor at {}", r.pos());
    }
    let quote = match r.peek_rune() {
        Some(q @ '\'') | Some(q @ '"') => {
            r.skip(1);
            Some(q)
        }
        _ => None,
    };
    let mut hex = String::new();
    while let Some(c) = r.peek_rune() {
        if c.is_ascii_hexdigit() {
            hex.push(c);
            r.skip(1);
        } else {
            break;
        }
    }
    if let Some(q) = quote {
        if !r.expect_rune(q) {
            bail!("malformed objectid constructor");
        }
    }
    if !r.expect_rune(')') {
        bail!("malformed objectid constructor");
    }
    match hex.len() {
        24 => Ok(Value::ObjectId(hex_decode_oid(&hex).unwrap())),
        26 => Ok(Value::ObjectId([0u8; 12])),
        n => bail!("objectid constructor with {} hex digits", n),
    }
}

/// Replace a freshly parsed object by the typed scalar it spells, when it
/// matches one of the extended-JSON wrapper shapes exactly.  A wrapper with
/// a malformed payload, or any other object with `$`-prefixed keys, is left
/// alone (the latter is an ordinary query-operator document).
fn promote(doc: Document) -> Value {
    match doc.len() {
        1 => {
            let (key, value) = doc.iter().next().unwrap();
            match (key.as_str(), value) {
                ("$oid", Value::String(s)) => {
                    if let Some(oid) = hex_decode_oid(s) {
                        return Value::ObjectId(oid);
                    }
                }
                ("$date", Value::String(s)) => {
                    if let Some(d) = dates::parse_iso8601(s) {
                        return Value::Date(d);
                    }
                }
                ("$date", Value::Int32(n)) => {
                    if let Some(d) = dates::from_millis(*n as i64) {
                        return Value::Date(d);
                    }
                }
                ("$date", Value::Int64(n)) => {
                    if let Some(d) = dates::from_millis(*n) {
                        return Value::Date(d);
                    }
                }
                ("$timestamp", Value::Object(inner)) => {
                    if inner.len() == 2 {
                        if let (Some(t), Some(i)) =
                            (as_int(inner.get("t")), as_int(inner.get("i")))
                        {
                            return Value::Timestamp(t as u32, i as u32);
                        }
                    }
                }
                ("$numberLong", Value::String(s)) => {
                    if let Ok(n) = s.parse::<i64>() {
                        return Value::Int64(n);
                    }
                }
                ("$numberLong", Value::Int32(n)) => return Value::Int64(*n as i64),
                ("$numberLong", Value::Int64(n)) => return Value::Int64(*n),
                ("$numberDecimal", Value::String(s)) => {
                    if let Ok(n) = s.parse::<f64>() {
                        return Value::Double(n);
                    }
                }
                ("$numberDecimal", Value::Int32(n)) => return Value::Double(*n as f64),
                ("$numberDecimal", Value::Int64(n)) => return Value::Double(*n as f64),
                ("$numberDecimal", Value::Double(n)) => return Value::Double(*n),
                ("$undefined", Value::Boolean(true)) => return Value::Undefined,
                ("$minKey", Value::Int32(1)) => return Value::MinKey,
                ("$maxKey", Value::Int32(1)) => return Value::MaxKey,
                ("$regex", Value::String(s)) => {
                    return Value::Regex(s.clone(), String::new());
                }
                _ => {}
            }
        }
        2 => {
            if let (Some(Value::String(pat)), Some(Value::String(opts))) =
                (doc.get("$regex"), doc.get("$options"))
            {
                return Value::Regex(pat.clone(), opts.clone());
            }
            if let (Some(Value::String(data)), Some(Value::String(subtype))) =
                (doc.get("$binary"), doc.get("$type"))
            {
                if let (Ok(bytes), Ok(st)) = (BASE64.decode(data), u8::from_str_radix(subtype, 16))
                {
                    return Value::Binary(st, bytes);
                }
            }
            if let (Some(Value::String(collection)), Some(id)) = (doc.get("$ref"), doc.get("$id"))
            {
                return Value::Ref(collection.clone(), Box::new(id.clone()));
            }
        }
        _ => {}
    }
    Value::Object(doc)
}

fn as_int(v: Option<&Value>) -> Option<i64> {
    match v {
        Some(Value::Int32(n)) => Some(*n as i64),
        Some(Value::Int64(n)) => Some(*n),
        _ => None,
    }
}

#[cfg(test)]
fn doc(pairs: &[(&str, Value)]) -> Document {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[cfg(test)]
fn s(x: &str) -> Value {
    Value::String(x.to_string())
}

// These inputs must parse identically in both modes.

#[test]
fn test_parse_json_both_modes() {
    let cases: Vec<(&str, Document)> = vec![
        ("{}", doc(&[])),
        (r#"{"key":"value"}"#, doc(&[("key", s("value"))])),
        (r#"{"$key":"value"}"#, doc(&[("$key", s("value"))])),
        (r#"{    "key"   :    "value"    }"#, doc(&[("key", s("value"))])),
        (
            r#"{"key1":"value","key2":"value"}"#,
            doc(&[("key1", s("value")), ("key2", s("value"))]),
        ),
        (
            r#"{"key1" : "value" , "key2" : "value" }"#,
            doc(&[("key1", s("value")), ("key2", s("value"))]),
        ),
        (r#"{"key":true}"#, doc(&[("key", Value::Boolean(true))])),
        (r#"{"key":false}"#, doc(&[("key", Value::Boolean(false))])),
        (r#"{"key":"true"}"#, doc(&[("key", s("true"))])),
        (r#"{"key":null}"#, doc(&[("key", Value::Null)])),
        (r#"{"number" : 1}"#, doc(&[("number", Value::Int32(1))])),
        (r#"{"float" : 1.5}"#, doc(&[("float", Value::Double(1.5))])),
        (
            r#"{"object":{"key":"value"}}"#,
            doc(&[("object", Value::Object(doc(&[("key", s("value"))])))]),
        ),
        (r#"{"key":[]}"#, doc(&[("key", Value::Array(vec![]))])),
        (r#"{"key": ["value"]}"#, doc(&[("key", Value::Array(vec![s("value")]))])),
        (
            r#"{"key":[ "value1" , "value2" ]}"#,
            doc(&[("key", Value::Array(vec![s("value1"), s("value2")]))]),
        ),
    ];
    for (source, want) in cases {
        let relaxed = parse_json(source, false).expect(source);
        assert!(relaxed == want, "relaxed {}: got {:?}", source, relaxed);
        let strict = parse_json(source, true).expect(source);
        assert!(strict == want, "strict {}: got {:?}", source, strict);
    }
}

// These only parse in relaxed mode.

#[test]
fn test_parse_json_relaxed_only() {
    let cases: Vec<(&str, Document)> = vec![
        (
            r#"{key:{$op:"value"}}"#,
            doc(&[("key", Value::Object(doc(&[("$op", s("value"))])))]),
        ),
        (r#"{key:"value"}"#, doc(&[("key", s("value"))])),
        (r#"{ $key: "value" }"#, doc(&[("$key", s("value"))])),
        (r#"{    key:"value"}"#, doc(&[("key", s("value"))])),
        (r#"{"key":''}"#, doc(&[("key", s(""))])),
        (
            r#"{"key": /regex/ }"#,
            doc(&[("key", Value::Regex("regex".to_string(), "".to_string()))]),
        ),
        (
            r#"{"key": /regex/i }"#,
            doc(&[("key", Value::Regex("regex".to_string(), "i".to_string()))]),
        ),
        (
            r#"{"key": objectid(00000000000000000000000000)}"#,
            doc(&[("key", Value::ObjectId([0u8; 12]))]),
        ),
        (
            r#"{"key": ObjectId('507f1f77bcf86cd799439011')}"#,
            doc(&[(
                "key",
                Value::ObjectId(hex_decode_oid("507f1f77bcf86cd799439011").unwrap()),
            )]),
        ),
    ];
    for (source, want) in cases {
        let relaxed = parse_json(source, false).expect(source);
        assert!(relaxed == want, "relaxed {}: got {:?}", source, relaxed);
        assert!(parse_json(source, true).is_err(), "strict should fail: {}", source);
    }
}

// These must fail in both modes.

#[test]
fn test_parse_json_failures() {
    let cases = vec![
        "[",
        "[]",
        "{:true}",
        r#"{"a":}"#,
        r#"{"a":1,"#,
        r#"{"a":1 b:1}"#,
        r#"{"a":1, "b:1}"#,
        r#"{"a" 1}"#,
        "{$",
        r#"{"a":1,,}"#,
        r#"{"a":{"#,
        r#"{"a":/a"#,
        r#"{"key": unknown}"#,
        r#"{"key": -1-}"#,
        r#"{"key": --1}"#,
        r#"{"key": objectid(00)}"#,
        r#"{"key": [1, 2}"#,
        r#"{"key": "bad \q escape"}"#,
    ];
    for source in cases {
        assert!(parse_json(source, false).is_err(), "relaxed should fail: {}", source);
        assert!(parse_json(source, true).is_err(), "strict should fail: {}", source);
    }
}

#[test]
fn test_duplicate_keys() {
    // Last one wins in relaxed mode, error in strict mode.
    let got = parse_json(r#"{"a":1,"a":2}"#, false).unwrap();
    assert!(got == doc(&[("a", Value::Int32(2))]));
    assert!(parse_json(r#"{"a":1,"a":2}"#, true).is_err());
}

#[test]
fn test_parse_number() {
    let cases: Vec<(&str, Value)> = vec![
        ("1", Value::Int32(1)),
        ("-1", Value::Int32(-1)),
        ("-0", Value::Int32(0)),
        ("0.1", Value::Double(0.1)),
        ("-0.1", Value::Double(-0.1)),
        ("10e2", Value::Double(1000.0)),
        ("-10e2", Value::Double(-1000.0)),
        ("1.5e2", Value::Double(150.0)),
        ("-1.5e2", Value::Double(-150.0)),
        ("-2147483648", Value::Int32(-2147483648)),
        ("2147483647", Value::Int32(2147483647)),
        ("2147483648", Value::Int64(2147483648)),
        ("-2147483649", Value::Int64(-2147483649)),
        ("1 ", Value::Int32(1)),
    ];
    for (source, want) in cases {
        let got = parse_number(&mut RuneReader::new(source)).expect(source);
        assert!(got == want, "{}: got {:?}", source, got);
    }
    assert!(parse_number(&mut RuneReader::new("-")).is_err());
    assert!(parse_number(&mut RuneReader::new("1.")).is_err());
    assert!(parse_number(&mut RuneReader::new("1e")).is_err());
}

#[test]
fn test_extended_types() {
    let cases: Vec<(&str, Value)> = vec![
        (
            r#"{"v": {"$oid": "507f1f77bcf86cd799439011"}}"#,
            Value::ObjectId(hex_decode_oid("507f1f77bcf86cd799439011").unwrap()),
        ),
        (
            r#"{"v": {"$timestamp": {"t": 1500000000, "i": 3}}}"#,
            Value::Timestamp(1500000000, 3),
        ),
        (r#"{"v": {"$numberLong": "12345678901"}}"#, Value::Int64(12345678901)),
        (r#"{"v": {"$numberLong": 7}}"#, Value::Int64(7)),
        (r#"{"v": {"$numberDecimal": "1.5"}}"#, Value::Double(1.5)),
        (r#"{"v": {"$undefined": true}}"#, Value::Undefined),
        (r#"{"v": {"$minKey": 1}}"#, Value::MinKey),
        (r#"{"v": {"$maxKey": 1}}"#, Value::MaxKey),
        (
            r#"{"v": {"$regex": "abc", "$options": "i"}}"#,
            Value::Regex("abc".to_string(), "i".to_string()),
        ),
        (
            r#"{"v": {"$binary": "3q2+7w==", "$type": "00"}}"#,
            Value::Binary(0, vec![0xde, 0xad, 0xbe, 0xef]),
        ),
        (
            r#"{"v": {"$ref": "users", "$id": 5}}"#,
            Value::Ref("users".to_string(), Box::new(Value::Int32(5))),
        ),
    ];
    for (source, want) in cases {
        let got = parse_json(source, false).expect(source);
        assert!(
            got.get("v") == Some(&want),
            "{}: got {:?}",
            source,
            got.get("v")
        );
    }

    // Wrappers with the wrong payload stay plain objects, and operator
    // documents are never promoted.
    let got = parse_json(r#"{"v": {"$oid": "xyz"}}"#, false).unwrap();
    assert!(matches!(got.get("v"), Some(Value::Object(_))));
    let got = parse_json(r#"{"v": {"$gt": 5}}"#, false).unwrap();
    assert!(matches!(got.get("v"), Some(Value::Object(_))));
}

#[test]
fn test_date_wrapper() {
    let got = parse_json(r#"{"v": {"$date": "2018-06-25T18:09:33.522Z"}}"#, false).unwrap();
    match got.get("v") {
        Some(Value::Date(d)) => assert!(d.timestamp_millis() == 1529950173522),
        other => panic!("unexpected {:?}", other),
    }
    let got = parse_json(r#"{"v": {"$date": 1529950173522}}"#, false).unwrap();
    match got.get("v") {
        Some(Value::Date(d)) => assert!(d.timestamp_millis() == 1529950173522),
        other => panic!("unexpected {:?}", other),
    }
}

// Rendering a document without extended wrappers and parsing it back gives
// the same document.

#[test]
fn test_render_round_trip() {
    let sources = vec![
        "{}",
        r#"{"a": 1, "b": -2.5, "c": "x", "d": [1, 2, 3], "e": {"f": null, "g": true}}"#,
        r#"{"a": /re/im, "b": ["x", "y"]}"#,
        r#"{"deep": {"er": {"est": [{"a": 1}]}}}"#,
    ];
    for source in sources {
        let first = parse_json(source, false).expect(source);
        let second = parse_json(&first.to_string(), false).expect(source);
        assert!(first == second, "{} -> {}", source, first);
    }
}
