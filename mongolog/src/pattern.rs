/// Query-shape canonicalization.
///
/// A pattern is a filter document with every literal leaf replaced by the
/// `Any` sentinel, so that `{a: 5}` and `{a: "x"}` collapse to the same
/// shape while structural operators survive.  The rules:
///
/// - `$and`/`$or`/`$nor` keep their arrays, canonicalizing each element;
/// - a value whose keys all start with `$` is a constraint envelope:
///   `$elemMatch` recurses, the geo operators keep their inner keys (array
///   arguments become an array of sentinels of the same outer length,
///   object arguments keep keys with sentinel leaves), everything else
///   (`$in`, `$gt`, `$exists`, ...) collapses to a single sentinel;
/// - an array of subdocuments canonicalizes elementwise, any other array
///   or scalar or plain subdocument collapses to the sentinel.
///
/// Array order is significant everywhere, so two logically equivalent
/// disjunctions written in different orders produce different patterns.
/// That matches the reference tool output and is kept deliberately.
use crate::value::{Document, Value};

const CONNECTIVES: [&str; 3] = ["$and", "$or", "$nor"];
const GEO_OPERATORS: [&str; 4] = ["$geoWithin", "$geoIntersects", "$near", "$nearSphere"];

#[derive(Clone, Debug, Default)]
pub struct Pattern {
    pattern: Document,
    valid: bool,
}

impl Pattern {
    /// Canonicalize a filter document.  The result is always valid, even
    /// for an empty filter; only a default-constructed Pattern is empty.
    pub fn new(query: &Document) -> Pattern {
        Pattern {
            pattern: canonicalize_document(query),
            valid: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.valid
    }

    pub fn pattern(&self) -> Option<&Document> {
        if self.valid {
            Some(&self.pattern)
        } else {
            None
        }
    }

    /// Structural equality: same key set at every level, same variant at
    /// every leaf, arrays compared in order.  Hand-rolled rather than
    /// derived because object equality must ignore key order, and because
    /// this runs once per aggregated line.
    pub fn equals(&self, other: &Pattern) -> bool {
        self.valid && other.valid && document_equals(&self.pattern, &other.pattern)
    }

    /// Key-sorted, whitespace-free text form, used as the aggregation map
    /// key.  The sentinel renders as `V`.
    pub fn string_compact(&self) -> String {
        let mut out = String::new();
        if self.valid {
            write_document(&self.pattern, &mut out);
        }
        out
    }
}

fn canonicalize_document(doc: &Document) -> Document {
    let mut out = Document::new();
    for (key, value) in doc.iter() {
        let canonical = if CONNECTIVES.contains(&key.as_str()) {
            match value {
                Value::Array(elements) => {
                    Value::Array(elements.iter().map(canonicalize_element).collect())
                }
                _ => Value::Any,
            }
        } else {
            canonicalize_field(value)
        };
        out.insert(key.clone(), canonical);
    }
    out
}

// Elements under a boolean connective: documents and arrays keep their
// structure, anything else is a plain value.
fn canonicalize_element(value: &Value) -> Value {
    match value {
        Value::Object(doc) => Value::Object(canonicalize_document(doc)),
        Value::Array(elements) => {
            Value::Array(elements.iter().map(canonicalize_element).collect())
        }
        _ => Value::Any,
    }
}

fn canonicalize_field(value: &Value) -> Value {
    match value {
        Value::Object(doc) if !doc.is_empty() && doc.keys().all(|k| k.starts_with('$')) => {
            Value::Object(canonicalize_envelope(doc))
        }
        Value::Array(elements)
            if !elements.is_empty()
                && elements.iter().all(|e| matches!(e, Value::Object(_))) =>
        {
            Value::Array(
                elements
                    .iter()
                    .map(|e| match e {
                        Value::Object(doc) => Value::Object(canonicalize_document(doc)),
                        _ => unreachable!(),
                    })
                    .collect(),
            )
        }
        _ => Value::Any,
    }
}

// A constraint envelope such as {"$gt": 5} or {"$in": [...]}.  Operators
// keep their place; operands collapse except where the operator's argument
// structure is part of the shape.
fn canonicalize_envelope(doc: &Document) -> Document {
    let mut out = Document::new();
    for (op, operand) in doc.iter() {
        let canonical = if op == "$elemMatch" {
            match operand {
                Value::Object(inner) => Value::Object(canonicalize_document(inner)),
                _ => Value::Any,
            }
        } else if GEO_OPERATORS.contains(&op.as_str()) {
            canonicalize_geo(operand)
        } else {
            Value::Any
        };
        out.insert(op.clone(), canonical);
    }
    out
}

// Geo operands keep one level of structure: {"$center": [[5,5], 5]} becomes
// {"$center": [V, V]} (outer length preserved), while an object argument
// like $geometry keeps its keys with every leaf collapsed.
fn canonicalize_geo(operand: &Value) -> Value {
    match operand {
        Value::Object(inner) => {
            let mut out = Document::new();
            for (key, value) in inner.iter() {
                let canonical = match value {
                    Value::Array(elements) => {
                        Value::Array(elements.iter().map(|_| Value::Any).collect())
                    }
                    Value::Object(obj) => {
                        let mut flat = Document::new();
                        for (k, _) in obj.iter() {
                            flat.insert(k.clone(), Value::Any);
                        }
                        Value::Object(flat)
                    }
                    _ => Value::Any,
                };
                out.insert(key.clone(), canonical);
            }
            Value::Object(out)
        }
        _ => Value::Any,
    }
}

fn document_equals(a: &Document, b: &Document) -> bool {
    if a.len() != b.len() {
        return false;
    }
    for (key, va) in a.iter() {
        match b.get(key) {
            Some(vb) if value_equals(va, vb) => {}
            _ => return false,
        }
    }
    true
}

fn value_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(da), Value::Object(db)) => document_equals(da, db),
        (Value::Array(xa), Value::Array(xb)) => {
            xa.len() == xb.len() && xa.iter().zip(xb.iter()).all(|(x, y)| value_equals(x, y))
        }
        _ => a == b,
    }
}

fn write_document(doc: &Document, out: &mut String) {
    let mut keys: Vec<&str> = doc.keys().collect();
    keys.sort_unstable();
    out.push('{');
    for (ix, key) in keys.iter().enumerate() {
        if ix > 0 {
            out.push(',');
        }
        out.push_str(key);
        out.push(':');
        write_value(doc.get(key).unwrap(), out);
    }
    out.push('}');
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Any => out.push('V'),
        Value::Object(doc) => write_document(doc, out),
        Value::Array(elements) => {
            out.push('[');
            for (ix, e) in elements.iter().enumerate() {
                if ix > 0 {
                    out.push(',');
                }
                write_value(e, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(pairs: &[(&str, Value)]) -> Document {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn obj(pairs: &[(&str, Value)]) -> Value {
        Value::Object(d(pairs))
    }

    #[test]
    fn test_new_pattern() {
        let cases: Vec<(Document, Document)> = vec![
            (d(&[("a", Value::Int32(5))]), d(&[("a", Value::Any)])),
            (
                d(&[("a", Value::Int32(5)), ("b", Value::String("y".to_string()))]),
                d(&[("a", Value::Any), ("b", Value::Any)]),
            ),
            (
                d(&[("a", obj(&[("$in", Value::String("y".to_string()))]))]),
                d(&[("a", obj(&[("$in", Value::Any)]))]),
            ),
            (
                d(&[("a", obj(&[("$gt", Value::Int32(5))]))]),
                d(&[("a", obj(&[("$gt", Value::Any)]))]),
            ),
            (
                d(&[("a", obj(&[("$exists", Value::Boolean(true))]))]),
                d(&[("a", obj(&[("$exists", Value::Any)]))]),
            ),
            (
                d(&[(
                    "$or",
                    Value::Array(vec![obj(&[("a", Value::Int32(5))]), obj(&[("b", Value::Int32(5))])]),
                )]),
                d(&[(
                    "$or",
                    Value::Array(vec![obj(&[("a", Value::Any)]), obj(&[("b", Value::Any)])]),
                )]),
            ),
            (
                d(&[(
                    "$and",
                    Value::Array(vec![
                        obj(&[(
                            "$or",
                            Value::Array(vec![
                                obj(&[("a", Value::Int32(5))]),
                                obj(&[("b", Value::Int32(5))]),
                            ]),
                        )]),
                        Value::Array(vec![obj(&[(
                            "$or",
                            Value::Array(vec![
                                obj(&[("c", Value::Int32(5))]),
                                obj(&[("d", Value::Int32(5))]),
                            ]),
                        )])]),
                    ]),
                )]),
                d(&[(
                    "$and",
                    Value::Array(vec![
                        obj(&[(
                            "$or",
                            Value::Array(vec![obj(&[("a", Value::Any)]), obj(&[("b", Value::Any)])]),
                        )]),
                        Value::Array(vec![obj(&[(
                            "$or",
                            Value::Array(vec![obj(&[("c", Value::Any)]), obj(&[("d", Value::Any)])]),
                        )])]),
                    ]),
                )]),
            ),
            (
                d(&[("_id", Value::ObjectId([0u8; 12]))]),
                d(&[("_id", Value::Any)]),
            ),
            (
                d(&[(
                    "a",
                    obj(&[(
                        "$in",
                        Value::Array(vec![Value::Int32(5), Value::Int32(5), Value::Int32(5)]),
                    )]),
                )]),
                d(&[("a", obj(&[("$in", Value::Any)]))]),
            ),
            (
                d(&[(
                    "a",
                    obj(&[(
                        "$elemMatch",
                        obj(&[("b", Value::Int32(5)), ("c", obj(&[("$gte", Value::Int32(5))]))]),
                    )]),
                )]),
                d(&[(
                    "a",
                    obj(&[(
                        "$elemMatch",
                        obj(&[("b", Value::Any), ("c", obj(&[("$gte", Value::Any)]))]),
                    )]),
                )]),
            ),
            (
                d(&[(
                    "a",
                    obj(&[(
                        "$geoWithin",
                        obj(&[(
                            "$center",
                            Value::Array(vec![
                                Value::Array(vec![Value::Int32(5), Value::Int32(5)]),
                                Value::Int32(5),
                            ]),
                        )]),
                    )]),
                )]),
                d(&[(
                    "a",
                    obj(&[(
                        "$geoWithin",
                        obj(&[("$center", Value::Array(vec![Value::Any, Value::Any]))]),
                    )]),
                )]),
            ),
            (
                d(&[(
                    "a",
                    obj(&[(
                        "$geoWithin",
                        obj(&[(
                            "$geometry",
                            obj(&[
                                ("a", Value::String("y".to_string())),
                                ("b", Value::Array(vec![Value::Int32(5), Value::Int32(5)])),
                            ]),
                        )]),
                    )]),
                )]),
                d(&[(
                    "a",
                    obj(&[(
                        "$geoWithin",
                        obj(&[("$geometry", obj(&[("a", Value::Any), ("b", Value::Any)]))]),
                    )]),
                )]),
            ),
        ];
        for (ix, (source, want)) in cases.iter().enumerate() {
            let p = Pattern::new(source);
            assert!(
                document_equals(p.pattern().unwrap(), want),
                "case {}: got {:?}",
                ix,
                p.pattern()
            );
        }
    }

    #[test]
    fn test_pattern_equals() {
        let same: Vec<Document> = vec![
            d(&[]),
            d(&[("a", Value::Any)]),
            d(&[("a", Value::Any), ("b", Value::Any)]),
            d(&[("a", obj(&[("b", Value::Any)]))]),
            d(&[("a", Value::Array(vec![]))]),
            d(&[("a", Value::Array(vec![Value::Any, Value::Any]))]),
            d(&[("a", obj(&[]))]),
            d(&[("a", Value::Array(vec![obj(&[("a", Value::Any)])]))]),
        ];
        let different: Vec<Document> = vec![
            d(&[("a", Value::Any)]),
            d(&[("b", Value::Any)]),
            d(&[("b", Value::Any), ("a", Value::Any), ("c", Value::Any)]),
            d(&[("a", obj(&[("c", Value::Any)]))]),
            d(&[("a", Value::Array(vec![Value::Any]))]),
            d(&[("a", Value::Array(vec![Value::Any]))]),
            d(&[("a", Value::Array(vec![]))]),
            d(&[("a", Value::Array(vec![obj(&[("b", Value::Any)])]))]),
        ];
        for (ix, doc) in same.iter().enumerate() {
            let p = Pattern { pattern: doc.clone(), valid: true };
            let q = Pattern { pattern: doc.clone(), valid: true };
            assert!(p.equals(&q), "self-equality failed at {}", ix);
        }
        for (ix, (a, b)) in same.iter().zip(different.iter()).enumerate() {
            let p = Pattern { pattern: a.clone(), valid: true };
            let q = Pattern { pattern: b.clone(), valid: true };
            assert!(!p.equals(&q), "unexpected equality at {}", ix);
            assert!(!q.equals(&p), "unexpected equality (swapped) at {}", ix);
        }
    }

    #[test]
    fn test_key_order_is_insignificant() {
        let p = Pattern {
            pattern: d(&[("a", Value::Any), ("b", Value::Any)]),
            valid: true,
        };
        let q = Pattern {
            pattern: d(&[("b", Value::Any), ("a", Value::Any)]),
            valid: true,
        };
        assert!(p.equals(&q));
        assert!(p.string_compact() == q.string_compact());
    }

    #[test]
    fn test_pattern_empty() {
        let uninitialized = Pattern::default();
        assert!(uninitialized.is_empty());
        assert!(uninitialized.pattern().is_none());
        assert!(!uninitialized.equals(&uninitialized));

        let from_empty = Pattern::new(&Document::new());
        assert!(!from_empty.is_empty());
        assert!(from_empty.equals(&from_empty));
        assert!(from_empty.string_compact() == "{}");
    }

    #[test]
    fn test_string_compact() {
        let p = Pattern::new(&d(&[(
            "a",
            obj(&[("$in", Value::Array(vec![Value::Int32(5), Value::Int32(5)]))]),
        )]));
        assert!(p.string_compact() == "{a:{$in:V}}", "got {}", p.string_compact());

        // Keys are sorted at every level regardless of insertion order.
        let p = Pattern::new(&d(&[
            ("z", Value::Int32(1)),
            ("a", obj(&[("c", Value::Int32(1)), ("b", Value::Int32(1))])),
        ]));
        assert!(p.string_compact() == "{a:V,z:V}", "got {}", p.string_compact());
    }

    #[test]
    fn test_new_pattern_is_reflexive() {
        let source = d(&[
            ("a", obj(&[("$in", Value::Array(vec![Value::Int32(1)]))])),
            ("b", Value::Int32(2)),
        ]);
        let p = Pattern::new(&source);
        let q = Pattern::new(&source);
        assert!(p.equals(&q));
        assert!(p.string_compact() == q.string_compact());
    }
}
