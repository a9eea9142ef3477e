/// Locating the filter document inside a decoded message.
///
/// Where the filter lives depends on how the line was written.  Command
/// payloads carry it under a key named by the command (`find` uses
/// `filter`, the older read commands use `query`, write commands nest it
/// in their update/delete arrays), operations in the old grammar carry the
/// filter as the payload itself or under `q`, and `getMore` only points at
/// it through the originating command.
use crate::record::Message;
use crate::value::{Document, Value};

/// The filter document for a CRUD-bearing message.  None when the message
/// is not CRUD or genuinely has no filter (e.g. an insert).
pub fn filter_document(message: &Message) -> Option<&Document> {
    match message {
        Message::Command(m) => {
            command_filter(&m.command, &m.payload, m.originating_command.as_ref())
        }
        Message::CommandLegacy(m) => command_filter(&m.command, &m.payload, None),
        Message::Operation(m) => operation_filter(&m.operation, &m.payload),
        Message::OperationLegacy(m) => operation_filter(&m.operation, &m.payload),
        _ => None,
    }
}

fn command_filter<'a>(
    command: &str,
    payload: &'a Document,
    originating: Option<&'a Document>,
) -> Option<&'a Document> {
    match command.to_ascii_lowercase().as_str() {
        "find" => as_document(payload.get("filter")),
        "count" | "distinct" | "findandmodify" | "geonear" => as_document(payload.get("query")),
        "getmore" => {
            // The filter belongs to the cursor's originating command.
            let orig = originating?;
            as_document(orig.get("filter")).or_else(|| as_document(orig.get("query")))
        }
        "update" => first_array_filter(payload.get("updates")),
        "delete" => first_array_filter(payload.get("deletes")),
        _ => as_document(payload.get("filter"))
            .or_else(|| as_document(payload.get("query")))
            .or_else(|| as_document(payload.get("q"))),
    }
}

fn operation_filter<'a>(operation: &str, payload: &'a Document) -> Option<&'a Document> {
    match operation.to_ascii_lowercase().as_str() {
        "query" | "getmore" => {
            let mut doc = as_document(payload.get("query")).unwrap_or(payload);
            // 2.x sometimes wraps the filter a second time, as
            // { query: {...}, orderby: {...} }.
            if let Some(inner) = as_document(doc.get("query")) {
                doc = inner;
            }
            Some(doc)
        }
        "update" | "remove" | "delete" => as_document(payload.get("q"))
            .or_else(|| as_document(payload.get("query")))
            .or_else(|| as_document(payload.get("filter"))),
        "command" => as_document(payload.get("filter"))
            .or_else(|| as_document(payload.get("query"))),
        _ => None,
    }
}

fn as_document(v: Option<&Value>) -> Option<&Document> {
    match v {
        Some(Value::Object(doc)) => Some(doc),
        _ => None,
    }
}

fn first_array_filter(v: Option<&Value>) -> Option<&Document> {
    match v {
        Some(Value::Array(elements)) => match elements.first() {
            Some(Value::Object(doc)) => as_document(doc.get("q")),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::parse_json;
    use crate::record::{MsgCommand, MsgOperationLegacy};

    #[test]
    fn test_find_filter() {
        let payload = parse_json(r#"{ find: "foo", filter: { a: 1.0 } }"#, false).unwrap();
        let msg = Message::Command(MsgCommand {
            namespace: "test.foo".to_string(),
            command: "find".to_string(),
            payload,
            ..MsgCommand::default()
        });
        let filter = filter_document(&msg).unwrap();
        assert!(filter.contains_key("a"));
    }

    #[test]
    fn test_update_command_filter() {
        let payload = parse_json(
            r#"{ update: "foo", updates: [ { q: { a: 1.0 }, u: { "$set": { b: 2.0 } } } ] }"#,
            false,
        )
        .unwrap();
        let msg = Message::Command(MsgCommand {
            command: "update".to_string(),
            payload,
            ..MsgCommand::default()
        });
        let filter = filter_document(&msg).unwrap();
        assert!(filter.contains_key("a") && !filter.contains_key("u"));
    }

    #[test]
    fn test_getmore_uses_originating_command() {
        let payload = parse_json(r#"{ getMore: 123, collection: "foo" }"#, false).unwrap();
        let orig = parse_json(r#"{ find: "foo", filter: { x: 5 } }"#, false).unwrap();
        let msg = Message::Command(MsgCommand {
            command: "getMore".to_string(),
            payload: payload.clone(),
            originating_command: Some(orig),
            ..MsgCommand::default()
        });
        assert!(filter_document(&msg).unwrap().contains_key("x"));

        let without = Message::Command(MsgCommand {
            command: "getMore".to_string(),
            payload,
            ..MsgCommand::default()
        });
        assert!(filter_document(&without).is_none());
    }

    #[test]
    fn test_legacy_query_payload_is_the_filter() {
        let payload = parse_json(r#"{ a: 1.0 }"#, false).unwrap();
        let msg = Message::OperationLegacy(MsgOperationLegacy {
            operation: "query".to_string(),
            payload,
            ..MsgOperationLegacy::default()
        });
        assert!(filter_document(&msg).unwrap().contains_key("a"));

        // The doubly wrapped 2.x form unwraps once.
        let payload = parse_json(r#"{ query: { b: 1.0 }, orderby: { b: 1.0 } }"#, false).unwrap();
        let msg = Message::OperationLegacy(MsgOperationLegacy {
            operation: "query".to_string(),
            payload,
            ..MsgOperationLegacy::default()
        });
        let filter = filter_document(&msg).unwrap();
        assert!(filter.contains_key("b") && !filter.contains_key("orderby"));
    }
}
