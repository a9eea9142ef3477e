/// The `query` command: reduce every CRUD line to its query shape and
/// aggregate latency statistics per (namespace, operation, shape).
use crate::format;
use crate::source::LineSource;
use crate::summary::Summary;
use crate::QueryCmdArgs;

use anyhow::{bail, Result};
use mongolog::{filter_document, BaseParser, Context, Document, Message, Pattern};
use std::collections::HashMap;
use std::io;
use ustr::Ustr;

// Samples kept per shape for the percentile; past this the percentile
// degrades on the extreme tail but memory stays bounded.
const N95_MAX_SAMPLES: usize = 16 * 1024 * 1024;

// Operations that carry a query shape worth aggregating.
const OPERATIONS: &[&str] = &[
    "count",
    "find",
    "findandmodify",
    "geonear",
    "getmore",
    "remove",
    "update",
];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SortKey {
    Namespace,
    Operation,
    Pattern,
    Count,
    Min,
    Max,
    N95,
    Sum,
}

/// `--sort` fields, comma separated.  The user's fields take priority and
/// the default chain breaks the remaining ties.
pub fn parse_sort_spec(spec: &Option<String>) -> Result<Vec<SortKey>> {
    let mut order = vec![];
    if let Some(ref spec) = spec {
        for opt in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            order.push(match opt {
                "namespace" => SortKey::Namespace,
                "operation" => SortKey::Operation,
                "pattern" => SortKey::Pattern,
                "count" => SortKey::Count,
                "min" => SortKey::Min,
                "max" => SortKey::Max,
                "95%" => SortKey::N95,
                "sum" => SortKey::Sum,
                _ => bail!("unexpected sort option '{}'", opt),
            });
        }
    }
    order.extend_from_slice(&[
        SortKey::Sum,
        SortKey::Namespace,
        SortKey::Operation,
        SortKey::Pattern,
    ]);
    Ok(order)
}

/// Aggregation state for one shape.
pub struct QueryPattern {
    pub namespace: Ustr,
    pub operation: Ustr,
    pub pattern: String,
    pub count: u64,
    pub min: i64,
    pub max: i64,
    pub sum: i64,
    pub n95: f64,
    samples: Vec<i64>,
    // Threads getmore lines back to their originating cursor; written but
    // not consumed yet.
    #[allow(dead_code)]
    cursor_id: i64,
}

pub struct QueryAggregator {
    patterns: HashMap<String, QueryPattern>,
}

impl QueryAggregator {
    pub fn new() -> QueryAggregator {
        QueryAggregator { patterns: HashMap::new() }
    }

    /// Fold one decoded message into the table.  Non-CRUD messages and
    /// operations outside the whitelist are ignored.
    pub fn observe(&mut self, message: &Message) {
        let (namespace, operation, duration) = match message.crud_summary() {
            Some(x) => x,
            None => return,
        };
        let operation = operation.to_ascii_lowercase();
        if OPERATIONS.binary_search(&operation.as_str()).is_err() {
            return;
        }

        let empty = Document::new();
        let filter = filter_document(message).unwrap_or(&empty);
        let pattern = Pattern::new(filter).string_compact();

        let key = format!("{}:{}:{}", namespace, operation, pattern);
        let entry = self.patterns.entry(key).or_insert_with(|| QueryPattern {
            namespace: Ustr::from(namespace),
            operation: Ustr::from(&operation),
            pattern,
            count: 0,
            min: i64::MAX,
            max: 0,
            sum: 0,
            n95: f64::NAN,
            samples: vec![],
            cursor_id: 0,
        });
        entry.count += 1;
        entry.sum += duration;
        entry.max = i64::max(entry.max, duration);
        entry.min = i64::min(entry.min, duration);
        if entry.samples.len() < N95_MAX_SAMPLES {
            entry.samples.push(duration);
        }
        if let Some(counters) = message.counters() {
            if let Some(cursor_id) = counters.get("cursorid") {
                entry.cursor_id = *cursor_id;
            }
        }
    }

    /// Compute percentiles and hand back the rows, unsorted.
    pub fn finish(self) -> Vec<QueryPattern> {
        let mut rows: Vec<QueryPattern> = self.patterns.into_values().collect();
        for row in rows.iter_mut() {
            row.samples.sort_unstable();
            row.n95 = percentile95(&row.samples);
        }
        rows
    }
}

// The 95th percentile over sorted samples: an exact sample when the index
// lands on a whole number, the average of the two straddling samples
// otherwise, NaN when there are not enough samples to say anything.
fn percentile95(samples: &[i64]) -> f64 {
    if samples.len() < 2 {
        return f64::NAN;
    }
    let index = 0.95 * samples.len() as f64;
    if index == index.trunc() && index >= 1.0 {
        samples[index as usize] as f64
    } else if index > 1.0 {
        (samples[index as usize - 1] + samples[index as usize]) as f64 / 2.0
    } else {
        f64::NAN
    }
}

/// Order rows by the comparator chain: the first field on which two rows
/// differ decides.  Names sort ascending, numbers descending.
pub fn sort_patterns(rows: &mut [QueryPattern], order: &[SortKey]) {
    use std::cmp::Ordering;
    rows.sort_by(|a, b| {
        for key in order {
            let ord = match key {
                SortKey::Namespace => a.namespace.as_str().cmp(b.namespace.as_str()),
                SortKey::Operation => a.operation.as_str().cmp(b.operation.as_str()),
                SortKey::Pattern => a.pattern.cmp(&b.pattern),
                SortKey::Count => b.count.cmp(&a.count),
                SortKey::Min => b.min.cmp(&a.min),
                SortKey::Max => b.max.cmp(&a.max),
                SortKey::N95 => b.n95.total_cmp(&a.n95),
                SortKey::Sum => b.sum.cmp(&a.sum),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

pub fn run(args: &QueryCmdArgs) -> Result<()> {
    let order = parse_sort_spec(&args.sort)?;

    let (formatters, defaults) = my_formatters();
    let spec = args.fmt.as_deref().unwrap_or(defaults);
    let (fields, others) = format::parse_fields(spec, &formatters)?;
    let opts = format::standard_options(&others);

    let mut tables: Vec<u8> = vec![];
    for (index, file_name) in args.files.iter().enumerate() {
        let (summary, mut rows) = process_file(file_name, args.verbose)?;
        summary.print(&mut io::stdout());

        sort_patterns(&mut rows, &order);
        let rows = if args.wrap { wrap_rows(rows) } else { rows };

        if index > 0 {
            tables.extend_from_slice(b"\n------------------------------------------\n");
        }
        format::format_data(&mut tables, &fields, &formatters, &opts, &rows);
    }
    // Summaries go out as files are read; the combined tables follow.
    let _ = io::Write::write(&mut io::stdout(), &tables);
    Ok(())
}

fn process_file(file_name: &str, verbose: bool) -> Result<(Summary, Vec<QueryPattern>)> {
    let base_parser = BaseParser::new();
    let mut context = Context::with_defaults();
    let mut summary = Summary::new(file_name);
    let mut aggregator = QueryAggregator::new();

    for line in LineSource::open(file_name)? {
        let (line_number, raw) = line?;
        summary.line_count += 1;

        let base = match base_parser.parse(line_number, &raw) {
            Ok(base) => base,
            Err(_) => {
                summary.error_count += 1;
                continue;
            }
        };
        if base.raw_message.is_empty() {
            summary.error_count += 1;
            continue;
        }
        match context.new_entry(&base) {
            Ok(entry) => {
                summary.update(&entry);
                aggregator.observe(&entry.message);
            }
            Err(_) => {
                summary.error_count += 1;
            }
        }
    }

    summary.guess(context.versions());
    if verbose {
        eprintln!(
            "{}: {} lines, {} errors",
            file_name, summary.line_count, summary.error_count
        );
    }
    Ok((summary, aggregator.finish()))
}

const FMT_DEFAULTS: &str = "namespace,operation,pattern,count,min,max,95%,sum";

// Fold long pattern strings onto continuation rows so the fixed-width
// table stays narrow.
const WRAP_WIDTH: usize = 60;

fn wrap_rows(rows: Vec<QueryPattern>) -> Vec<QueryPattern> {
    let mut out = vec![];
    for mut row in rows {
        if row.pattern.len() <= WRAP_WIDTH {
            out.push(row);
            continue;
        }
        let chunks: Vec<String> = row
            .pattern
            .chars()
            .collect::<Vec<char>>()
            .chunks(WRAP_WIDTH)
            .map(|c| c.iter().collect())
            .collect();
        let mut chunks = chunks.into_iter();
        row.pattern = chunks.next().unwrap();
        let (namespace, operation) = (row.namespace, row.operation);
        out.push(row);
        for chunk in chunks {
            out.push(QueryPattern {
                namespace,
                operation,
                pattern: chunk,
                count: 0,
                min: 0,
                max: 0,
                sum: 0,
                n95: f64::NAN,
                samples: vec![],
                cursor_id: 0,
            });
        }
    }
    out
}

type QueryFmt = fn(&QueryPattern) -> String;

fn my_formatters() -> (HashMap<String, QueryFmt>, &'static str) {
    let mut formatters: HashMap<String, QueryFmt> = HashMap::new();
    formatters.insert("namespace".to_string(), format_namespace);
    formatters.insert("operation".to_string(), format_operation);
    formatters.insert("pattern".to_string(), format_pattern);
    formatters.insert("count".to_string(), format_count);
    formatters.insert("min".to_string(), format_min);
    formatters.insert("max".to_string(), format_max);
    formatters.insert("95%".to_string(), format_n95);
    formatters.insert("sum".to_string(), format_sum);
    (formatters, FMT_DEFAULTS)
}

pub fn fmt_help() -> format::Help {
    let (formatters, defaults) = my_formatters();
    format::Help {
        fields: formatters.keys().cloned().collect(),
        defaults: defaults.to_string(),
    }
}

// Continuation rows produced by --wrap carry only the pattern text.

fn is_continuation(d: &QueryPattern) -> bool {
    d.count == 0
}

fn format_namespace(d: &QueryPattern) -> String {
    if is_continuation(d) {
        "".to_string()
    } else {
        d.namespace.to_string()
    }
}

fn format_operation(d: &QueryPattern) -> String {
    if is_continuation(d) {
        "".to_string()
    } else {
        d.operation.to_string()
    }
}

fn format_pattern(d: &QueryPattern) -> String {
    d.pattern.clone()
}

fn format_count(d: &QueryPattern) -> String {
    if is_continuation(d) {
        "".to_string()
    } else {
        d.count.to_string()
    }
}

fn format_min(d: &QueryPattern) -> String {
    if is_continuation(d) {
        "".to_string()
    } else {
        d.min.to_string()
    }
}

fn format_max(d: &QueryPattern) -> String {
    if is_continuation(d) {
        "".to_string()
    } else {
        d.max.to_string()
    }
}

fn format_n95(d: &QueryPattern) -> String {
    if is_continuation(d) {
        "".to_string()
    } else if d.n95.is_nan() {
        "-".to_string()
    } else {
        format!("{:.1}", d.n95)
    }
}

fn format_sum(d: &QueryPattern) -> String {
    if is_continuation(d) {
        "".to_string()
    } else {
        d.sum.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongolog::parse_json;
    use mongolog::{BaseParser, Context, MsgCommand};

    fn find_message(ns: &str, filter: &str, duration_ms: i64) -> Message {
        let payload =
            parse_json(&format!(r#"{{ find: "x", filter: {} }}"#, filter), false).unwrap();
        Message::Command(MsgCommand {
            namespace: ns.to_string(),
            command: "find".to_string(),
            payload,
            duration_ms,
            ..MsgCommand::default()
        })
    }

    #[test]
    fn test_aggregation_counts() {
        let mut agg = QueryAggregator::new();
        for duration in [10, 20, 30] {
            agg.observe(&find_message("test.foo", "{ a: 1 }", duration));
        }
        let rows = agg.finish();
        assert!(rows.len() == 1);
        let row = &rows[0];
        assert!(row.namespace.as_str() == "test.foo");
        assert!(row.operation.as_str() == "find");
        assert!(row.pattern == "{a:V}");
        assert!(row.count == 3);
        assert!(row.min == 10 && row.max == 30 && row.sum == 60);
        // index = 2.85, not integer and > 1: average of samples[1] and [2].
        assert!(row.n95 == 25.0);
    }

    #[test]
    fn test_aggregation_keys_split_by_shape() {
        let mut agg = QueryAggregator::new();
        agg.observe(&find_message("test.foo", "{ a: 1 }", 5));
        agg.observe(&find_message("test.foo", "{ a: 99 }", 5));
        agg.observe(&find_message("test.foo", "{ b: 1 }", 5));
        agg.observe(&find_message("test.bar", "{ a: 1 }", 5));
        let rows = agg.finish();
        // Same shape on the same namespace coalesces; different field or
        // namespace does not.
        assert!(rows.len() == 3);
        assert!(rows.iter().any(|r| r.namespace.as_str() == "test.foo" && r.count == 2));
    }

    #[test]
    fn test_aggregation_ignores_unlisted_operations() {
        let mut agg = QueryAggregator::new();
        let payload = parse_json(r#"{ isMaster: 1 }"#, false).unwrap();
        agg.observe(&Message::Command(MsgCommand {
            namespace: "admin.$cmd".to_string(),
            command: "isMaster".to_string(),
            payload,
            duration_ms: 1,
            ..MsgCommand::default()
        }));
        assert!(agg.finish().is_empty());
    }

    #[test]
    fn test_percentile95() {
        assert!(percentile95(&[]).is_nan());
        assert!(percentile95(&[7]).is_nan());
        assert!(percentile95(&[10, 20]) == 15.0);
        assert!(percentile95(&[10, 20, 30]) == 25.0);
        // 20 samples: index = 19.0 exactly, so the sample at that position.
        let samples: Vec<i64> = (1..=20).collect();
        assert!(percentile95(&samples) == 20.0);
        // 40 samples: index = 38.0 exactly.
        let samples: Vec<i64> = (1..=40).collect();
        assert!(percentile95(&samples) == 39.0);
    }

    #[test]
    fn test_sort_chain() {
        let mut agg = QueryAggregator::new();
        agg.observe(&find_message("test.bbb", "{ a: 1 }", 10));
        agg.observe(&find_message("test.aaa", "{ a: 1 }", 10));
        agg.observe(&find_message("test.aaa", "{ a: 1 }", 10));
        agg.observe(&find_message("test.ccc", "{ a: 1 }", 100));
        let mut rows = agg.finish();

        // Default chain: sum descending, then namespace ascending.
        sort_patterns(&mut rows, &parse_sort_spec(&None).unwrap());
        assert!(rows[0].namespace.as_str() == "test.ccc");
        assert!(rows[1].namespace.as_str() == "test.aaa");
        assert!(rows[2].namespace.as_str() == "test.bbb");

        // --sort count puts the highest count first regardless of sum.
        let order = parse_sort_spec(&Some("count".to_string())).unwrap();
        assert!(order[0] == SortKey::Count);
        sort_patterns(&mut rows, &order);
        assert!(rows[0].namespace.as_str() == "test.aaa" && rows[0].count == 2);
        // Ties on count fall through to sum, then namespace ascending.
        assert!(rows[1].namespace.as_str() == "test.ccc");
        assert!(rows[2].namespace.as_str() == "test.bbb");
    }

    #[test]
    fn test_parse_sort_spec_rejects_unknown() {
        assert!(parse_sort_spec(&Some("frequency".to_string())).is_err());
        let order = parse_sort_spec(&Some("95%,max".to_string())).unwrap();
        assert!(order[0] == SortKey::N95 && order[1] == SortKey::Max);
    }

    #[test]
    fn test_wrap_rows() {
        let mut agg = QueryAggregator::new();
        let wide = format!("{{ {}: 1 }}", "a".repeat(2 * WRAP_WIDTH));
        agg.observe(&find_message("test.foo", &wide, 3));
        let rows = wrap_rows(agg.finish());
        assert!(rows.len() == 3);
        assert!(!is_continuation(&rows[0]) && is_continuation(&rows[1]));
        let whole: String = rows.iter().map(|r| r.pattern.clone()).collect();
        assert!(whole.starts_with('{') && whole.ends_with('}'));
        assert!(format_count(&rows[1]).is_empty());
    }

    // A small end-to-end path: raw 3.6 lines through base parse, version
    // dispatch, and aggregation.
    #[test]
    fn test_lines_to_table() {
        let lines = [
            "2018-06-25T18:09:33.522Z I CONTROL [initandlisten] db version v3.6.3",
            "2018-06-25T18:09:34.000Z I COMMAND [conn4] command test.foo command: find \
             { find: \"foo\", filter: { a: 1.0 } } planSummary: COLLSCAN keysExamined:0 \
             docsExamined:3 numYields:0 nreturned:2 reslen:245 locks:{} protocol:op_msg 10ms",
            "2018-06-25T18:09:35.000Z I COMMAND [conn4] command test.foo command: find \
             { find: \"foo\", filter: { a: 2.0 } } planSummary: COLLSCAN keysExamined:0 \
             docsExamined:3 numYields:0 nreturned:2 reslen:245 locks:{} protocol:op_msg 30ms",
            "total garbage, not a log line at all",
        ];
        let base_parser = BaseParser::new();
        let mut context = Context::with_defaults();
        let mut aggregator = QueryAggregator::new();
        let mut errors = 0;
        for (ix, raw) in lines.iter().enumerate() {
            match base_parser.parse(ix as u64 + 1, raw) {
                Ok(base) => match context.new_entry(&base) {
                    Ok(entry) => aggregator.observe(&entry.message),
                    Err(_) => errors += 1,
                },
                Err(_) => errors += 1,
            }
        }
        assert!(errors == 1);
        let rows = aggregator.finish();
        assert!(rows.len() == 1);
        assert!(rows[0].pattern == "{a:V}");
        assert!(rows[0].count == 2 && rows[0].sum == 40);
    }
}
