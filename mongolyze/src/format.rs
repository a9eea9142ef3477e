/// Generic formatting for rows extracted from a data structure, presented
/// fixed-width, as csv, or as json, with or without a header.
///
/// A command exposes its printable fields as a map from field name to
/// formatter function; the user picks fields and output control words with
/// `--fmt`, and `--fmt=help` lists what is available.
use anyhow::{bail, Result};
use csv;
use json;
use std::collections::{HashMap, HashSet};
use std::io;

pub struct Help {
    pub fields: Vec<String>,
    pub defaults: String,
}

pub fn maybe_help<F>(fmt: &Option<String>, f: F) -> bool
where
    F: Fn() -> Help,
{
    if let Some(ref s) = fmt {
        if s.as_str() == "help" {
            let mut help = f();
            println!("Syntax:\n  --fmt=(field|control),...");
            println!("\nFields:");
            help.fields.sort();
            for field in help.fields {
                println!("  {field}");
            }
            println!("\nDefaults:\n  {}", help.defaults);
            println!("\nControl:\n  csv\n  csvnamed\n  fixed\n  json\n  header\n  noheader");
            return true;
        }
    }
    false
}

/// Split `spec` into the known field names and the set of control words.
/// Errors out if no field was selected.
pub fn parse_fields<'a, DataT, FmtT>(
    spec: &'a str,
    formatters: &HashMap<String, FmtT>,
) -> Result<(Vec<&'a str>, HashSet<&'a str>)>
where
    FmtT: Fn(&DataT) -> String,
{
    let mut fields = vec![];
    let mut others = HashSet::new();
    for x in spec.split(',') {
        if formatters.contains_key(x) {
            fields.push(x);
        } else {
            others.insert(x);
        }
    }
    if fields.is_empty() {
        bail!("no output fields were selected");
    }
    Ok((fields, others))
}

pub struct FormatOptions {
    pub csv: bool,    // csv or csvnamed explicitly requested
    pub json: bool,   // json explicitly requested
    pub named: bool,  // csvnamed explicitly requested
    pub header: bool, // on by default for fixed output, opt-in for csv
}

pub fn standard_options(others: &HashSet<&str>) -> FormatOptions {
    let named = others.contains("csvnamed");
    let csv = others.contains("csv") || named;
    let json = others.contains("json") && !csv;
    // json gets no header even if one is requested
    let header = (!csv && !json && !others.contains("noheader"))
        || (csv && others.contains("header"));
    FormatOptions { csv, json, named, header }
}

/// Apply the formatters named by `fields` to each datum and write the
/// resulting table.
pub fn format_data<DataT, FmtT>(
    output: &mut dyn io::Write,
    fields: &[&str],
    formatters: &HashMap<String, FmtT>,
    opts: &FormatOptions,
    data: &[DataT],
) where
    FmtT: Fn(&DataT) -> String,
{
    let mut cols = Vec::<Vec<String>>::new();
    cols.resize(fields.len(), vec![]);
    for x in data {
        for (ix, kwd) in fields.iter().enumerate() {
            cols[ix].push(formatters.get(*kwd).unwrap()(x));
        }
    }

    if opts.csv {
        format_csv(output, fields, opts, cols);
    } else if opts.json {
        format_json(output, fields, cols);
    } else {
        format_fixed_width(output, fields, opts, cols);
    }
}

fn format_fixed_width(
    output: &mut dyn io::Write,
    fields: &[&str],
    opts: &FormatOptions,
    cols: Vec<Vec<String>>,
) {
    // Column width is the max across all entries in the column, header
    // included if present.
    let mut widths = vec![0; fields.len()];
    if opts.header {
        for (ix, kwd) in fields.iter().enumerate() {
            widths[ix] = kwd.len();
        }
    }
    for (ix, col) in cols.iter().enumerate() {
        for val in col {
            widths[ix] = usize::max(widths[ix], val.len());
        }
    }

    if opts.header {
        let mut s = "".to_string();
        for (ix, kwd) in fields.iter().enumerate() {
            let w = widths[ix];
            s += format!("{:w$}  ", kwd).as_str();
        }
        // Ignore write errors here, they are common for broken pipelines
        let _ = output.write(s.trim_end().as_bytes());
        let _ = output.write(b"\n");
    }

    let rows = cols.first().map(|c| c.len()).unwrap_or(0);
    for row in 0..rows {
        let mut s = "".to_string();
        for (col, w) in cols.iter().zip(widths.iter()) {
            let w = *w;
            s += format!("{:w$}  ", col[row]).as_str();
        }
        let _ = output.write(s.trim_end().as_bytes());
        let _ = output.write(b"\n");
    }
}

fn format_csv(
    output: &mut dyn io::Write,
    fields: &[&str],
    opts: &FormatOptions,
    cols: Vec<Vec<String>>,
) {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(output);

    if opts.header {
        writer
            .write_record(fields.iter().map(|kwd| kwd.to_string()))
            .unwrap();
    }

    let rows = cols.first().map(|c| c.len()).unwrap_or(0);
    for row in 0..rows {
        let mut out_fields = Vec::new();
        for (ix, col) in cols.iter().enumerate() {
            if opts.named {
                out_fields.push(format!("{}={}", fields[ix], col[row]));
            } else {
                out_fields.push(col[row].clone());
            }
        }
        writer.write_record(out_fields).unwrap();
    }

    writer.flush().unwrap();
}

fn format_json(output: &mut dyn io::Write, fields: &[&str], cols: Vec<Vec<String>>) {
    let mut objects = vec![];
    let rows = cols.first().map(|c| c.len()).unwrap_or(0);
    for row in 0..rows {
        let mut obj = json::JsonValue::new_object();
        for (ix, col) in cols.iter().enumerate() {
            obj[fields[ix]] = col[row].clone().into();
        }
        objects.push(obj);
    }
    let _ = output.write(json::stringify(objects).as_bytes());
    let _ = output.write(b"\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatters() -> HashMap<String, fn(&(i32, &'static str)) -> String> {
        let mut m: HashMap<String, fn(&(i32, &'static str)) -> String> = HashMap::new();
        m.insert("num".to_string(), |d| d.0.to_string());
        m.insert("name".to_string(), |d| d.1.to_string());
        m
    }

    #[test]
    fn test_parse_fields() {
        let f = formatters();
        let (fields, others) = parse_fields("num,csv,name", &f).unwrap();
        assert!(fields == vec!["num", "name"]);
        assert!(others.contains("csv"));
        assert!(parse_fields("csv,noheader", &f).is_err());
    }

    #[test]
    fn test_fixed_width_output() {
        let f = formatters();
        let data = vec![(1, "alpha"), (22, "b")];
        let (fields, others) = parse_fields("num,name", &f).unwrap();
        let opts = standard_options(&others);
        let mut out = vec![];
        format_data(&mut out, &fields, &f, &opts, &data);
        let text = String::from_utf8(out).unwrap();
        assert!(text == "num  name\n1    alpha\n22   b\n", "got {:?}", text);
    }

    #[test]
    fn test_csv_output() {
        let f = formatters();
        let data = vec![(1, "alpha")];
        let (fields, others) = parse_fields("num,name,csv", &f).unwrap();
        let opts = standard_options(&others);
        assert!(opts.csv && !opts.header);
        let mut out = vec![];
        format_data(&mut out, &fields, &f, &opts, &data);
        assert!(String::from_utf8(out).unwrap() == "1,alpha\n");
    }
}
