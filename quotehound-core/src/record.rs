//! Tabular output for harvested quotes
//!
//! Two layouts of the same `(source_url, quote)` record set:
//! CSV with a header row, or one JSON object per line.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::Quote;

/// Output layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    #[default]
    Csv,
    Jsonl,
}

impl RecordFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RecordFormat::Csv => "csv",
            RecordFormat::Jsonl => "jsonl",
        }
    }
}

impl std::str::FromStr for RecordFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(RecordFormat::Csv),
            "jsonl" | "ndjson" => Ok(RecordFormat::Jsonl),
            other => Err(format!("unknown record format: {}", other)),
        }
    }
}

/// Write quotes in the requested layout
pub fn write_records<W: Write>(quotes: &[Quote], format: RecordFormat, out: &mut W) -> io::Result<()> {
    match format {
        RecordFormat::Csv => write_csv(quotes, out),
        RecordFormat::Jsonl => write_jsonl(quotes, out),
    }
}

/// `source_url,quote` CSV with RFC 4180 quoting
pub fn write_csv<W: Write>(quotes: &[Quote], out: &mut W) -> io::Result<()> {
    writeln!(out, "source_url,quote")?;
    for q in quotes {
        writeln!(out, "{},{}", csv_field(&q.source_url), csv_field(&q.text))?;
    }
    Ok(())
}

/// One `{"source_url","quote","fingerprint"}` object per line
pub fn write_jsonl<W: Write>(quotes: &[Quote], out: &mut W) -> io::Result<()> {
    for q in quotes {
        serde_json::to_writer(&mut *out, q)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Lowercase ASCII slug for file names
pub fn slugify(name: &str) -> String {
    let slug = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_");

    if slug.is_empty() {
        "entity".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_csv_quoting() {
        let quotes = vec![
            Quote::new("https://a.example/q", "Plain text line"),
            Quote::new("https://b.example/q", "\"Wait, what?\" he said"),
        ];

        let mut buf = Vec::new();
        write_csv(&quotes, &mut buf).unwrap();
        let csv = String::from_utf8(buf).unwrap();

        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "source_url,quote");
        assert_eq!(lines[1], "https://a.example/q,Plain text line");
        assert_eq!(lines[2], "https://b.example/q,\"\"\"Wait, what?\"\" he said\"");
    }

    #[test]
    fn test_write_jsonl() {
        let quotes = vec![Quote::new("https://a.example", "Keep moving forward.")];

        let mut buf = Vec::new();
        write_records(&quotes, RecordFormat::Jsonl, &mut buf).unwrap();
        let line = String::from_utf8(buf).unwrap();

        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["source_url"], "https://a.example");
        assert_eq!(value["quote"], "Keep moving forward.");
        assert_eq!(value["fingerprint"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Monkey D. Luffy"), "monkey_d_luffy");
        assert_eq!(slugify("  "), "entity");
        assert_eq!(slugify("Roronoa-Zoro!"), "roronoa_zoro");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("CSV".parse::<RecordFormat>(), Ok(RecordFormat::Csv));
        assert_eq!("ndjson".parse::<RecordFormat>(), Ok(RecordFormat::Jsonl));
        assert!("xml".parse::<RecordFormat>().is_err());
    }
}
