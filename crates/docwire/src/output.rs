use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use docwire_document::{Value, ValueDocument};
use docwire_frame::FrameHeader;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    class_id: i32,
    function_id: i32,
    payload_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<DocumentOutput<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Serialize)]
struct DocumentOutput<'a> {
    class_id: i32,
    function_id: i32,
    entries: Vec<EntryOutput<'a>>,
}

#[derive(Serialize)]
struct EntryOutput<'a> {
    group: &'a str,
    key: &'a str,
    #[serde(rename = "type")]
    type_name: &'a str,
    value: Option<Value>,
}

/// Every readable address of `document`, default group first.
fn entries(document: &ValueDocument) -> Vec<EntryOutput<'_>> {
    let mut groups = vec![None];
    groups.extend(document.group_names().into_iter().map(Some));

    groups
        .into_iter()
        .flat_map(move |group| {
            document
                .key_names(group)
                .into_iter()
                .filter_map(move |key| {
                    let item = document.item(group, key)?;
                    Some(EntryOutput {
                        group: group.unwrap_or(""),
                        key,
                        type_name: item.type_name(),
                        value: document.value(group, key),
                    })
                })
        })
        .collect()
}

pub fn print_document(header: &FrameHeader, document: &ValueDocument, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                class_id: header.class_id,
                function_id: header.function_id,
                payload_size: header.payload_size,
                document: Some(DocumentOutput {
                    class_id: document.class_id(),
                    function_id: document.function_id(),
                    entries: entries(document),
                }),
                error: None,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            println!("{}", header_line(header));
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["GROUP", "KEY", "TYPE", "VALUE"]);
            for entry in entries(document) {
                table.add_row(vec![
                    entry.group.to_string(),
                    entry.key.to_string(),
                    entry.type_name.to_string(),
                    value_preview(entry.value.as_ref()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{}", header_line(header));
            for entry in entries(document) {
                let address = if entry.group.is_empty() {
                    entry.key.to_string()
                } else {
                    format!("{}/{}", entry.group, entry.key)
                };
                println!(
                    "  {address} ({}) = {}",
                    entry.type_name,
                    value_preview(entry.value.as_ref())
                );
            }
        }
        OutputFormat::Raw => {
            print_raw(&document.serialize());
            print_raw(b"\n");
        }
    }
}

pub fn print_unreadable(header: &FrameHeader, error: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&FrameOutput {
            class_id: header.class_id,
            function_id: header.function_id,
            payload_size: header.payload_size,
            document: None,
            error: Some(error),
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{} unreadable: {error}", header_line(header));
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn header_line(header: &FrameHeader) -> String {
    format!(
        "class={} function={} size={}",
        header.class_id, header.function_id, header.payload_size
    )
}

fn value_preview(value: Option<&Value>) -> String {
    match value {
        Some(Value::Scalar(scalar)) => scalar.to_text(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
        None => "<unreadable>".to_string(),
    }
}
