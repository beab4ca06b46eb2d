use std::fs;

use docwire::send_document;
use docwire_document::{scalar, ScalarType, Value, ValueDocument};
use docwire_frame::FrameWriter;
use tracing::info;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, io_error, value_error, CliError, CliResult, SUCCESS};
use crate::output::print_raw;

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let mut document = ValueDocument::new();
    document.set_class_id(args.class_id);
    document.set_function_id(args.function_id);

    for assignment in &args.set {
        let parsed = parse_assignment(assignment)?;
        document.set_value(parsed.group.as_deref(), &parsed.key, parsed.value);
    }

    let mut writer = FrameWriter::new(Vec::new());
    send_document(&mut writer, &document).map_err(|e| frame_error("encode failed", e))?;
    let wire = writer.into_inner();

    match &args.output {
        Some(path) => {
            fs::write(path, &wire)
                .map_err(|e| io_error(&format!("write {}", path.display()), e))?;
            info!(path = %path.display(), bytes = wire.len(), "frame written");
        }
        None => print_raw(&wire),
    }

    Ok(SUCCESS)
}

#[derive(Debug, PartialEq)]
struct Assignment {
    group: Option<String>,
    key: String,
    value: Value,
}

/// Parse `[GROUP/]KEY=[TYPE:]VALUE`. Without a known type prefix the whole
/// right-hand side is stored as a string.
fn parse_assignment(text: &str) -> CliResult<Assignment> {
    let (address, raw) = text
        .split_once('=')
        .ok_or_else(|| CliError::usage(format!("expected [GROUP/]KEY=VALUE, got {text:?}")))?;

    let (group, key) = match address.split_once('/') {
        Some((group, key)) => (Some(group.to_string()), key),
        None => (None, address),
    };
    if key.is_empty() {
        return Err(CliError::usage(format!("missing key in {text:?}")));
    }

    Ok(Assignment {
        group,
        key: key.to_string(),
        value: parse_value(raw)?,
    })
}

fn parse_value(raw: &str) -> CliResult<Value> {
    let Some((type_name, body)) = raw.split_once(':') else {
        return Ok(Value::from(raw));
    };

    if type_name.eq_ignore_ascii_case("string-list") {
        let items: Vec<&str> = if body.is_empty() {
            Vec::new()
        } else {
            body.split(',').collect()
        };
        return Ok(Value::from(items));
    }

    match ScalarType::from_name(type_name) {
        Some(ty) => scalar::decode(body, ty)
            .map(Value::from)
            .map_err(|e| value_error("invalid value", e)),
        None => Ok(Value::from(raw)),
    }
}
