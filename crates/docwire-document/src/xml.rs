//! XML text form of a [`ValueDocument`].
//!
//! ```text
//! <docwire class-id=".." function-id="..">
//!   <values>
//!     <default-group> <item name=".." type="..">text</item> ... </default-group>
//!     <group name=".."> <item ...> <item ...>child</item> </item> </group>
//!   </values>
//! </docwire>
//! ```
//!
//! Scalar text is kept verbatim. Whitespace between elements is insignificant,
//! so items that hold child items ignore their own text.
//!
//! Text is escaped but never filtered. Control characters that XML 1.0 does
//! not allow (anything below U+0020 except tab, LF and CR) are written as-is;
//! this module reads them back, a strict XML parser will not.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::document::{Group, Item, ItemBody, ValueDocument};
use crate::error::ParseError;

pub const ROOT_TAG: &str = "docwire";
pub const VALUES_TAG: &str = "values";
pub const DEFAULT_GROUP_TAG: &str = "default-group";
pub const GROUP_TAG: &str = "group";
pub const ITEM_TAG: &str = "item";

pub const ATTR_NAME: &str = "name";
pub const ATTR_TYPE: &str = "type";
pub const ATTR_CLASS_ID: &str = "class-id";
pub const ATTR_FUNCTION_ID: &str = "function-id";

pub(crate) fn write_document(doc: &ValueDocument) -> Result<Vec<u8>, quick_xml::Error> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let class_id = doc.class_id.to_string();
    let function_id = doc.function_id.to_string();
    let mut root = BytesStart::new(ROOT_TAG);
    root.push_attribute((ATTR_CLASS_ID, class_id.as_str()));
    root.push_attribute((ATTR_FUNCTION_ID, function_id.as_str()));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new(VALUES_TAG)))?;

    write_group(&mut writer, BytesStart::new(DEFAULT_GROUP_TAG), &doc.default_group)?;
    for group in doc.groups.values() {
        let mut start = BytesStart::new(GROUP_TAG);
        start.push_attribute((ATTR_NAME, group.name.as_str()));
        write_group(&mut writer, start, group)?;
    }

    writer.write_event(Event::End(BytesEnd::new(VALUES_TAG)))?;
    writer.write_event(Event::End(BytesEnd::new(ROOT_TAG)))?;
    Ok(writer.into_inner())
}

fn write_group(
    writer: &mut Writer<Vec<u8>>,
    start: BytesStart<'_>,
    group: &Group,
) -> Result<(), quick_xml::Error> {
    let end = start.to_end().into_owned();
    writer.write_event(Event::Start(start))?;
    for item in &group.items {
        write_item(writer, item)?;
    }
    writer.write_event(Event::End(end))?;
    Ok(())
}

fn write_item(writer: &mut Writer<Vec<u8>>, item: &Item) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new(ITEM_TAG);
    start.push_attribute((ATTR_NAME, item.name()));
    start.push_attribute((ATTR_TYPE, item.type_name()));
    writer.write_event(Event::Start(start))?;

    match &item.body {
        ItemBody::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
        ItemBody::Children(children) => {
            for child in children {
                write_item(writer, child)?;
            }
        }
    }

    writer.write_event(Event::End(BytesEnd::new(ITEM_TAG)))?;
    Ok(())
}

/// Generic element tree; the document schema is applied afterwards.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }
}

pub(crate) fn read_document(text: &str) -> Result<ValueDocument, ParseError> {
    let root = read_tree(text)?;

    let mut doc = ValueDocument::new();
    doc.class_id = read_id(&root, ATTR_CLASS_ID);
    doc.function_id = read_id(&root, ATTR_FUNCTION_ID);

    // Only the first values node counts.
    let Some(values) = root.children_named(VALUES_TAG).next() else {
        return Ok(doc);
    };

    for element in &values.children {
        match element.name.as_str() {
            DEFAULT_GROUP_TAG => doc.default_group.items.extend(read_items(element)),
            GROUP_TAG => {
                let name = element.attribute(ATTR_NAME).unwrap_or_default();
                if name.is_empty() {
                    continue;
                }
                doc.groups
                    .entry(name.to_string())
                    .or_insert_with(|| Group::new(name))
                    .items
                    .extend(read_items(element));
            }
            _ => {}
        }
    }

    doc.default_group.rebuild_index();
    for group in doc.groups.values_mut() {
        group.rebuild_index();
    }
    Ok(doc)
}

fn read_id(root: &Element, attribute: &str) -> i32 {
    root.attribute(attribute)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn read_items(parent: &Element) -> impl Iterator<Item = Item> + '_ {
    parent.children_named(ITEM_TAG).map(read_item)
}

fn read_item(element: &Element) -> Item {
    let has_children = element.children_named(ITEM_TAG).next().is_some();
    let body = if has_children {
        ItemBody::Children(read_items(element).collect())
    } else {
        ItemBody::Text(element.text.clone())
    };

    Item {
        name: element.attribute(ATTR_NAME).unwrap_or_default().to_string(),
        type_name: element.attribute(ATTR_TYPE).unwrap_or_default().to_string(),
        body,
    }
}

fn read_tree(text: &str) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(open_element(&start)?),
            Ok(Event::Empty(start)) => {
                let element = open_element(&start)?;
                close_element(element, &mut stack, &mut root)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ParseError::Malformed("unexpected closing tag".into()))?;
                close_element(element, &mut stack, &mut root)?;
            }
            Ok(Event::Text(raw)) => {
                let unescaped = raw.unescape().map_err(malformed)?;
                match stack.last_mut() {
                    Some(open) => open.text.push_str(&unescaped),
                    None if unescaped.trim().is_empty() => {}
                    None => {
                        return Err(ParseError::Malformed(
                            "text outside the root element".into(),
                        ))
                    }
                }
            }
            Ok(Event::CData(raw)) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&raw));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(malformed(err)),
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::Malformed(format!(
            "unclosed element <{}>",
            open.name
        )));
    }
    root.ok_or(ParseError::InvalidRoot)
}

fn open_element(start: &BytesStart<'_>) -> Result<Element, ParseError> {
    let mut element = Element {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        ..Element::default()
    };
    for attribute in start.attributes() {
        let attribute = attribute.map_err(malformed)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(malformed)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn close_element(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => {
            return Err(ParseError::Malformed("multiple root elements".into()));
        }
        None => *root = Some(element),
    }
    Ok(())
}

fn malformed(err: impl std::fmt::Display) -> ParseError {
    ParseError::Malformed(err.to_string())
}
