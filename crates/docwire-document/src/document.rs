use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{error, trace};

use crate::error::{Result, TypeMismatch};
use crate::scalar::{self, Scalar};
use crate::value::{ItemKind, Value};
use crate::xml;

/// One named entry of a group, or a child of a composite item.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) body: ItemBody,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ItemBody {
    Text(String),
    Children(Vec<Item>),
}

impl Item {
    /// Build the item tree for `value`, typed by its runtime shape.
    pub(crate) fn from_value(name: impl Into<String>, value: &Value) -> Self {
        let body = match value {
            Value::Scalar(scalar) => ItemBody::Text(scalar.to_text()),
            Value::List(items) => {
                ItemBody::Children(items.iter().map(|v| Item::from_value("", v)).collect())
            }
            Value::OrderedMap(map) => ItemBody::Children(
                map.iter()
                    .map(|(key, v)| Item::from_value(key.as_str(), v))
                    .collect(),
            ),
            Value::HashMap(map) => ItemBody::Children(
                map.iter()
                    .map(|(key, v)| Item::from_value(key.as_str(), v))
                    .collect(),
            ),
            Value::StringList(items) => ItemBody::Children(
                items
                    .iter()
                    .map(|s| Item::from_value("", &Value::Scalar(Scalar::String(s.clone()))))
                    .collect(),
            ),
        };

        Self {
            name: name.into(),
            type_name: value.kind().type_name().to_string(),
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `type` attribute as stored, which may be unknown.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn kind(&self) -> Option<ItemKind> {
        ItemKind::from_type_name(&self.type_name)
    }

    /// Scalar text, `None` when the item holds children.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ItemBody::Text(text) => Some(text),
            ItemBody::Children(_) => None,
        }
    }

    pub fn children(&self) -> &[Item] {
        match &self.body {
            ItemBody::Text(_) => &[],
            ItemBody::Children(children) => children,
        }
    }

    /// Rebuild the value this item stores.
    ///
    /// Children of a composite that fail to decode are left out; the rest of
    /// the composite is still returned.
    pub fn to_value(&self) -> std::result::Result<Value, TypeMismatch> {
        let Some(kind) = self.kind() else {
            return Err(TypeMismatch::new(
                self.type_name.as_str(),
                self.text().unwrap_or_default(),
            ));
        };

        let value = match kind {
            ItemKind::Scalar(ty) => {
                let text = self
                    .text()
                    .ok_or_else(|| TypeMismatch::new(ty.name(), ""))?;
                Value::Scalar(scalar::decode(text, ty)?)
            }
            ItemKind::List => Value::List(
                self.children()
                    .iter()
                    .filter_map(|child| child.to_value().ok())
                    .collect(),
            ),
            ItemKind::StringList => Value::StringList(
                self.children()
                    .iter()
                    .filter_map(|child| child.to_value().ok()?.to_text())
                    .collect(),
            ),
            ItemKind::OrderedMap => {
                Value::OrderedMap(self.named_children().collect::<BTreeMap<_, _>>())
            }
            ItemKind::HashMap => Value::HashMap(self.named_children().collect::<HashMap<_, _>>()),
        };
        Ok(value)
    }

    fn named_children(&self) -> impl Iterator<Item = (String, Value)> + '_ {
        self.children().iter().filter_map(|child| {
            child
                .to_value()
                .ok()
                .map(|value| (child.name.clone(), value))
        })
    }
}

/// Named collection of items.
///
/// `items` is authoritative; `index` maps each name to the position of its
/// last occurrence and is rebuilt whenever items are bulk-loaded or removed.
#[derive(Debug, Clone, Default)]
pub(crate) struct Group {
    pub(crate) name: String,
    pub(crate) items: Vec<Item>,
    index: HashMap<String, usize>,
}

impl Group {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn get(&self, key: &str) -> Option<&Item> {
        self.index.get(key).and_then(|&pos| self.items.get(pos))
    }

    /// Overwrite in place when `item.name` exists, append otherwise.
    fn upsert(&mut self, item: Item) {
        if let Some(slot) = self.index.get(&item.name).and_then(|&pos| self.items.get_mut(pos)) {
            *slot = item;
            return;
        }
        self.index.insert(item.name.clone(), self.items.len());
        self.items.push(item);
    }

    /// Drop every item called `key`, returning the one lookups resolved to.
    fn remove(&mut self, key: &str) -> Option<Item> {
        let pos = *self.index.get(key)?;
        let removed = self.items.get(pos).cloned();
        self.items.retain(|item| item.name != key);
        self.rebuild_index();
        removed
    }

    pub(crate) fn rebuild_index(&mut self) {
        self.index.clear();
        for (pos, item) in self.items.iter().enumerate() {
            self.index.insert(item.name.clone(), pos);
        }
    }

    /// Every addressable key once, in order of first occurrence. The empty
    /// key is a valid address and is listed like any other.
    fn key_names(&self) -> Vec<&str> {
        let mut seen = HashSet::with_capacity(self.index.len());
        self.items
            .iter()
            .map(|item| item.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

/// Hierarchical store of typed values addressed by `(group, key)`.
///
/// Keys outside any named group live in the default group, addressed with
/// `None` (or an empty group name). Every address is unique: writing an
/// existing address replaces its value but keeps its position.
#[derive(Debug, Clone, Default)]
pub struct ValueDocument {
    pub(crate) class_id: i32,
    pub(crate) function_id: i32,
    pub(crate) default_group: Group,
    pub(crate) groups: IndexMap<String, Group>,
}

impl ValueDocument {
    /// An empty document with routing ids `0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a document from its XML text form.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)?;
        Self::parse_str(text)
    }

    pub fn parse_str(text: &str) -> Result<Self> {
        let doc = xml::read_document(text)?;
        trace!(
            groups = doc.groups.len(),
            class_id = doc.class_id,
            function_id = doc.function_id,
            "parsed document"
        );
        Ok(doc)
    }

    /// UTF-8 XML text that [`parse`](Self::parse) reads back to an equal document.
    pub fn serialize(&self) -> Vec<u8> {
        match xml::write_document(self) {
            Ok(bytes) => bytes,
            Err(err) => {
                // Writing into a Vec has no I/O to fail.
                error!(%err, "document serialization failed");
                Vec::new()
            }
        }
    }

    pub fn to_xml_string(&self) -> String {
        String::from_utf8_lossy(&self.serialize()).into_owned()
    }

    pub fn class_id(&self) -> i32 {
        self.class_id
    }

    pub fn set_class_id(&mut self, class_id: i32) {
        self.class_id = class_id;
    }

    pub fn function_id(&self) -> i32 {
        self.function_id
    }

    pub fn set_function_id(&mut self, function_id: i32) {
        self.function_id = function_id;
    }

    /// Store `value` at `(group, key)`, creating the group when needed.
    pub fn set_value(&mut self, group: Option<&str>, key: &str, value: impl Into<Value>) {
        let item = Item::from_value(key, &value.into());
        match group.filter(|name| !name.is_empty()) {
            None => self.default_group.upsert(item),
            Some(name) => self
                .groups
                .entry(name.to_string())
                .or_insert_with(|| Group::new(name))
                .upsert(item),
        }
    }

    /// Value at `(group, key)`, or `default` when it is missing or unreadable.
    pub fn get_value(&self, group: Option<&str>, key: &str, default: impl Into<Value>) -> Value {
        self.value(group, key).unwrap_or_else(|| default.into())
    }

    /// Value at `(group, key)`, `None` when missing or unreadable.
    pub fn value(&self, group: Option<&str>, key: &str) -> Option<Value> {
        let item = self.item(group, key)?;
        match item.to_value() {
            Ok(value) => Some(value),
            Err(err) => {
                trace!(?group, key, %err, "stored value unreadable");
                None
            }
        }
    }

    /// Raw item at `(group, key)`.
    pub fn item(&self, group: Option<&str>, key: &str) -> Option<&Item> {
        self.group(group)?.get(key)
    }

    /// Whether a named group exists. The default group is not reported.
    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn has_key(&self, group: Option<&str>, key: &str) -> bool {
        self.item(group, key).is_some()
    }

    /// Named groups in the order they were first created or read.
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    /// Keys of a group in the order they were first written or read.
    pub fn key_names(&self, group: Option<&str>) -> Vec<&str> {
        self.group(group)
            .map(Group::key_names)
            .unwrap_or_default()
    }

    /// Remove `(group, key)`, returning its value when it was readable.
    pub fn remove_value(&mut self, group: Option<&str>, key: &str) -> Option<Value> {
        let group = match group.filter(|name| !name.is_empty()) {
            None => &mut self.default_group,
            Some(name) => self.groups.get_mut(name)?,
        };
        group.remove(key)?.to_value().ok()
    }

    /// Drop all groups and values. Routing ids are kept.
    pub fn clear(&mut self) {
        self.default_group = Group::default();
        self.groups.clear();
    }

    fn group(&self, group: Option<&str>) -> Option<&Group> {
        match group.filter(|name| !name.is_empty()) {
            None => Some(&self.default_group),
            Some(name) => self.groups.get(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let mut doc = ValueDocument::new();
        doc.set_value(Some("Network"), "Timeout", 30);
        doc.set_value(None, "Name", "sensor");

        assert_eq!(doc.get_value(Some("Network"), "Timeout", 0), Value::from(30));
        assert_eq!(doc.get_value(None, "Name", ""), Value::from("sensor"));
        assert_eq!(doc.get_value(Some(""), "Name", ""), Value::from("sensor"));
    }

    #[test]
    fn missing_address_returns_default() {
        let mut doc = ValueDocument::new();
        doc.set_value(Some("Network"), "Timeout", 30);

        assert_eq!(doc.get_value(Some("Network"), "Missing", -1), Value::from(-1));
        assert_eq!(doc.get_value(Some("Other"), "Timeout", -1), Value::from(-1));
        assert_eq!(doc.get_value(None, "Timeout", -1), Value::from(-1));
        assert_eq!(doc.value(None, "Timeout"), None);
    }

    #[test]
    fn get_value_is_idempotent() {
        let mut doc = ValueDocument::new();
        doc.set_value(None, "k", vec![Value::from(1), Value::from("two")]);

        let first = doc.get_value(None, "k", 0);
        let second = doc.get_value(None, "k", 0);
        assert_eq!(first, second);
        assert_eq!(doc.key_names(None), ["k"]);
    }

    #[test]
    fn last_write_wins_and_keeps_position() {
        let mut doc = ValueDocument::new();
        doc.set_value(Some("g"), "a", 1);
        doc.set_value(Some("g"), "b", 2);
        doc.set_value(Some("g"), "a", "replaced");

        assert_eq!(doc.key_names(Some("g")), ["a", "b"]);
        assert_eq!(doc.get_value(Some("g"), "a", 0), Value::from("replaced"));
    }

    #[test]
    fn groups_are_created_implicitly_in_order() {
        let mut doc = ValueDocument::new();
        doc.set_value(Some("Zeta"), "k", 1);
        doc.set_value(Some("Alpha"), "k", 1);
        doc.set_value(None, "k", 1);

        assert_eq!(doc.group_names(), ["Zeta", "Alpha"]);
        assert!(doc.has_group("Alpha"));
        assert!(!doc.has_group("Beta"));
        assert!(doc.has_key(Some("Zeta"), "k"));
        assert!(doc.has_key(None, "k"));
        assert!(!doc.has_key(Some("Zeta"), "x"));
        assert!(doc.key_names(Some("Beta")).is_empty());
    }

    #[test]
    fn composites_nest() {
        let mut inner = HashMap::new();
        inner.insert("deep".to_string(), Value::from(vec!["x", "y"]));
        let mut outer = BTreeMap::new();
        outer.insert("inner".to_string(), Value::from(inner));
        outer.insert("n".to_string(), Value::from(1.25));
        let value = Value::from(vec![Value::from(outer), Value::from(false)]);

        let mut doc = ValueDocument::new();
        doc.set_value(Some("g"), "nested", value.clone());

        let item = doc.item(Some("g"), "nested").unwrap();
        assert_eq!(item.kind(), Some(ItemKind::List));
        assert_eq!(item.children().len(), 2);
        assert_eq!(item.children()[0].type_name(), "ordered-map");
        assert_eq!(doc.get_value(Some("g"), "nested", 0), value);
    }

    #[test]
    fn undecodable_scalar_yields_default() {
        let mut doc = ValueDocument::new();
        doc.default_group.upsert(Item {
            name: "port".into(),
            type_name: "int".into(),
            body: ItemBody::Text("eighty".into()),
        });
        doc.default_group.upsert(Item {
            name: "shape".into(),
            type_name: "QPolygon".into(),
            body: ItemBody::Text("1,2".into()),
        });

        assert_eq!(doc.get_value(None, "port", 80), Value::from(80));
        assert_eq!(doc.get_value(None, "shape", "none"), Value::from("none"));
        assert!(doc.has_key(None, "port"));
    }

    #[test]
    fn lenient_list_read_skips_bad_children() {
        let list = Item {
            name: "l".into(),
            type_name: "list".into(),
            body: ItemBody::Children(vec![
                Item {
                    name: String::new(),
                    type_name: "int".into(),
                    body: ItemBody::Text("oops".into()),
                },
                Item {
                    name: String::new(),
                    type_name: "int".into(),
                    body: ItemBody::Text("5".into()),
                },
            ]),
        };

        assert_eq!(list.to_value().unwrap(), Value::List(vec![Value::from(5)]));
    }

    #[test]
    fn string_list_coerces_scalar_children() {
        let item = Item {
            name: "s".into(),
            type_name: "string-list".into(),
            body: ItemBody::Children(vec![
                Item::from_value("", &Value::from(3)),
                Item::from_value("", &Value::from("x")),
                Item::from_value("", &Value::from(vec![Value::from(1)])),
            ]),
        };

        assert_eq!(
            item.to_value().unwrap(),
            Value::StringList(vec!["3".into(), "x".into()])
        );
    }

    #[test]
    fn lenient_map_read_skips_bad_entries() {
        for type_name in ["ordered-map", "hash-map"] {
            let map = Item {
                name: "m".into(),
                type_name: type_name.into(),
                body: ItemBody::Children(vec![
                    Item {
                        name: "bad".into(),
                        type_name: "int".into(),
                        body: ItemBody::Text("oops".into()),
                    },
                    Item {
                        name: "good".into(),
                        type_name: "int".into(),
                        body: ItemBody::Text("7".into()),
                    },
                ]),
            };

            let value = map.to_value().unwrap();
            let entries: Vec<(String, Value)> = match value {
                Value::OrderedMap(map) => map.into_iter().collect(),
                Value::HashMap(map) => map.into_iter().collect(),
                other => panic!("{type_name} read as {other:?}"),
            };
            assert_eq!(entries, vec![("good".to_string(), Value::from(7))]);
        }
    }

    #[test]
    fn empty_key_is_listed_and_survives_parse() {
        let mut doc = ValueDocument::new();
        doc.set_value(None, "", 5);
        doc.set_value(Some("g"), "", 6);
        doc.set_value(Some("g"), "k", 7);

        assert_eq!(doc.key_names(None), [""]);
        assert_eq!(doc.key_names(Some("g")), ["", "k"]);

        let parsed = ValueDocument::parse(&doc.serialize()).unwrap();
        assert!(parsed.has_key(None, ""));
        assert_eq!(parsed.get_value(None, "", 0), Value::from(5));
        assert_eq!(parsed.key_names(None), [""]);
        assert_eq!(parsed.key_names(Some("g")), ["", "k"]);
        for key in parsed.key_names(Some("g")) {
            assert!(parsed.value(Some("g"), key).is_some());
        }
    }

    #[test]
    fn repeated_keys_are_listed_once() {
        let mut group = Group::new("g");
        for name in ["a", "b", "a", "c", "b"] {
            group.items.push(Item::from_value(name, &Value::from(1)));
        }
        group.rebuild_index();

        assert_eq!(group.key_names(), ["a", "b", "c"]);
    }

    #[test]
    fn remove_and_clear() {
        let mut doc = ValueDocument::new();
        doc.set_value(Some("g"), "a", 1);
        doc.set_value(Some("g"), "b", 2);
        doc.set_value(Some("g"), "c", 3);

        assert_eq!(doc.remove_value(Some("g"), "b"), Some(Value::from(2)));
        assert_eq!(doc.remove_value(Some("g"), "b"), None);
        assert_eq!(doc.key_names(Some("g")), ["a", "c"]);
        assert_eq!(doc.get_value(Some("g"), "c", 0), Value::from(3));

        doc.set_class_id(4);
        doc.clear();
        assert!(doc.group_names().is_empty());
        assert!(!doc.has_key(Some("g"), "a"));
        assert_eq!(doc.class_id(), 4);
    }

    #[test]
    fn routing_ids_default_to_zero() {
        let mut doc = ValueDocument::new();
        assert_eq!((doc.class_id(), doc.function_id()), (0, 0));

        doc.set_class_id(12);
        doc.set_function_id(-3);
        assert_eq!((doc.class_id(), doc.function_id()), (12, -3));
    }
}
