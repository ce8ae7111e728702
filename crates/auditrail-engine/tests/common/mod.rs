use auditrail_core::{AttributeSource, Snapshot, Tracked};
use serde_json::{json, Value};

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct LineItem {
    pub sku: String,
    pub qty: i64,
}

impl AttributeSource for LineItem {
    fn read_attribute(&self, name: &str) -> Option<Value> {
        match name {
            "sku" => Some(json!(self.sku)),
            "qty" => Some(json!(self.qty)),
            _ => None,
        }
    }
}

/// Order entity as a record store would hand it to the auditor
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Order {
    pub id: i64,
    pub attrs: Snapshot,
    pub line_items: Vec<LineItem>,
}

#[allow(dead_code)]
impl Order {
    pub fn new(id: i64, status: &str) -> Self {
        let mut attrs = Snapshot::new();
        attrs.insert("id", id);
        attrs.insert("status", status);
        attrs.insert("note", "");
        Self {
            id,
            attrs,
            line_items: Vec::new(),
        }
    }

    pub fn with_line(mut self, sku: &str, qty: i64) -> Self {
        self.add_line(sku, qty);
        self
    }

    pub fn add_line(&mut self, sku: &str, qty: i64) {
        self.line_items.push(LineItem {
            sku: sku.to_string(),
            qty,
        });
    }

    /// Assign an attribute, returning what a save would report as changed
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Snapshot {
        let new = value.into();
        let old = self.attrs.get(name).cloned().unwrap_or(Value::Null);
        let mut changes = Snapshot::new();
        if old != new {
            changes.insert(name, json!([old, new.clone()]));
            self.attrs.insert(name, new);
        }
        changes
    }
}

impl AttributeSource for Order {
    fn read_attribute(&self, name: &str) -> Option<Value> {
        self.attrs.get(name).cloned()
    }
}

impl Tracked for Order {
    fn item_type(&self) -> &str {
        "Order"
    }

    fn item_id(&self) -> String {
        self.id.to_string()
    }

    fn attributes(&self) -> Snapshot {
        self.attrs.clone()
    }

    fn collection(&self, name: &str) -> Option<Vec<&dyn AttributeSource>> {
        (name == "line_items").then(|| {
            self.line_items
                .iter()
                .map(|l| l as &dyn AttributeSource)
                .collect()
        })
    }
}

/// A type nobody registers
#[allow(dead_code)]
pub struct Note;

impl AttributeSource for Note {
    fn read_attribute(&self, _name: &str) -> Option<Value> {
        None
    }
}

impl Tracked for Note {
    fn item_type(&self) -> &str {
        "Note"
    }

    fn item_id(&self) -> String {
        "1".to_string()
    }

    fn attributes(&self) -> Snapshot {
        Snapshot::new()
    }
}
