use auditrail_core::{AttributeSource, Snapshot, Tracked};
use serde_json::{json, Value};

/// One line of an order, exposed to collection projections
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct LineItem {
    pub sku: String,
    pub qty: i64,
    pub price_cents: i64,
}

impl AttributeSource for LineItem {
    fn read_attribute(&self, name: &str) -> Option<Value> {
        match name {
            "sku" => Some(json!(self.sku)),
            "qty" => Some(json!(self.qty)),
            "price_cents" => Some(json!(self.price_cents)),
            _ => None,
        }
    }
}

/// Test order with plain attributes, one derived accessor and a collection
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
        attrs.insert("total_cents", 0);
        attrs.insert("created_at", "2024-01-01T00:00:00Z");
        attrs.insert("updated_at", "2024-01-01T00:00:00Z");
        Self {
            id,
            attrs,
            line_items: Vec::new(),
        }
    }

    pub fn with_line(mut self, sku: &str, qty: i64, price_cents: i64) -> Self {
        self.line_items.push(LineItem {
            sku: sku.to_string(),
            qty,
            price_cents,
        });
        self
    }

    /// Assign an attribute and return the `{attr: [old, new]}` change set
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

    fn invoke_accessor(&self, name: &str) -> Option<Value> {
        match name {
            "item_count" => Some(json!(self.line_items.len())),
            _ => None,
        }
    }

    fn collection(&self, name: &str) -> Option<Vec<&dyn AttributeSource>> {
        match name {
            "line_items" => Some(
                self.line_items
                    .iter()
                    .map(|l| l as &dyn AttributeSource)
                    .collect(),
            ),
            _ => None,
        }
    }
}
