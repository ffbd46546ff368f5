//! Store documents to grid rows.

use bson::{Bson, Document};
use serde_json::Value;

use crate::{
    coerce,
    document::{DocumentId, ID_KEY},
    request::Row,
    schema::{FieldSchema, ROW_ID_KEY},
};

/// Renders documents as rows for one schema.
///
/// A row starts with the document id under [`ROW_ID_KEY`], followed by each schema field
/// that is present in the document, in declaration order, keyed by alias or path.
/// Fields missing from the document are left out of the row. Keys outside the schema are
/// never exposed.
#[derive(Debug, Clone, Copy)]
pub struct Projector<'s> {
    schema: &'s FieldSchema,
}

impl<'s> Projector<'s> {
    pub fn new(schema: &'s FieldSchema) -> Self {
        Self { schema }
    }

    pub fn project(&self, document: &Document) -> Row {
        let mut row = Row::new();

        if let Some(id) = document.get(ID_KEY) {
            row.insert(ROW_ID_KEY.to_string(), render_id(id));
        }

        for field in self.schema.fields() {
            if let Some(value) = field.path().lookup(document) {
                row.insert(field.display_name(), field.render(value));
            }
        }

        row
    }

    pub fn project_all<'d>(&self, documents: impl IntoIterator<Item = &'d Document>) -> Vec<Row> {
        documents
            .into_iter()
            .map(|document| self.project(document))
            .collect()
    }
}

fn render_id(id: &Bson) -> Value {
    match DocumentId::from_bson(id) {
        Some(id) => Value::String(id.to_string()),
        None => match coerce::bson_to_json(id) {
            Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, FieldType};
    use bson::{doc, oid::ObjectId};
    use serde_json::json;

    fn schema() -> FieldSchema {
        FieldSchema::new(vec![
            FieldSpec::new("Title", FieldType::Text).unwrap(),
            FieldSpec::new("PublisherInfo.Date", FieldType::Date).unwrap().with_alias("Published"),
            FieldSpec::new("PublisherInfo.Name", FieldType::Text).unwrap(),
            FieldSpec::new("Pages", FieldType::Number).unwrap(),
            FieldSpec::new("Themes", FieldType::Array).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn projects_in_schema_order_with_row_id_first() {
        let schema = schema();
        let oid = ObjectId::new();
        let document = doc! {
            "Pages": 300_i64,
            "_id": oid,
            "Secret": "hidden",
            "Title": "Dune",
            "PublisherInfo": {
                "Name": "Chilton",
                "Date": bson::DateTime::from_millis(-139_449_600_000),
            },
            "Themes": ["Ecology", "Politics"],
        };

        let row = Projector::new(&schema).project(&document);

        assert_eq!(
            row.keys().collect::<Vec<_>>(),
            [ROW_ID_KEY, "Title", "Published", "PublisherInfo.Name", "Pages", "Themes"]
        );
        assert_eq!(row[ROW_ID_KEY], json!(oid.to_hex()));
        assert_eq!(row["Published"], json!("1965-08-01"));
        assert_eq!(row["Pages"], json!(300));
        assert_eq!(row["Themes"], json!(["Ecology", "Politics"]));
        assert!(!row.contains_key("Secret"));
    }

    #[test]
    fn missing_nested_values_are_absent() {
        let schema = schema();
        let document = doc! { "_id": "b1", "Title": "Untitled", "PublisherInfo": "n/a" };

        let row = Projector::new(&schema).project(&document);

        assert_eq!(row[ROW_ID_KEY], json!("b1"));
        assert!(!row.contains_key("Published"));
        assert!(!row.contains_key("Pages"));
    }

    #[test]
    fn odd_ids_are_stringified() {
        let schema = schema();
        let row = Projector::new(&schema).project(&doc! { "_id": 42 });

        assert_eq!(row[ROW_ID_KEY], json!("42"));
    }
}
