//! Query translation from the docgrid AST to MongoDB query syntax.
//!
//! Field paths are rendered with MongoDB's dotted notation, which is safe because every
//! [`FieldPath`] segment is validated to contain no `.` and to not start with `$`.

use bson::{Bson, Document, doc};

use docgrid_core::{
    error::DocumentStoreError,
    path::FieldPath,
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Translates docgrid query expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// The filter document for an optional expression. `None` matches everything.
    pub fn filter(expr: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match expr {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }

    /// The sort document for a list of sort keys, or `None` when there are none.
    pub fn sort(sort: &[Sort]) -> Option<Document> {
        if sort.is_empty() {
            return None;
        }

        Some(
            sort.iter()
                .map(|key| {
                    let direction = match key.direction {
                        SortDirection::Asc => 1,
                        SortDirection::Desc => -1,
                    };

                    (key.field.to_dotted(), Bson::Int32(direction))
                })
                .collect(),
        )
    }
}

fn text_operand(op: FieldOp, value: &Bson) -> Result<String, DocumentStoreError> {
    match value {
        Bson::String(s) => Ok(s.clone()),
        other => Err(DocumentStoreError::Backend(format!("{op:?} operator requires a string value, got {other}"))),
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! { "$expr": false });
        }

        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_field(&mut self, field: &FieldPath, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field.to_dotted(): match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => doc! {
                    "$regex": regex::escape(&text_operand(op, value)?),
                    "$options": "i",
                },
                FieldOp::Regex => doc! {
                    "$regex": text_operand(op, value)?,
                    "$options": "i",
                },
                FieldOp::AnyOf => match value {
                    Bson::Array(values) => doc! { "$in": values },
                    single => doc! { "$in": [single] },
                },
            }
        })
    }
}
