//! The DataTables / Editor wire protocol.
//!
//! [`handle_grid`] and [`handle_editor`] take a decoded JSON request body, drive a
//! [`GridStore`], and return a [`WireReply`]: the status code and JSON body a web handler
//! should send. Routing, JSON framing and authentication stay with the web framework.
//!
//! ```ignore
//! let reply = transport::handle_grid(&store, &body).await;
//! HttpResponse::build(reply.status).json(reply.body)
//! ```

use http::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::error;

use docgrid_core::{
    backend::StoreBackend,
    editor::{EditFailure, EditKind, EditOutcome, EditRequest},
    error::{BridgeError, BridgeResult},
    query::SortDirection,
    request::{GridRequest, PageLength, SearchTerm},
    store::GridStore,
};

/// The draw token echoed when a request does not carry a usable one.
pub const DEFAULT_DRAW: u64 = 1;

/// Status and body to send back to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct WireReply {
    pub status: StatusCode,
    pub body: Value,
}

impl WireReply {
    fn ok(body: Value) -> Self {
        Self { status: StatusCode::OK, body }
    }
}

/// The status code an error answers with.
pub fn status_code(error: &BridgeError) -> StatusCode {
    match error {
        BridgeError::Validation(_) | BridgeError::Fields(_) => StatusCode::BAD_REQUEST,
        BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
        BridgeError::StoreTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        BridgeError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        BridgeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The message a client is shown for `error`. Store failures are logged here and replaced
/// by a generic message.
fn public_message(error: &BridgeError) -> String {
    match error {
        BridgeError::Validation(_) | BridgeError::Fields(_) | BridgeError::NotFound(_) => error.to_string(),
        BridgeError::StoreTimeout(_) => {
            error!(%error, "store deadline exceeded");
            "The data store did not respond in time".to_string()
        }
        BridgeError::StoreUnavailable(_) => {
            error!(%error, "store unreachable");
            "The data store is unavailable".to_string()
        }
        BridgeError::Store(_) => {
            error!(%error, "store failure");
            "An internal error occurred".to_string()
        }
    }
}

/// A number DataTables may send either as JSON number or as numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Int(i64),
    Text(String),
}

impl WireNumber {
    fn to_i64(&self, name: &str) -> BridgeResult<i64> {
        match self {
            WireNumber::Int(n) => Ok(*n),
            WireNumber::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| BridgeError::Validation(format!("{name} must be an integer, got {s:?}"))),
        }
    }
}

/// A boolean flag, which form-encoded clients send as `"true"`/`"false"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireFlag {
    Bool(bool),
    Text(String),
}

impl WireFlag {
    fn is_set(&self) -> bool {
        match self {
            WireFlag::Bool(flag) => *flag,
            WireFlag::Text(s) => s.eq_ignore_ascii_case("true"),
        }
    }
}

fn flag(flag: Option<&WireFlag>, default: bool) -> bool {
    flag.map_or(default, WireFlag::is_set)
}

#[derive(Debug, Default, Deserialize)]
struct WireSearch {
    #[serde(default)]
    value: String,
    regex: Option<WireFlag>,
}

impl WireSearch {
    fn term(&self) -> SearchTerm {
        SearchTerm { value: self.value.clone(), regex: flag(self.regex.as_ref(), false) }
    }
}

#[derive(Debug, Default, Deserialize)]
struct WireColumn {
    data: Option<Value>,
    name: Option<String>,
    searchable: Option<WireFlag>,
    search: Option<WireSearch>,
}

impl WireColumn {
    /// The field key the column stands for: `data` when it is a string, else `name`.
    fn key(&self) -> Option<&str> {
        let data = self.data.as_ref().and_then(Value::as_str);

        data.into_iter()
            .chain(self.name.as_deref())
            .map(str::trim)
            .find(|key| !key.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct WireOrder {
    column: Option<WireNumber>,
    name: Option<String>,
    dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireGridRequest {
    draw: Option<WireNumber>,
    start: Option<WireNumber>,
    length: Option<WireNumber>,
    search: Option<WireSearch>,
    order: Vec<WireOrder>,
    columns: Vec<WireColumn>,
}

fn direction(dir: Option<&str>) -> BridgeResult<SortDirection> {
    match dir.map(str::trim) {
        None | Some("") => Ok(SortDirection::Asc),
        Some(dir) if dir.eq_ignore_ascii_case("asc") => Ok(SortDirection::Asc),
        Some(dir) if dir.eq_ignore_ascii_case("desc") => Ok(SortDirection::Desc),
        Some(dir) => Err(BridgeError::Validation(format!("unknown sort direction {dir:?}"))),
    }
}

impl WireGridRequest {
    fn column_key(&self, index: i64) -> BridgeResult<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.columns.get(index))
            .ok_or_else(|| BridgeError::Validation(format!("order references unknown column {index}")))?
            .key()
            .ok_or_else(|| BridgeError::Validation(format!("column {index} has no data or name")))
    }

    fn into_request(self) -> BridgeResult<GridRequest> {
        let mut builder = GridRequest::builder()
            .draw(match &self.draw {
                Some(draw) => u64::try_from(draw.to_i64("draw")?)
                    .map_err(|_| BridgeError::Validation("draw must not be negative".into()))?,
                None => DEFAULT_DRAW,
            });

        if let Some(start) = &self.start {
            let start = usize::try_from(start.to_i64("start")?)
                .map_err(|_| BridgeError::Validation("start must not be negative".into()))?;
            builder = builder.start(start);
        }

        if let Some(length) = &self.length {
            builder = builder.length(PageLength::from_wire(length.to_i64("length")?)?);
        }

        if let Some(search) = &self.search {
            builder = builder.search(search.term());
        }

        for (index, column) in self.columns.iter().enumerate() {
            let term = column.search.as_ref().map(WireSearch::term);
            let has_term = term.as_ref().is_some_and(|term| !term.is_blank());

            let Some(key) = column.key() else {
                if has_term {
                    return Err(BridgeError::Validation(format!("column {index} has no data or name")));
                }
                continue;
            };

            if !flag(column.searchable.as_ref(), true) {
                builder = builder.exclude_from_search(key);
            }

            if let Some(term) = term.filter(|_| has_term) {
                builder = builder.column_search(key, term);
            }
        }

        for order in &self.order {
            let key = match (&order.column, order.name.as_deref().map(str::trim)) {
                (Some(column), _) => self.column_key(column.to_i64("order column")?)?,
                (None, Some(name)) if !name.is_empty() => name,
                _ => return Err(BridgeError::Validation("order entry names no column".into())),
            };

            builder = builder.sort(key, direction(order.dir.as_deref())?);
        }

        Ok(builder.build())
    }
}

/// Decodes a DataTables server-side request body.
///
/// Column keys are only checked against the schema later, and only for columns that
/// are searched or sorted on.
pub fn parse_grid_request(body: &Value) -> BridgeResult<GridRequest> {
    WireGridRequest::deserialize(body)
        .map_err(|e| BridgeError::Validation(format!("malformed grid request: {e}")))?
        .into_request()
}

/// The draw token to echo in an error reply, read leniently.
fn echo_draw(body: &Value) -> u64 {
    match body.get("draw") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .unwrap_or(DEFAULT_DRAW)
}

/// Answers a grid read.
pub async fn handle_grid<B: StoreBackend>(store: &GridStore<B>, body: &Value) -> WireReply {
    let result = match parse_grid_request(body) {
        Ok(request) => store.rows(&request).await,
        Err(e) => Err(e),
    };

    let response = match result {
        Ok(response) => serde_json::to_value(response)
            .map_err(|e| BridgeError::Store(e.into())),
        Err(e) => Err(e),
    };

    match response {
        Ok(body) => WireReply::ok(body),
        Err(e) => WireReply {
            status: status_code(&e),
            body: json!({
                "error": public_message(&e),
                "data": [],
                "draw": echo_draw(body),
                "recordsTotal": 0,
                "recordsFiltered": 0,
            }),
        },
    }
}

#[derive(Debug, Deserialize)]
struct WireEditRequest {
    action: String,
    #[serde(default)]
    data: Map<String, Value>,
}

fn edit_kind(action: &str) -> BridgeResult<EditKind> {
    match action.trim() {
        "create" => Ok(EditKind::Create),
        "edit" => Ok(EditKind::Edit),
        "remove" => Ok(EditKind::Remove),
        other => Err(BridgeError::Validation(format!("unknown editor action {other:?}"))),
    }
}

/// Decodes an Editor request body.
///
/// Row ids come from the keys of `data`. For edits and removes without `data`, the
/// comma-separated `ids` carried outside the body are used instead.
pub fn parse_edit_request(body: &Value, ids: Option<&str>) -> BridgeResult<EditRequest> {
    let wire = WireEditRequest::deserialize(body)
        .map_err(|e| BridgeError::Validation(format!("malformed editor request: {e}")))?;
    let kind = edit_kind(&wire.action)?;
    let mut request = EditRequest::new(kind);

    for (key, values) in wire.data {
        let values = match values {
            Value::Object(values) => values,
            // Removes only need the id.
            _ if kind == EditKind::Remove => Map::new(),
            _ => return Err(BridgeError::Validation(format!("row {key:?} must be an object of field values"))),
        };

        request = request.item(key, values);
    }

    if request.items.is_empty() && kind != EditKind::Create {
        for id in ids.unwrap_or_default().split(',').map(str::trim).filter(|id| !id.is_empty()) {
            request = request.item(id, Map::new());
        }
    }

    if request.items.is_empty() {
        return Err(BridgeError::Validation("no rows submitted".into()));
    }

    Ok(request)
}

fn field_errors(failures: &[EditFailure]) -> Vec<Value> {
    failures
        .iter()
        .filter_map(|failure| failure.error.field_errors())
        .flat_map(|errors| errors.iter())
        .map(|error| json!({ "name": error.field, "status": error.reason.to_string() }))
        .collect()
}

fn outcome_reply(outcome: EditOutcome) -> WireReply {
    if outcome.is_success() {
        return WireReply::ok(json!({ "data": outcome.rows }));
    }

    // With nothing applied, the batch answers with its first failure's status.
    let status = match outcome.applied {
        0 => outcome
            .failures
            .first()
            .map_or(StatusCode::INTERNAL_SERVER_ERROR, |failure| status_code(&failure.error)),
        _ => StatusCode::OK,
    };

    let summary = outcome
        .failures
        .iter()
        .map(|failure| format!("{}: {}", failure.key, public_message(&failure.error)))
        .collect::<Vec<_>>()
        .join("; ");

    let mut body = json!({
        "data": outcome.rows,
        "error": summary,
    });

    let fields = field_errors(&outcome.failures);
    if !fields.is_empty() {
        body["fieldErrors"] = Value::Array(fields);
    }

    WireReply { status, body }
}

/// Answers an Editor request. `ids` is the out-of-band id parameter, if any.
pub async fn handle_editor<B: StoreBackend>(store: &GridStore<B>, body: &Value, ids: Option<&str>) -> WireReply {
    let result = match parse_edit_request(body, ids) {
        Ok(request) => store.edit(request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => outcome_reply(outcome),
        Err(e) => WireReply {
            status: status_code(&e),
            body: json!({ "error": public_message(&e), "data": [] }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_request_reads_columns_and_order() {
        let body = json!({
            "draw": "3",
            "start": 20,
            "length": "-1",
            "search": { "value": "dune", "regex": "false" },
            "columns": [
                { "data": "Title", "searchable": true, "search": { "value": "" } },
                { "data": "Pages", "searchable": "false", "search": { "value": "100..200" } },
                { "data": null, "name": "Rating" },
            ],
            "order": [{ "column": 1, "dir": "desc" }, { "name": "Title", "dir": "ASC" }],
        });

        let request = parse_grid_request(&body).unwrap();

        assert_eq!(request.draw, 3);
        assert_eq!(request.start, 20);
        assert_eq!(request.length, PageLength::All);
        assert_eq!(request.global_search, Some(SearchTerm::literal("dune")));
        assert_eq!(request.global_exclude, vec!["Pages".to_string()]);
        assert_eq!(request.column_searches, vec![("Pages".to_string(), SearchTerm::literal("100..200"))]);
        assert_eq!(
            request.sort,
            vec![("Pages".to_string(), SortDirection::Desc), ("Title".to_string(), SortDirection::Asc)]
        );
    }

    #[test]
    fn grid_request_defaults() {
        let request = parse_grid_request(&json!({})).unwrap();

        assert_eq!(request, GridRequest::default());
        assert_eq!(request.draw, DEFAULT_DRAW);
    }

    #[test]
    fn grid_request_rejections() {
        for body in [
            json!({ "length": 0 }),
            json!({ "start": -5 }),
            json!({ "draw": "abc" }),
            json!({ "order": [{ "column": 4, "dir": "asc" }] }),
            json!({ "columns": [{ "data": "Title" }], "order": [{ "column": 0, "dir": "up" }] }),
            json!({ "columns": "Title" }),
        ] {
            let err = parse_grid_request(&body).unwrap_err();
            assert!(err.is_validation(), "{body} gave {err:?}");
        }
    }

    #[test]
    fn echoed_draw_is_lenient() {
        assert_eq!(echo_draw(&json!({ "draw": 7 })), 7);
        assert_eq!(echo_draw(&json!({ "draw": " 8 " })), 8);
        assert_eq!(echo_draw(&json!({ "draw": "x" })), DEFAULT_DRAW);
        assert_eq!(echo_draw(&json!(null)), DEFAULT_DRAW);
    }

    #[test]
    fn edit_request_ids_come_from_data_or_parameter() {
        let request = parse_edit_request(
            &json!({ "action": "edit", "data": { "row1": { "Title": "A" } } }),
            Some("ignored"),
        )
        .unwrap();
        assert_eq!(request.kind, EditKind::Edit);
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.items[0].key, "row1");

        let request = parse_edit_request(&json!({ "action": "remove" }), Some("a, b,,c")).unwrap();
        let keys = request.items.iter().map(|item| item.key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn edit_request_rejections() {
        assert!(parse_edit_request(&json!({ "action": "upsert", "data": {} }), None).unwrap_err().is_validation());
        assert!(parse_edit_request(&json!({ "action": "create", "data": {} }), Some("x")).unwrap_err().is_validation());
        assert!(parse_edit_request(&json!({ "action": "edit", "data": { "x": 1 } }), None).unwrap_err().is_validation());
        assert!(parse_edit_request(&json!({ "data": {} }), None).unwrap_err().is_validation());
    }

    #[test]
    fn statuses_follow_the_error_kind() {
        assert_eq!(status_code(&BridgeError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_code(&BridgeError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_code(&BridgeError::StoreTimeout("x".into())), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_code(&BridgeError::StoreUnavailable("x".into())), StatusCode::SERVICE_UNAVAILABLE);
    }
}
