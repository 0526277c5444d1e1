//! Router tests driven in-process with `tower::ServiceExt::oneshot`.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex},
  time::Duration,
};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode},
};
use serde_json::{Value, json};
use sift_core::{
  Result,
  condition::{Condition, Logic},
  registry::{KiwiTree, Registration, TextConditions, TextRegistration},
};
use sift_service::{KiwiTrees, Service, ServiceConfig, ids::kiwi_tree_id};
use sift_store_sqlite::SqliteStore;
use tower::ServiceExt as _;

use crate::{ApiSettings, AppState, private_router, public_router, wire::WireCondition};

// ─── Mocks ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Registry {
  entries: Mutex<HashSet<String>>,
  /// Every call sleeps this long first.
  delay:   Option<Duration>,
}

impl Registry {
  async fn put(&self, entry: String) -> Registration {
    if let Some(d) = self.delay {
      tokio::time::sleep(d).await;
    }
    if self.entries.lock().unwrap().insert(entry) {
      Registration::Created
    } else {
      Registration::Existing
    }
  }
}

impl KiwiTree for Registry {
  async fn create(&self, key: &str, pattern: &str) -> Result<Registration> {
    Ok(self.put(format!("{key}/{pattern}")).await)
  }

  async fn lock_create(&self, _key: &str, _pattern: &str) -> Result<()> { Ok(()) }

  async fn unlock_create(&self, _key: &str, _pattern: &str) -> Result<()> { Ok(()) }

  async fn delete(&self, key: &str, pattern: &str) -> Result<()> {
    self.entries.lock().unwrap().remove(&format!("{key}/{pattern}"));
    Ok(())
  }
}

impl TextConditions for Registry {
  async fn create(&self, key: &str, term: &str, _exact: bool) -> Result<TextRegistration> {
    let id = format!("{key}:{term}");
    let registration = self.put(id.clone()).await;
    Ok(TextRegistration { id, term: term.to_owned(), registration })
  }

  async fn lock_create(&self, _id: &str) -> Result<()> { Ok(()) }

  async fn unlock_create(&self, _id: &str) -> Result<()> { Ok(()) }

  async fn delete(&self, id: &str) -> Result<()> {
    self.entries.lock().unwrap().remove(id);
    Ok(())
  }
}

type TestState = AppState<SqliteStore, Registry, Registry>;

async fn make_state_with(kiwi: Registry, settings: ApiSettings) -> TestState {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  let kiwi = Arc::new(kiwi);
  let service = Service::new(
    Arc::new(store),
    KiwiTrees::new(kiwi.clone(), kiwi),
    Arc::new(Registry::default()),
    ServiceConfig::default(),
  );
  AppState { service, settings: Arc::new(settings) }
}

async fn make_state() -> TestState {
  make_state_with(Registry::default(), ApiSettings::default()).await
}

// ─── Request helpers ─────────────────────────────────────────────────────────

const ALICE: (&str, &str) = ("x-api-key", "alice");
const BOB: (&str, &str) = ("x-api-key", "bob");

async fn send(
  app: Router,
  method: &str,
  uri: &str,
  headers: &[(&str, &str)],
  body: Option<Value>,
) -> axum::response::Response {
  let mut builder = Request::builder().method(method).uri(uri);
  for (k, v) in headers {
    builder = builder.header(*k, *v);
  }
  let req = match body {
    Some(v) => builder
      .header("content-type", "application/json")
      .body(Body::from(v.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  app.oneshot(req).await.unwrap()
}

async fn body_text(resp: axum::response::Response) -> String {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  String::from_utf8(bytes.to_vec()).unwrap()
}

async fn call(
  app: Router,
  method: &str,
  uri: &str,
  headers: &[(&str, &str)],
  body: Option<Value>,
) -> (StatusCode, Value) {
  let resp = send(app, method, uri, headers, body).await;
  let status = resp.status();
  let text = body_text(resp).await;
  let json = if text.is_empty() { Value::Null } else { serde_json::from_str(&text).unwrap() };
  (status, json)
}

fn group_condition() -> Value {
  json!({"gc": {"logic": 0, "group": [
    {"not": false, "kc": {"key": "key0", "pattern": "p0", "partial": true}},
    {"not": true, "kc": {"key": "key1", "pattern": "p1", "partial": false}}
  ]}})
}

async fn create(state: &TestState, who: (&str, &str), description: &str, cond: Value) -> String {
  let (status, body) = call(
    public_router(state.clone()),
    "POST",
    "/v1/interests",
    &[who],
    Some(json!({"md": {"description": description, "enabled": true}, "cond": cond})),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body["id"].as_str().unwrap().to_owned()
}

// ─── Public surface ──────────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_read_round_trips() {
  let state = make_state().await;
  let id = create(&state, ALICE, "d0", group_condition()).await;

  let (status, body) =
    call(public_router(state.clone()), "GET", &format!("/v1/interests/{id}"), &[ALICE], None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["md"]["description"], "d0");
  assert_eq!(body["md"]["enabled"], true);

  let cond: WireCondition = serde_json::from_value(body["cond"].clone()).unwrap();
  let leaves = &cond.gc.as_ref().unwrap().group;
  assert!(leaves.iter().all(|l| !l.kc.as_ref().unwrap().id.is_empty()));

  let expected = Condition::group(Logic::And, vec![
    Condition::kiwi("key0", "p0", true),
    Condition::kiwi("key1", "p1", false).negated(),
  ]);
  let all = [
    sift_core::condition::LeafKind::Kiwi,
    sift_core::condition::LeafKind::KiwiTree,
  ];
  assert!(cond.decode(&all).unwrap().equal(&expected));
}

#[tokio::test]
async fn negated_root_is_invalid_argument() {
  let state = make_state().await;
  let (status, body) = call(
    public_router(state),
    "POST",
    "/v1/interests",
    &[ALICE],
    Some(json!({"md": {"description": "x"}, "cond": {"not": true, "kc": {"key": "k", "pattern": "p"}}})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn missing_auth_is_unauthenticated() {
  let state = make_state().await;
  let (status, body) = call(
    public_router(state),
    "POST",
    "/v1/interests",
    &[],
    Some(json!({"md": {}, "cond": group_condition()})),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["code"], "UNAUTHENTICATED");
  assert_eq!(
    body["message"],
    "missing request metadata, neither \"x-api-key\" nor \"x-endpoint-api-userinfo\" set"
  );
}

#[tokio::test]
async fn number_leaves_are_not_public() {
  let state = make_state().await;
  let cond = json!({"gc": {"logic": 1, "group": [
    {"kc": {"key": "k", "pattern": "p"}},
    {"nc": {"key": "price", "op": 2, "val": 10.0}}
  ]}});
  let (status, body) = call(
    public_router(state),
    "POST",
    "/v1/interests",
    &[ALICE],
    Some(json!({"md": {"description": "x"}, "cond": cond})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["message"], "number conditions are not accepted");
}

#[tokio::test]
async fn malformed_body_is_invalid_argument() {
  let state = make_state().await;
  let (status, body) = call(
    public_router(state),
    "POST",
    "/v1/interests",
    &[ALICE],
    Some(json!({"md": {"description": 5}})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn update_keeps_condition_and_delete_is_idempotent() {
  let state = make_state().await;
  let id = create(&state, ALICE, "before", group_condition()).await;
  let uri = format!("/v1/interests/{id}");

  let (_, before) = call(public_router(state.clone()), "GET", &uri, &[ALICE], None).await;
  let (status, _) = call(
    public_router(state.clone()),
    "PUT",
    &uri,
    &[ALICE],
    Some(json!({"md": {"description": "after", "enabled": false, "rateLimit": 4}})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (_, after) = call(public_router(state.clone()), "GET", &uri, &[ALICE], None).await;
  assert_eq!(after["md"]["description"], "after");
  assert_eq!(after["md"]["rateLimit"], 4);
  assert_eq!(after["cond"], before["cond"]);

  let (status, _) = call(public_router(state.clone()), "DELETE", &uri, &[ALICE], None).await;
  assert_eq!(status, StatusCode::OK);
  let (status, body) = call(public_router(state), "DELETE", &uri, &[ALICE], None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn other_users_cannot_see_private_interests() {
  let state = make_state().await;
  let id = create(&state, ALICE, "mine", group_condition()).await;
  let uri = format!("/v1/interests/{id}");

  let (status, _) = call(public_router(state.clone()), "GET", &uri, &[BOB], None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  // A different group is a different owner even with the same key.
  let (status, _) =
    call(public_router(state), "GET", &uri, &[ALICE, ("x-group-id", "other")], None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_own_pages_through_ids() {
  let state = make_state().await;
  let mut ids = Vec::new();
  for i in 0..3 {
    ids.push(create(&state, ALICE, &format!("jobs {i}"), group_condition()).await);
  }
  create(&state, ALICE, "cooking", group_condition()).await;
  create(&state, BOB, "jobs for bob", group_condition()).await;
  ids.sort();

  let (status, page1) = call(
    public_router(state.clone()),
    "GET",
    "/v1/interests?limit=2&pattern=jobs",
    &[ALICE],
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(page1["ids"], json!([ids[0], ids[1]]));

  let (_, page2) = call(
    public_router(state),
    "GET",
    &format!("/v1/interests?limit=2&pattern=jobs&cursor={}", ids[1]),
    &[ALICE],
    None,
  )
  .await;
  assert_eq!(page2["ids"], json!([ids[2]]));
}

#[tokio::test]
async fn bad_query_is_invalid_argument() {
  let state = make_state().await;
  let (status, body) =
    call(public_router(state), "GET", "/v1/interests?sort=sideways", &[ALICE], None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn slow_registry_hits_the_request_deadline() {
  let kiwi = Registry { delay: Some(Duration::from_millis(200)), ..Default::default() };
  let settings = ApiSettings { request_timeout: Duration::from_millis(20), ..Default::default() };
  let state = make_state_with(kiwi, settings).await;

  let (status, body) = call(
    public_router(state),
    "POST",
    "/v1/interests",
    &[ALICE],
    Some(json!({"md": {}, "cond": {"ktc": {"key": "k", "pattern": "p"}}})),
  )
  .await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert_eq!(body["code"], "UNAVAILABLE");
}

// ─── Private surface ─────────────────────────────────────────────────────────

/// `data:` payloads of every event named `name`.
fn sse_events(text: &str, name: &str) -> Vec<Value> {
  text
    .split("\n\n")
    .filter(|block| block.lines().any(|l| l == format!("event: {name}")))
    .filter_map(|block| block.lines().find_map(|l| l.strip_prefix("data: ")))
    .map(|data| serde_json::from_str(data).unwrap())
    .collect()
}

#[tokio::test]
async fn search_by_condition_streams_matches() {
  let state = make_state().await;
  let shared = json!({"gc": {"logic": 0, "group": [
    {"ktc": {"key": "k", "pattern": "condX"}},
    {"kc": {"key": "k", "pattern": "other"}}
  ]}});
  let mut ids = Vec::new();
  for i in 0..3 {
    ids.push(create(&state, ALICE, &format!("{i}"), shared.clone()).await);
  }
  create(&state, BOB, "unrelated", json!({"ktc": {"key": "k", "pattern": "condY"}})).await;
  ids.sort();

  let resp = send(
    private_router(state),
    "POST",
    "/private/v1/search-by-condition",
    &[],
    Some(json!({"cond": {"kiwi": {"key": "k", "pattern": "condX", "partial": false}}})),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert!(
    resp.headers()["content-type"].to_str().unwrap().starts_with("text/event-stream")
  );

  let text = body_text(resp).await;
  let matches = sse_events(&text, "match");
  assert_eq!(matches.len(), 3, "{text}");
  assert!(sse_events(&text, "error").is_empty());

  let cond_id = kiwi_tree_id(false, "k", "condX");
  let got: Vec<_> = matches.iter().map(|m| m["subId"].as_str().unwrap().to_owned()).collect();
  assert_eq!(got, ids);
  for m in &matches {
    assert_eq!(m["condId"], cond_id.as_str());
    assert_eq!(m["cond"]["gc"]["group"].as_array().unwrap().len(), 2);
  }
}

#[tokio::test]
async fn search_by_condition_rejects_empty_selector() {
  let state = make_state().await;
  let (status, body) = call(
    private_router(state),
    "POST",
    "/private/v1/search-by-condition",
    &[],
    Some(json!({"cond": {}})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn followers_and_stats() {
  let state = make_state().await;
  let id = create(&state, ALICE, "a", group_condition()).await;
  create(&state, BOB, "b", group_condition()).await;

  let uri = format!("/private/v1/interests/{id}/followers");
  let (status, _) =
    call(private_router(state.clone()), "POST", &uri, &[], Some(json!({"delta": 2}))).await;
  assert_eq!(status, StatusCode::OK);
  let (status, _) =
    call(private_router(state.clone()), "POST", &uri, &[], Some(json!({"delta": -3}))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (_, body) =
    call(public_router(state.clone()), "GET", &format!("/v1/interests/{id}"), &[ALICE], None)
      .await;
  assert_eq!(body["md"]["followers"], 2);

  let (status, stats) = call(private_router(state), "GET", "/private/v1/stats", &[], None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(stats, json!({"count": 2, "usersUnique": 2}));
}
