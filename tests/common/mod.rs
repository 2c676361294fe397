use sqlx::sqlite::SqlitePoolOptions;
use std::io::Read;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration as StdDuration;
use tiny_http::{Header, Response, Server};
use workforce_sync::SqliteActionStore;
use workforce_sync::domain::entities::QueuedActionDraft;
use workforce_sync::domain::value_objects::{
    EntityId, EntityType, HttpMethod, MutationKind, OfflinePayload,
};

#[derive(Debug, Clone)]
pub struct MockHttpResponse {
    pub status: u16,
    pub body: String,
}

impl MockHttpResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    #[allow(dead_code)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Serves `responses` in order, one per request, then shuts down.
pub fn spawn_json_sequence_server(
    responses: Vec<MockHttpResponse>,
) -> (String, Receiver<CapturedRequest>, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("mock server");
    let base_url = format!("http://{}", server.server_addr());
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        for response_spec in responses {
            let mut request = match server.recv_timeout(StdDuration::from_secs(5)) {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(_) => break,
            };

            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let captured = CapturedRequest {
                method: request.method().to_string(),
                path: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|header| {
                        (
                            header.field.as_str().to_string(),
                            header.value.as_str().to_string(),
                        )
                    })
                    .collect(),
                body,
            };
            let _ = tx.send(captured);

            let mut response = Response::from_string(response_spec.body);
            response.add_header(
                Header::from_bytes("Content-Type", "application/json")
                    .expect("content-type header"),
            );
            response = response.with_status_code(response_spec.status);
            let _ = request.respond(response);
        }
    });

    (base_url, rx, handle)
}

#[allow(dead_code)]
pub async fn memory_store() -> SqliteActionStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    SqliteActionStore::from_pool(pool)
        .await
        .expect("migrated store")
}

#[allow(dead_code)]
pub fn shift_draft(base_url: &str, entity_id: &str) -> QueuedActionDraft {
    QueuedActionDraft::new(
        MutationKind::Update,
        EntityType::parse("shift_assignment").expect("entity type"),
        EntityId::parse(entity_id).expect("entity id"),
        HttpMethod::Put,
        format!("{base_url}/assignments/{entity_id}"),
    )
    .with_body(OfflinePayload::from_json_str(r#"{"crew":"B","hours":12}"#).expect("payload"))
    .with_header("Authorization", "Bearer offline-token")
}
