//! HTTP endpoint Telegram pushes updates to, plus health and cron hooks.
//!
//! `tiny_http` is blocking, so the accept loop runs on its own thread and
//! hands each update to the async router through a runtime handle. Telegram
//! always gets `200 OK` for an update so it never redelivers. A cron
//! broadcast runs as a runtime task that answers its request when done, so
//! the loop keeps accepting updates meanwhile.

use std::io::{Cursor, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use serde_json::{Value, json};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tokio::runtime::Handle;

use crate::bot::types::Update;
use crate::daemon::{BroadcastReport, Poller};
use crate::error::MailError;
use crate::relay::router::InteractionRouter;

const SERVICE_NAME: &str = "mail-relay";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Update,
    Health,
    Cron,
    NotFound,
}

/// Map method and path (query string ignored) to an endpoint.
pub fn route(method: &Method, url: &str) -> Route {
    let path = url.split('?').next().unwrap_or(url);
    let path = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };
    match (method, path) {
        (Method::Post, "/webhook") | (Method::Post, "/") => Route::Update,
        (Method::Get, "/health") | (Method::Get, "/") => Route::Health,
        (Method::Post, "/cron") => Route::Cron,
        _ => Route::NotFound,
    }
}

/// With no secret configured the cron hook is open.
pub fn cron_authorized(secret: Option<&str>, authorization: Option<&str>) -> bool {
    match secret {
        None | Some("") => true,
        Some(secret) => authorization == Some(format!("Bearer {secret}").as_str()),
    }
}

pub struct WebhookServer {
    router: Arc<InteractionRouter>,
    poller: Arc<Poller>,
    cron_secret: Option<String>,
    runtime: Handle,
}

impl WebhookServer {
    pub fn new(
        router: Arc<InteractionRouter>,
        poller: Arc<Poller>,
        cron_secret: Option<String>,
        runtime: Handle,
    ) -> Self {
        Self {
            router,
            poller,
            cron_secret,
            runtime,
        }
    }

    /// Serve until `running` is cleared. Blocking; call from a dedicated
    /// thread, not from inside the async runtime.
    pub fn serve(&self, bind_addr: &str, running: Arc<AtomicBool>) -> Result<()> {
        let server = Server::http(bind_addr)
            .map_err(|e| anyhow!("Failed to bind webhook server on {bind_addr}: {e:?}"))?;
        info!("webhook listening on http://{bind_addr}");

        while running.load(Ordering::SeqCst) {
            let Ok(maybe_request) = server.recv_timeout(Duration::from_millis(500)) else {
                continue;
            };
            let Some(request) = maybe_request else {
                continue;
            };
            self.dispatch(request);
        }

        info!("webhook server stopped");
        Ok(())
    }

    fn dispatch(&self, mut request: Request) {
        let endpoint = route(request.method(), request.url());
        debug!("{} {} -> {endpoint:?}", request.method(), request.url());

        match endpoint {
            Route::Update => {
                self.accept_update(&mut request);
                respond(request, Response::from_string("OK"));
            }
            Route::Health => {
                let body = json!({ "status": "ok", "service": SERVICE_NAME });
                respond(request, json_response(200, &body));
            }
            Route::Cron => {
                let authorization = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.as_str().to_string());
                if cron_authorized(self.cron_secret.as_deref(), authorization.as_deref()) {
                    self.start_cron(request);
                } else {
                    warn!("cron request with bad credentials");
                    respond(request, json_response(401, &json!({ "detail": "Unauthorized" })));
                }
            }
            Route::NotFound => {
                respond(request, json_response(404, &json!({ "detail": "Not Found" })));
            }
        }
    }

    /// Parse and hand off an update. Malformed payloads are logged and
    /// dropped.
    fn accept_update(&self, request: &mut Request) {
        let mut raw = String::new();
        if let Err(e) = request.as_reader().read_to_string(&mut raw) {
            warn!("could not read update body: {e}");
            return;
        }

        let update: Update = match serde_json::from_str(&raw) {
            Ok(update) => update,
            Err(e) => {
                warn!("ignoring malformed update: {e}");
                return;
            }
        };
        let update_id = update.update_id;
        let Some(event) = update.into_event() else {
            debug!("update {update_id} carries nothing to handle");
            return;
        };

        let router = Arc::clone(&self.router);
        self.runtime.spawn(async move {
            let ack = router.handle(event).await;
            debug!("update {update_id}: {ack:?}");
        });
    }

    fn start_cron(&self, request: Request) {
        let poller = Arc::clone(&self.poller);
        self.runtime.spawn(async move {
            let (status, body) = cron_reply(poller.broadcast_recent().await);
            let sent = tokio::task::spawn_blocking(move || {
                respond(request, json_response(status, &body));
            })
            .await;
            if let Err(e) = sent {
                error!("cron response task failed: {e}");
            }
        });
    }
}

/// Status and JSON body for a finished cron broadcast.
pub fn cron_reply(result: Result<BroadcastReport, MailError>) -> (u16, Value) {
    match result {
        Ok(report) if report.users == 0 => (200, json!({ "error": "Not configured" })),
        Ok(report) if report.emails_sent == 0 => (200, json!({ "status": "no new emails" })),
        Ok(report) => (
            200,
            json!({
                "status": "ok",
                "emails_sent": report.emails_sent,
                "users": report.users,
            }),
        ),
        Err(e) => {
            error!("cron broadcast failed: {e}");
            (502, json!({ "error": e.to_string() }))
        }
    }
}

fn json_response(status: u16, body: &Value) -> Response<Cursor<Vec<u8>>> {
    let mut response =
        Response::from_string(body.to_string()).with_status_code(StatusCode(status));
    if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
        response.add_header(header);
    }
    response
}

fn respond(request: Request, response: Response<Cursor<Vec<u8>>>) {
    if let Err(e) = request.respond(response) {
        warn!("failed to send response: {e}");
    }
}
