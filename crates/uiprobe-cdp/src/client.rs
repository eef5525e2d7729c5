//! DevTools WebSocket client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};

use uiprobe_core::navigation::{load_channel, LoadNotifier, LoadSignal};
use uiprobe_core::{Error, Result};

use crate::protocol::{BrowserVersion, CdpRequest, CdpResponse, PageInfo};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Pending request waiting for its response.
struct PendingRequest {
    tx: oneshot::Sender<Result<Value>>,
}

/// Page events the receive loop reacts to. The load notifier is armed
/// by the navigation sequence before the triggering action runs, so a
/// load can never slip past between trigger and listener.
#[derive(Default)]
struct PageEvents {
    pending_load: Option<LoadNotifier>,
}

/// Client for one browser debugging endpoint.
///
/// Connects over WebSocket and multiplexes commands for every attached
/// page session through a single receive loop.
pub struct CdpClient {
    http_endpoint: String,
    ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
    request_id: Arc<AtomicU64>,
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    events: Arc<Mutex<PageEvents>>,
    _recv_task: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a browser debugging endpoint, e.g.
    /// `http://localhost:9222`.
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let http_endpoint = endpoint.trim_end_matches('/').to_string();

        let version_url = format!("{http_endpoint}/json/version");
        debug!("fetching browser version from {version_url}");
        let version: BrowserVersion = reqwest::get(&version_url)
            .await
            .map_err(|e| Error::Http(format!("browser not available at {endpoint}: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Http(format!("browser not available at {endpoint}: {e}")))?;
        debug!("connected to browser: {}", version.browser);

        let (ws_stream, _) = tokio_tungstenite::connect_async(&version.web_socket_debugger_url)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        let (ws_sink, ws_source) = ws_stream.split();
        let pending: Arc<Mutex<HashMap<u64, PendingRequest>>> = Arc::new(Mutex::new(HashMap::new()));
        let events: Arc<Mutex<PageEvents>> = Arc::new(Mutex::new(PageEvents::default()));

        let recv_task = {
            let pending = pending.clone();
            let events = events.clone();
            tokio::spawn(async move {
                Self::receive_loop(ws_source, pending, events).await;
            })
        };

        Ok(Self {
            http_endpoint,
            ws_tx: Arc::new(tokio::sync::Mutex::new(ws_sink)),
            request_id: Arc::new(AtomicU64::new(1)),
            pending,
            events,
            _recv_task: recv_task,
        })
    }

    async fn receive_loop(
        mut ws_source: WsSource,
        pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
        events: Arc<Mutex<PageEvents>>,
    ) {
        while let Some(msg) = ws_source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    trace!("recv: {text}");
                    match serde_json::from_str::<CdpResponse>(&text) {
                        Ok(resp) => Self::route_message(resp, &pending, &events),
                        Err(e) => warn!("failed to parse protocol message: {e}"),
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("WebSocket closed");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {e}");
                    break;
                }
                _ => {}
            }
        }
    }

    fn route_message(
        resp: CdpResponse,
        pending: &Mutex<HashMap<u64, PendingRequest>>,
        events: &Mutex<PageEvents>,
    ) {
        if let Some(id) = resp.id {
            if let Some(req) = pending.lock().remove(&id) {
                let result = match resp.error {
                    Some(err) => Err(Error::Protocol {
                        code: err.code,
                        message: err.message,
                    }),
                    None => Ok(resp.result.unwrap_or(Value::Null)),
                };
                let _ = req.tx.send(result);
            }
            return;
        }

        match resp.method.as_deref() {
            Some("Page.loadEventFired") => {
                if let Some(notifier) = events.lock().pending_load.take() {
                    notifier.loaded();
                }
            }
            Some("Runtime.exceptionThrown") => {
                let text = resp
                    .params
                    .as_ref()
                    .and_then(|p| p["exceptionDetails"]["text"].as_str())
                    .unwrap_or("uncaught exception")
                    .to_string();
                // A page error during an armed navigation rejects it.
                if let Some(notifier) = events.lock().pending_load.take() {
                    notifier.failed(Error::Page(text));
                } else {
                    warn!("page exception: {text}");
                }
            }
            _ => {}
        }
    }

    /// Arm the one-shot load listener for the next navigation.
    pub fn arm_load(&self) -> LoadSignal {
        let (notifier, signal) = load_channel();
        self.events.lock().pending_load = Some(notifier);
        signal
    }

    /// Drop an armed load listener that will not be consumed.
    pub fn disarm_load(&self) {
        self.events.lock().pending_load.take();
    }

    /// Send a command and wait for its response.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(str::to_string),
        };

        let json = serde_json::to_string(&request)?;
        trace!("send: {json}");

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, PendingRequest { tx });

        {
            let mut ws = self.ws_tx.lock().await;
            ws.send(Message::Text(json.into()))
                .await
                .map_err(|e| Error::WebSocket(e.to_string()))?;
        }

        match tokio::time::timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Backend("session closed".to_string())),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(Error::Timeout(format!("request {method} timed out")))
            }
        }
    }

    /// Create a new page and return its target id.
    pub async fn new_page(&self) -> Result<PageInfo> {
        // The browser requires PUT for /json/new.
        let create_url = format!("{}/json/new", self.http_endpoint);
        let client = reqwest::Client::new();
        let page_info: PageInfo = client
            .put(&create_url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        debug!("created page {} at {}", page_info.id, page_info.url);
        Ok(page_info)
    }

    /// Attach to a target, returning the session id.
    pub async fn attach(&self, target_id: &str) -> Result<String> {
        let result = self
            .call(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true
                })),
                None,
            )
            .await?;
        result["sessionId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Backend("missing sessionId in attach response".to_string()))
    }

    /// Close a page/target.
    pub async fn close_page(&self, target_id: &str) -> Result<()> {
        self.call(
            "Target.closeTarget",
            Some(json!({"targetId": target_id})),
            None,
        )
        .await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self._recv_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_monotonic() {
        let id = AtomicU64::new(1);
        assert_eq!(id.fetch_add(1, Ordering::SeqCst), 1);
        assert_eq!(id.fetch_add(1, Ordering::SeqCst), 2);
        assert_eq!(id.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn load_event_completes_the_armed_signal() {
        let pending = Mutex::new(HashMap::new());
        let events = Mutex::new(PageEvents::default());

        let (notifier, signal) = load_channel();
        events.lock().pending_load = Some(notifier);

        let event: CdpResponse =
            serde_json::from_str(r#"{"method": "Page.loadEventFired", "params": {}}"#).unwrap();
        CdpClient::route_message(event, &pending, &events);

        signal.wait().await.unwrap();
        assert!(events.lock().pending_load.is_none());
    }

    #[tokio::test]
    async fn exception_rejects_the_armed_signal() {
        let pending = Mutex::new(HashMap::new());
        let events = Mutex::new(PageEvents::default());

        let (notifier, signal) = load_channel();
        events.lock().pending_load = Some(notifier);

        let event: CdpResponse = serde_json::from_str(
            r#"{"method": "Runtime.exceptionThrown",
                "params": {"exceptionDetails": {"text": "ReferenceError: boom"}}}"#,
        )
        .unwrap();
        CdpClient::route_message(event, &pending, &events);

        let err = signal.wait().await.unwrap_err();
        assert!(matches!(err, Error::Page(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn responses_resolve_pending_requests() {
        let pending = Mutex::new(HashMap::new());
        let events = Mutex::new(PageEvents::default());

        let (tx, mut rx) = oneshot::channel();
        pending.lock().insert(7, PendingRequest { tx });

        let resp: CdpResponse =
            serde_json::from_str(r#"{"id": 7, "result": {"value": 42}}"#).unwrap();
        CdpClient::route_message(resp, &pending, &events);

        let result = rx.try_recv().unwrap().unwrap();
        assert_eq!(result["value"], 42);
        assert!(pending.lock().is_empty());
    }

    #[test]
    fn protocol_errors_propagate_to_the_caller() {
        let pending = Mutex::new(HashMap::new());
        let events = Mutex::new(PageEvents::default());

        let (tx, mut rx) = oneshot::channel();
        pending.lock().insert(3, PendingRequest { tx });

        let resp: CdpResponse = serde_json::from_str(
            r#"{"id": 3, "error": {"code": -32000, "message": "No node found"}}"#,
        )
        .unwrap();
        CdpClient::route_message(resp, &pending, &events);

        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, Error::Protocol { code: -32000, .. }));
    }
}
