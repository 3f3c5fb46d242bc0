//! HTTP and WebSocket handlers.

use crate::AppState;
use axum::{
    Json,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use vigil_common::{Alert, InvestigationEvent, InvestigationRequest, InvestigationState, Outcome};
use vigil_coordinator::CancelToken;

/// Source recorded on alerts submitted without one.
const MANUAL_SOURCE: &str = "manual";

/// Buffered events per WebSocket run before the loop waits on the client.
const EVENT_BUFFER: usize = 32;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub routing_table: &'static str,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        routing_table: state.orchestrator.supervisor().table().name(),
    })
}

/// Body of an investigation request, over HTTP or WebSocket.
///
/// `prompt` is the analyst's free-text description and becomes the alert
/// details when no explicit `alert` is given.
#[derive(Debug, Default, Deserialize)]
pub struct InvestigateBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub alert: Option<Alert>,
    #[serde(default)]
    pub indicator: Option<String>,
    #[serde(default)]
    pub logs: Option<String>,
}

impl From<InvestigateBody> for InvestigationRequest {
    fn from(body: InvestigateBody) -> Self {
        let alert = body.alert.unwrap_or_else(|| Alert {
            source: MANUAL_SOURCE.to_string(),
            details: body.prompt.unwrap_or_default(),
        });
        InvestigationRequest {
            alert,
            indicator: body.indicator,
            logs: body.logs,
        }
    }
}

/// A completed investigation: every event in order, then the outcome.
#[derive(Debug, Serialize)]
pub struct InvestigationResponse {
    pub events: Vec<InvestigationEvent>,
    pub outcome: Outcome,
}

/// Run an investigation to completion.
///
/// Failed and halted runs still answer 200; the outcome carries the status.
pub async fn investigate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InvestigateBody>,
) -> Json<InvestigationResponse> {
    let request = InvestigationRequest::from(body);
    info!(
        indicator = ?request.indicator,
        has_logs = request.logs.is_some(),
        "Received investigation request"
    );

    let (events, outcome) = state.orchestrator.investigate(request).await;
    Json(InvestigationResponse { events, outcome })
}

/// Messages a WebSocket client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Investigate(InvestigateBody),
    Cancel,
}

/// Control messages the server sends besides investigation events.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    InvestigationStarted { investigation_id: String },
    Rejected { reason: String },
    /// The run stopped without a terminal event.
    Aborted { reason: String },
}

/// What goes out on the socket for one item from the active run.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Outgoing {
    Event(InvestigationEvent),
    Control(ServerMessage),
}

/// Map the next item from the active run to a message, and report whether
/// the run is over. A closed channel with no terminal event still ends it.
fn relay(event: Option<InvestigationEvent>) -> (Outgoing, bool) {
    match event {
        Some(event) => {
            let done = event.is_terminal();
            (Outgoing::Event(event), done)
        }
        None => {
            warn!("Investigation ended without a terminal event");
            (
                Outgoing::Control(ServerMessage::Aborted {
                    reason: "the investigation stopped unexpectedly".into(),
                }),
                true,
            )
        }
    }
}

/// WebSocket handler for streaming investigations.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// The run currently streaming on a connection.
struct ActiveRun {
    cancel: CancelToken,
    events: mpsc::Receiver<InvestigationEvent>,
}

async fn next_event(active: &mut Option<ActiveRun>) -> Option<InvestigationEvent> {
    match active {
        Some(run) => run.events.recv().await,
        None => std::future::pending().await,
    }
}

/// One investigation at a time per connection. Events are forwarded as they
/// arrive; the terminal event frees the connection for the next request.
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket connection established");
    let mut active: Option<ActiveRun> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    debug!(message = %text.as_str(), "Received WebSocket message");
                    let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(ClientMessage::Investigate(body)) if active.is_none() => {
                            let (run, id) = start_run(&state, body);
                            active = Some(run);
                            ServerMessage::InvestigationStarted { investigation_id: id }
                        }
                        Ok(ClientMessage::Investigate(_)) => ServerMessage::Rejected {
                            reason: "an investigation is already running on this connection".into(),
                        },
                        Ok(ClientMessage::Cancel) => {
                            match &active {
                                Some(run) => {
                                    info!("Client cancelled investigation");
                                    run.cancel.cancel();
                                }
                                None => debug!("Cancel received with nothing running"),
                            }
                            continue;
                        }
                        Err(e) => {
                            warn!(error = %e, "Unreadable WebSocket message");
                            ServerMessage::Rejected {
                                reason: format!("invalid message: {e}"),
                            }
                        }
                    };
                    if !send_json(&mut socket, &reply).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("WebSocket connection closed");
                    break;
                }
                Some(Err(e)) => {
                    error!(error = %e, "WebSocket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
            event = next_event(&mut active) => {
                let (outgoing, done) = relay(event);
                if !send_json(&mut socket, &outgoing).await {
                    break;
                }
                if done {
                    active = None;
                }
            }
        }
    }

    // A run whose client went away stops at its next iteration
    if let Some(run) = active {
        run.cancel.cancel();
    }
}

fn start_run(state: &Arc<AppState>, body: InvestigateBody) -> (ActiveRun, String) {
    let investigation = InvestigationState::new(body.into());
    let id = investigation.id().to_string();
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let cancel = CancelToken::new();

    let orchestrator = state.orchestrator.clone();
    let token = cancel.clone();
    tokio::spawn(async move {
        orchestrator.run(investigation, &tx, &token).await;
    });

    (ActiveRun { cancel, events: rx }, id)
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, message: &T) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "Failed to serialize WebSocket message");
            return false;
        }
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            uptime_seconds: 100,
            routing_table: "fast_track",
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("fast_track"));
    }

    #[test]
    fn test_prompt_becomes_manual_alert() {
        let body: InvestigateBody = serde_json::from_str(
            r#"{"prompt": "Suspicious SSH traffic", "indicator": "1.2.3.4", "logs": "sshd"}"#,
        )
        .unwrap();
        let request = InvestigationRequest::from(body);
        assert_eq!(request.alert.source, "manual");
        assert_eq!(request.alert.details, "Suspicious SSH traffic");
        assert_eq!(request.indicator.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn test_explicit_alert_wins_over_prompt() {
        let body: InvestigateBody = serde_json::from_str(
            r#"{"prompt": "ignored", "alert": {"source": "siem", "details": "rule 4625"}}"#,
        )
        .unwrap();
        let request = InvestigationRequest::from(body);
        assert_eq!(request.alert.source, "siem");
        assert!(request.indicator.is_none());
    }

    #[test]
    fn test_client_messages() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "investigate", "indicator": "1.2.3.4"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Investigate(ref b) if b.indicator.is_some()));

        let msg: ClientMessage = serde_json::from_str(r#"{"type": "cancel"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Cancel));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "shutdown"}"#).is_err());
    }

    #[tokio::test]
    async fn test_run_without_terminal_event_frees_connection() {
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        let mut active = Some(ActiveRun {
            cancel: CancelToken::new(),
            events: rx,
        });

        let (outgoing, done) = relay(next_event(&mut active).await);
        assert!(done);
        let json = serde_json::to_value(&outgoing).unwrap();
        assert_eq!(json["type"], "aborted");
    }

    #[test]
    fn test_terminal_event_ends_run() {
        let state = InvestigationState::new(InvestigationRequest::default());
        let (outgoing, done) = relay(Some(InvestigationEvent::Finished { final_state: state }));
        assert!(done);
        assert_eq!(serde_json::to_value(&outgoing).unwrap()["type"], "finished");
    }

    #[test]
    fn test_started_message_shape() {
        let json = serde_json::to_value(ServerMessage::InvestigationStarted {
            investigation_id: "inv_1".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "investigation_started");
        assert_eq!(json["investigation_id"], "inv_1");
    }
}
