//! Server network layer: HTTP routes and WebSocket connection handling

use crate::engine::Match;
use crate::error::ArenaError;
use crate::peer::{self, CloseCode, CloseFrame, Outbound, PeerReceiver};
use crate::registry::MatchRegistry;
use axum::extract::ws::{self, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::ClientMessage;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio::net::TcpListener;

/// Body returned by the match creation and lookup routes
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MatchCode {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub code: Option<String>,
}

impl IntoResponse for ArenaError {
    fn into_response(self) -> Response {
        let status = match &self {
            ArenaError::CapacityExceeded(_) => StatusCode::SERVICE_UNAVAILABLE,
            ArenaError::NotFound(_) => StatusCode::NOT_FOUND,
            ArenaError::MatchFull(_) => StatusCode::CONFLICT,
            ArenaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ArenaError::DeliveryFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// HTTP/WebSocket front end for the match registry
pub struct Server {
    listener: TcpListener,
    registry: Arc<MatchRegistry>,
}

impl Server {
    pub async fn new(addr: &str, registry: Arc<MatchRegistry>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", addr);

        Ok(Server { listener, registry })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> std::io::Result<()> {
        axum::serve(self.listener, router(self.registry)).await
    }
}

pub fn router(registry: Arc<MatchRegistry>) -> Router {
    Router::new()
        .route("/game/new", get(new_match))
        .route("/game", get(lookup_match))
        .route("/ws/{code}", get(ws_handler))
        .with_state(registry)
}

async fn new_match(
    State(registry): State<Arc<MatchRegistry>>,
) -> Result<Json<MatchCode>, ArenaError> {
    let game = registry.create().await?;
    Ok(Json(MatchCode {
        code: game.code().to_string(),
    }))
}

async fn lookup_match(
    State(registry): State<Arc<MatchRegistry>>,
    Query(query): Query<LookupQuery>,
) -> Response {
    let Some(code) = query.code.filter(|code| !code.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Game code required").into_response();
    };

    match registry.get(&code).await {
        Ok(game) => Json(MatchCode {
            code: game.code().to_string(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    State(registry): State<Arc<MatchRegistry>>,
) -> Result<Response, ArenaError> {
    let game = registry.get(&code).await?;
    let game = Arc::downgrade(&game);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, registry, game)))
}

/// Runs one player connection from join to departure.
///
/// Only a weak handle to the match is kept, so a match torn down by the
/// registry is never kept alive by a lingering connection.
async fn handle_socket(socket: WebSocket, registry: Arc<MatchRegistry>, game: Weak<Match>) {
    let Some(current) = game.upgrade() else {
        return;
    };
    let code = current.code().to_string();
    let (sink, mut stream) = socket.split();
    let (peer, outbound) = peer::channel();

    let slot = match current.join(peer.clone()).await {
        Ok(slot) => slot,
        Err(e) => {
            info!("Rejecting connection to match {}: {}", code, e);
            peer.close(CloseFrame::new(CloseCode::UnsupportedData, "Game is full"));
            drop(peer);
            write_outbound(sink, outbound).await;
            return;
        }
    };
    drop(peer);
    drop(current);

    tokio::spawn(write_outbound(sink, outbound));

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientMessage::from_json(text.as_str()) {
                Ok(ClientMessage::Move(direction)) => {
                    let Some(current) = game.upgrade() else {
                        break;
                    };
                    current.apply_input(slot, &direction).await;
                }
                Err(e) => warn!("Client sent unexpected message: {}", e),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket read error: {}", e);
                break;
            }
        }
    }

    if let Some(current) = game.upgrade() {
        current.leave(slot).await;
        if current.is_vacant().await {
            registry.remove(&code).await;
        }
    }
}

/// Drains a player's outbound queue into the socket until closed
async fn write_outbound(mut sink: SplitSink<WebSocket, Message>, mut outbound: PeerReceiver) {
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Message(message) => {
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!("WebSocket write error: {}", e);
                    break;
                }
            }
            Outbound::Close(frame) => {
                let close = ws::CloseFrame {
                    code: frame.code.as_u16(),
                    reason: frame.reason.into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(close))).await {
                    warn!("WebSocket close error: {}", e);
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ParseDirectionError;

    #[test]
    fn test_error_status_codes() {
        let cases = vec![
            (ArenaError::CapacityExceeded(10), StatusCode::SERVICE_UNAVAILABLE),
            (ArenaError::NotFound("12345".to_string()), StatusCode::NOT_FOUND),
            (ArenaError::MatchFull("12345".to_string()), StatusCode::CONFLICT),
            (
                ArenaError::InvalidInput(ParseDirectionError("left".to_string())),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_new_match_route() {
        let registry = Arc::new(MatchRegistry::new(1));

        let Json(created) = new_match(State(Arc::clone(&registry))).await.unwrap();
        assert_eq!(created.code.len(), shared::MATCH_CODE_WIDTH);
        assert!(registry.get(&created.code).await.is_ok());

        let full = new_match(State(Arc::clone(&registry))).await;
        assert_eq!(full.err(), Some(ArenaError::CapacityExceeded(1)));
    }

    #[tokio::test]
    async fn test_lookup_route() {
        let registry = Arc::new(MatchRegistry::new(2));
        let game = registry.create().await.unwrap();

        let found = lookup_match(
            State(Arc::clone(&registry)),
            Query(LookupQuery {
                code: Some(game.code().to_string()),
            }),
        )
        .await;
        assert_eq!(found.status(), StatusCode::OK);

        let missing = lookup_match(
            State(Arc::clone(&registry)),
            Query(LookupQuery {
                code: Some("not-a-code".to_string()),
            }),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let empty = lookup_match(
            State(Arc::clone(&registry)),
            Query(LookupQuery { code: None }),
        )
        .await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_match_code_body() {
        let body = serde_json::to_string(&MatchCode {
            code: "00420".to_string(),
        })
        .unwrap();
        assert_eq!(body, r#"{"code":"00420"}"#);
    }
}
