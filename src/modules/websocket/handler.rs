/// HTTP upgrade endpoint.
///
/// `GET /ws/{conversation_id}?token=<jwt>` authenticates and authorizes the
/// caller before the handshake: the token is carried in the query string
/// (browsers cannot set headers on websocket requests) and membership in the
/// conversation is checked against the database. Only then is the connection
/// upgraded and the session actor started.
///
/// - Inbound:  Client -> websocket -> parse ClientMessage -> session actor
/// - Outbound: ChatServer -> session actor -> mpsc channel -> websocket
use actix::{Actor, Addr};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::Message;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::{CountUserSessions, Disconnect};
use super::message::{ClientMessage, ServerMessage};
use super::server::ChatServer;
use super::session::{MessageSvc, ReadSvc, WebSocketSession};
use crate::api::error;
use crate::modules::conversation::repository::ParticipantRepository;
use crate::modules::conversation::repository_pg::ParticipantPgRepository;
use crate::modules::user::service::UserService;
use crate::utils::Claims;
use crate::ENV;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// At most the first 100 characters of a frame, safe on multibyte content.
fn frame_preview(raw: &str) -> &str {
    match raw.char_indices().nth(100) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

pub async fn websocket_handler(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<Uuid>,
    query: web::Query<WsQuery>,
    server: web::Data<Addr<ChatServer>>,
    message_service: web::Data<MessageSvc>,
    read_service: web::Data<ReadSvc>,
    user_service: web::Data<UserService>,
    participant_repo: web::Data<ParticipantPgRepository>,
) -> Result<HttpResponse, Error> {
    let conversation_id = path.into_inner();
    tracing::debug!("WebSocket upgrade request from {:?}", req.peer_addr());

    let claims = Claims::decode(&query.token, ENV.jwt_secret.as_ref())
        .map_err(|_| error::Error::Unauthorized("Invalid or expired token".into()))?;
    let user_id = claims.sub;

    let is_member = participant_repo
        .is_participant(&conversation_id, &user_id)
        .await
        .map_err(error::Error::from)?;
    if !is_member {
        return Err(
            error::Error::Forbidden("You are not a participant of this conversation".into())
                .into(),
        );
    }

    let (response, mut ws_session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    // Session actor pushes JSON frames through this channel; the task below
    // forwards them onto the websocket.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let session = WebSocketSession::new(
        user_id,
        conversation_id,
        server.get_ref().clone(),
        tx,
        message_service,
        read_service,
    );
    let session_id = session.id;
    let addr = session.start();
    let server = server.get_ref().clone();

    if let Err(e) = user_service.set_online_status(user_id, true).await {
        tracing::warn!("Failed to persist online status for {}: {}", user_id, e);
    }

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                msg = msg_stream.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let raw = text.to_string();

                            match serde_json::from_str::<ClientMessage>(&raw) {
                                Ok(client_msg) => addr.do_send(client_msg),
                                Err(e) => {
                                    // Malformed frames are reported, not fatal.
                                    tracing::warn!(
                                        "Unparseable client frame: {} - raw: {}",
                                        e,
                                        frame_preview(&raw)
                                    );
                                    let err = ServerMessage::Error {
                                        message: "Malformed message".to_string(),
                                    };
                                    if let Ok(json) = serde_json::to_string(&err) {
                                        if ws_session.text(json).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                            }
                        }

                        Some(Ok(Message::Ping(data))) => {
                            if ws_session.pong(&data).await.is_err() {
                                break;
                            }
                        }

                        Some(Ok(Message::Pong(_))) => {}

                        Some(Ok(Message::Close(reason))) => {
                            tracing::info!("WebSocket close frame: {:?}", reason);
                            break;
                        }

                        Some(Ok(Message::Binary(_))) => {
                            tracing::warn!("Binary frames are not supported");
                        }

                        Some(Ok(Message::Continuation(_) | Message::Nop)) => {}

                        Some(Err(e)) => {
                            tracing::error!("WebSocket protocol error: {}", e);
                            break;
                        }

                        None => break,
                    }
                }

                Some(json) = rx.recv() => {
                    if ws_session.text(json).await.is_err() {
                        tracing::error!("Failed to push frame to websocket client");
                        break;
                    }
                }
            }
        }

        let _ = ws_session.close(None).await;

        // The server holds an Addr to the session, so the actor cannot stop
        // on its own once this task drops its handle. Deregister explicitly,
        // then persist the offline flag only when no other device is left.
        server.do_send(Disconnect { session_id });
        let remaining = server.send(CountUserSessions { user_id }).await.unwrap_or(0);
        if remaining == 0 {
            if let Err(e) = user_service.set_online_status(user_id, false).await {
                tracing::warn!("Failed to persist offline status for {}: {}", user_id, e);
            }
        }
        tracing::debug!("WebSocket message loop ended");
    });

    tracing::info!("User {} connected to conversation {} over websocket", user_id, conversation_id);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::frame_preview;

    #[test]
    fn frame_preview_respects_char_boundaries() {
        // 101 bytes but 100 chars; byte 100 falls inside the final 'é'.
        let frame = format!("{}é", "a".repeat(99));
        assert!(!frame.is_char_boundary(100));
        assert_eq!(frame_preview(&frame), frame);
    }

    #[test]
    fn frame_preview_truncates_long_frames() {
        let frame = "é".repeat(200);
        assert_eq!(frame_preview(&frame).chars().count(), 100);

        let frame = "a".repeat(500);
        assert_eq!(frame_preview(&frame).len(), 100);
    }
}
