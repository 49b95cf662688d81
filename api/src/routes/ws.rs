//! WebSocket Routes
//!
//! 호출자 잔액 변경과 리더보드 변경 알림을 밀어준다.
//!
//! # Endpoints
//! - `GET /ws` - WebSocket 연결 (`x-user-id` 필요)

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::AuthUser;
use crate::services::{
    parse_client_message, serialize_message, ClientMessage, WsError, WsMessage,
};
use crate::AppState;

/// WebSocket 업그레이드 핸들러
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: AuthUser,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

/// WebSocket 연결 처리
async fn handle_socket(socket: WebSocket, state: AppState, user: AuthUser) {
    let (mut sender, mut receiver) = socket.split();
    let hub = state.hub.clone();

    let mut user_rx = hub.subscribe_user(&user.id).await;
    let mut global_rx = hub.subscribe_global();

    // 클라이언트 → 서버: Ping에만 응답
    let (reply_tx, mut reply_rx) = tokio::sync::mpsc::channel::<WsMessage>(16);
    let account_id = user.id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let reply = match parse_client_message(&text) {
                        Ok(ClientMessage::Ping) => WsMessage::Pong,
                        Err(e) => {
                            tracing::debug!(account_id, "Unparseable ws message: {}", e);
                            WsMessage::Error(WsError {
                                code: 400,
                                message: "unsupported message".to_string(),
                            })
                        }
                    };
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // 서버 → 클라이언트
    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                msg = user_rx.recv() => msg,
                msg = global_rx.recv() => msg,
                Some(reply) = reply_rx.recv() => Ok(reply),
            };

            let msg = match msg {
                Ok(msg) => msg,
                // 느린 클라이언트: 놓친 메시지는 건너뛴다 (다음 갱신이 최신 잔액을 담는다)
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "WebSocket client lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let Ok(json) = serialize_message(&msg) else {
                continue;
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    tracing::info!(account_id = %user.id, "WebSocket connected");

    // 연결이 종료될 때까지 대기
    // 남은 쪽은 중단하고 구독이 실제로 drop 될 때까지 기다린다
    tokio::select! {
        _ = &mut recv_task => {
            send_task.abort();
            let _ = send_task.await;
        }
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        }
    }

    hub.release_user(&user.id).await;
    tracing::info!(account_id = %user.id, "WebSocket disconnected");
}
