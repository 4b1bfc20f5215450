use crate::cli::Args;
use crate::error::BoxError;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::server::{ is_authorized, provided_api_key, tls };
use crate::shell::Shell;
use crate::store::SessionEvent;

use std::net::SocketAddr;
use std::num::NonZeroU32;

use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::sync::mpsc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use tokio_tungstenite::{ accept_hdr_async, WebSocketStream };
use tokio_tungstenite::tungstenite::handshake::server::{ Request, Response, ErrorResponse };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_rustls::TlsAcceptor;

use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use futures::stream::SplitSink;
use futures::{ SinkExt, StreamExt };
use log::{ info, warn, error };
use uuid::Uuid;

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::MIN.saturating_add(9)));
}

pub async fn start_ws_server(
    addr: &str,
    shell: Shell,
    api_key: Option<String>,
    args: &Args,
) -> Result<(), BoxError> {
    let listener = TcpListener::bind(addr).await?;

    let tls_acceptor = match tls::tls_paths(args)? {
        Some((cert_path, key_path)) => {
            let config = tls::load_tls_config(cert_path, key_path)?;
            info!("WSS server listening on: {}", addr);
            Some(TlsAcceptor::from(config))
        }
        None => {
            info!("WS server listening on: {}", addr);
            None
        }
    };

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let shell = shell.clone();
        let required_api_key = api_key.clone();
        let tls_acceptor = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        info!("TLS handshake successful for {}", peer);
                        process_connection(peer, tls_stream, shell, required_api_key).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as BoxError)
                    }
                }
            } else {
                process_connection(peer, stream, shell, required_api_key).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    shell: Shell,
    required_api_key: Option<String>
) -> Result<(), BoxError>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let header = req.headers().get("X-API-Key").and_then(|v| v.to_str().ok());
        let provided = provided_api_key(header, req.uri().query());

        if !is_authorized(required_api_key.as_deref(), provided.as_deref()) {
            warn!("{}: bad or missing API key", peer);
            let mut resp = ErrorResponse::new(Some("Unauthorized".to_string()));
            *resp.status_mut() = StatusCode::UNAUTHORIZED;
            return Err(resp);
        }
        Ok(response)
    };

    match accept_hdr_async(stream, auth_callback).await {
        Ok(ws) => {
            handle_connection(peer, ws, shell).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as BoxError)
        }
    }
}

impl From<SessionEvent> for ServerMessage {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::TimelineAppended(entry) => ServerMessage::TimelineEntry { entry },
            SessionEvent::ChatAppended(message) => ServerMessage::ChatMessage { message },
            SessionEvent::Notice(message) => ServerMessage::Notice { message },
            SessionEvent::Status(status) =>
                ServerMessage::Status {
                    uploading: status.uploading,
                    replying: status.replying,
                },
        }
    }
}

async fn snapshot(shell: &Shell) -> ServerMessage {
    ServerMessage::Snapshot {
        feed: shell.feed().await,
        chat: shell.chat_history().await,
        status: shell.status(),
        notice: shell.notice().await,
    }
}

async fn send_json<S>(
    tx: &mut SplitSink<WebSocketStream<S>, Message>,
    msg: &ServerMessage
) -> Result<(), BoxError>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let json = serde_json::to_string(msg)?;
    tx.send(Message::Text(json)).await?;
    Ok(())
}

/// Pushes the session snapshot, then streams session events to the client
/// while accepting chat messages from it.
pub async fn handle_connection<S>(peer: SocketAddr, websocket: WebSocketStream<S>, shell: Shell)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let connection_id = Uuid::new_v4();
    info!("New WebSocket connection {} from {}", connection_id, peer);

    let (mut tx, mut rx) = websocket.split();
    let mut events = BroadcastStream::new(shell.subscribe());
    // Refusals from background chat tasks, addressed to this client only.
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerMessage>();

    if let Err(e) = send_json(&mut tx, &snapshot(&shell).await).await {
        error!("Failed to send snapshot to {}: {}", connection_id, e);
        return;
    }

    loop {
        let outgoing = tokio::select! {
            incoming = rx.next() => {
                let message = match incoming {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        error!("Error receiving message from {}: {}", connection_id, e);
                        break;
                    }
                    None => break,
                };

                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        connection_id,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    let error_msg = ServerMessage::Error { message: "Message too large".to_string() };
                    if send_json(&mut tx, &error_msg).await.is_err() {
                        error!("Failed to send size limit error to {}", connection_id);
                    }
                    break;
                }

                match message {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Chat { content }) => {
                            let shell = shell.clone();
                            let reply_tx = reply_tx.clone();
                            tokio::spawn(async move {
                                if let Err(e) = shell.send_message(&content).await {
                                    let _ = reply_tx.send(ServerMessage::Error { message: e.to_string() });
                                }
                            });
                            None
                        }
                        Ok(ClientMessage::DismissNotice) => {
                            shell.dismiss_notice().await;
                            None
                        }
                        Err(e) => {
                            warn!("Invalid message from {}: {}", connection_id, e);
                            Some(ServerMessage::Error { message: "Invalid message format".to_string() })
                        }
                    },
                    Message::Close(_) => {
                        info!("Client {} closed the connection", connection_id);
                        break;
                    }
                    _ => None,
                }
            }
            event = events.next() => {
                match event {
                    Some(Ok(ev)) => Some(ServerMessage::from(ev)),
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        warn!("{} lagged by {} events, resending snapshot", connection_id, skipped);
                        Some(snapshot(&shell).await)
                    }
                    None => break,
                }
            }
            Some(msg) = reply_rx.recv() => Some(msg),
        };

        if let Some(msg) = outgoing {
            if let Err(e) = send_json(&mut tx, &msg).await {
                error!("Error sending to {}: {}", connection_id, e);
                break;
            }
        }
    }

    info!("WebSocket connection {} from {} closed", connection_id, peer);
}
