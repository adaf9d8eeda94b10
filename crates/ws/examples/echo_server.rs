use async_trait::async_trait;
use bytes::Bytes;
use micro_ws::handler::{EventHandler, Session, UpgradeRequest, handler_factory};
use micro_ws::protocol::{OpCode, WsError};
use micro_ws::{Server, WsConfig};
use std::time::Duration;
use tracing::{info, warn};

struct Echo;

#[async_trait]
impl EventHandler for Echo {
    async fn on_text(&self, session: &Session, text: String) {
        if let Err(e) = session.send_text(text).await {
            warn!(session = session.id(), cause = %e, "failed to echo text");
        }
    }

    async fn on_data(&self, session: &Session, data: Bytes) {
        if let Err(e) = session.send_data(data, OpCode::Binary).await {
            warn!(session = session.id(), cause = %e, "failed to echo binary");
        }
    }
}

struct Room {
    name: String,
}

#[async_trait]
impl EventHandler for Room {
    async fn on_connected(&self, session: &Session) {
        info!(session = session.id(), room = %self.name, "joined");
        if let Err(e) = session.send_text(format!("welcome to {}", self.name)).await {
            warn!(cause = %e, "failed to greet");
        }
    }

    async fn on_text(&self, session: &Session, text: String) {
        if text == "bye" {
            let _ = session.close().await;
            return;
        }
        let _ = session.send_text(format!("[{}] {text}", self.name)).await;
    }

    async fn on_closed(&self, session: &Session) {
        info!(session = session.id(), room = %self.name, "left");
    }

    async fn on_error(&self, session: &Session, error: &WsError) {
        warn!(session = session.id(), cause = %error, "connection failed");
    }
}

#[tokio::main]
async fn main() {
    let config = WsConfig::new().max_message_size(1024 * 1024).idle_timeout(Duration::from_secs(300));

    let server = Server::builder()
        .address("127.0.0.1:8080")
        .config(config)
        .register_path("/echo", handler_factory(|_: &UpgradeRequest| Echo))
        .register_path(
            "/rooms/{room}",
            handler_factory(|request: &UpgradeRequest| Room { name: request.param("room").unwrap_or("lobby").to_owned() }),
        )
        .build()
        .unwrap();

    server
        .start_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
}
