//! Connects to a Socket.IO chat server, prints incoming `chat` events and
//! sends each stdin line as one.
//!
//! ```text
//! RUST_LOG=debug cargo run -p chat-client -- http://localhost:3000 /chat
//! ```

use socketforge::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), SocketForgeError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let uri = args.next().unwrap_or_else(|| "http://localhost:3000".to_owned());
    let mut builder = ClientBuilder::new(uri);
    if let Some(namespace) = args.next() {
        builder = builder.namespace(namespace);
    }
    let client = builder.build_websocket();

    let session = client.session();
    session.on("chat", |event| {
        let text: Vec<String> = event.args.iter().map(|arg| format!("{arg:?}")).collect();
        println!("< {}", text.join(" "));
    });
    session.on_disconnected(|reason| {
        tracing::info!(%reason, "disconnected");
    });
    session.on_error(|message| {
        tracing::warn!(detail = message, "server reported an error");
    });

    client.connect().await?;
    tracing::info!(sid = ?session.sid(), "connected, type to chat");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.is_empty() {
            continue;
        }
        if let Err(e) = session.emit("chat", vec![line.into()]).await {
            tracing::error!(error = %e, "send failed");
            break;
        }
    }

    if session.state() == SessionState::Open {
        client.disconnect().await?;
    }
    Ok(())
}
