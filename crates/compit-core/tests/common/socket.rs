// Minimal Phoenix-style socket for push-mode coordinator tests.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// `(connection number, event)` for every frame the server received.
pub type FrameLog = mpsc::UnboundedReceiver<(usize, String)>;

/// Acks every join. The first connection answers its first heartbeat with
/// `first_update` (a `state_update` payload) and then drops without a
/// close frame; later connections stay up.
pub async fn start(first_update: Value) -> (Url, FrameLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (log, frames) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut conn = 0;
        while let Ok((tcp, _)) = listener.accept().await {
            conn += 1;
            tokio::spawn(serve(conn, tcp, first_update.clone(), log.clone()));
        }
    });

    let url = Url::parse(&format!("ws://{addr}/socket/websocket?vsn=2.0.0")).unwrap();
    (url, frames)
}

async fn serve(
    conn: usize,
    tcp: TcpStream,
    first_update: Value,
    log: mpsc::UnboundedSender<(usize, String)>,
) {
    let Ok(mut ws) = accept_async(tcp).await else {
        return;
    };

    while let Some(Ok(Message::Text(text))) = ws.next().await {
        let frame: Value = serde_json::from_str(text.as_str()).unwrap();
        let event = frame[3].as_str().unwrap().to_owned();
        let _ = log.send((conn, event.clone()));

        match event.as_str() {
            "phx_join" => {
                let reply = json!([
                    frame[0],
                    frame[1],
                    frame[2],
                    "phx_reply",
                    { "status": "ok", "response": {} }
                ]);
                ws.send(Message::text(reply.to_string())).await.unwrap();
            }
            "heartbeat" if conn == 1 => {
                let push = json!([null, null, "devices:42", "state_update", first_update]);
                ws.send(Message::text(push.to_string())).await.unwrap();
                return;
            }
            _ => {}
        }
    }
}
