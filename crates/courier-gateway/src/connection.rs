use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use courier_types::api::Request;

use crate::dispatcher::Dispatcher;

/// Accept clients forever, one task per connection.
pub async fn serve(listener: TcpListener, dispatcher: Dispatcher, max_frame_bytes: usize) -> std::io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let dispatcher = dispatcher.clone();
        tokio::spawn(handle_connection(stream, addr, dispatcher, max_frame_bytes));
    }
}

/// Serve one client: newline-delimited JSON requests in, one response line per
/// request out, strictly in order.
///
/// Frames that are not a JSON object are logged and get no response at all.
/// A frame longer than `max_frame_bytes` ends the connection.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    dispatcher: Dispatcher,
    max_frame_bytes: usize,
) {
    let conn_id = Uuid::new_v4();
    info!("New connection from {} ({})", addr, conn_id);

    let framed = Framed::new(stream, LinesCodec::new_with_max_length(max_frame_bytes));
    let (mut sender, mut receiver) = framed.split();

    while let Some(frame) = receiver.next().await {
        let line = match frame {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!("{} sent a frame over {} bytes, closing", conn_id, max_frame_bytes);
                break;
            }
            Err(LinesCodecError::Io(e)) => {
                debug!("{} read error: {}", conn_id, e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let req = match serde_json::from_str::<Value>(&line) {
            Ok(value @ Value::Object(_)) => serde_json::from_value::<Request>(value).unwrap_or_default(),
            Ok(_) => {
                warn!("{} request frame is not a JSON object, ignoring", conn_id);
                continue;
            }
            Err(e) => {
                warn!("{} bad request frame ({} bytes): {}", conn_id, line.len(), e);
                continue;
            }
        };

        let resp = dispatcher.dispatch(req).await;
        let text = match serde_json::to_string(&resp) {
            Ok(text) => text,
            Err(e) => {
                error!("{} failed to encode response: {}", conn_id, e);
                break;
            }
        };

        if sender.send(text).await.is_err() {
            debug!("{} went away before the response was sent", conn_id);
            break;
        }
    }

    info!("Disconnected: {} ({})", addr, conn_id);
}
