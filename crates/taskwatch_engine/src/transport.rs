use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use taskwatch_core::{Msg, TransportId};
use taskwatch_logging::{tw_debug, tw_warn};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug)]
pub(crate) enum TransportCommand {
    Send(String),
    Close,
}

/// Starts one websocket transport. Lifecycle events come back on `msg_tx`
/// tagged with `transport`; `TransportClosed` is always the last one.
pub(crate) fn spawn_transport(
    transport: TransportId,
    url: String,
    connect_timeout: Duration,
    msg_tx: mpsc::UnboundedSender<Msg>,
) -> mpsc::UnboundedSender<TransportCommand> {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        run_transport(transport, &url, connect_timeout, cmd_rx, &msg_tx).await;
        let _ = msg_tx.send(Msg::TransportClosed { transport });
    });
    cmd_tx
}

async fn run_transport(
    transport: TransportId,
    url: &str,
    connect_timeout: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<TransportCommand>,
    msg_tx: &mpsc::UnboundedSender<Msg>,
) {
    let report = |error: String| {
        let _ = msg_tx.send(Msg::TransportError { transport, error });
    };

    let stream = match tokio::time::timeout(connect_timeout, connect_async(url)).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(err)) => return report(err.to_string()),
        Err(_) => return report(format!("connect timed out after {connect_timeout:?}")),
    };
    if msg_tx.send(Msg::TransportOpened { transport }).is_err() {
        return;
    }

    let (mut sink, mut stream) = stream.split();
    loop {
        tokio::select! {
            command = cmd_rx.recv() => match command {
                Some(TransportCommand::Send(text)) => {
                    if let Err(err) = sink.send(Message::Text(text.into())).await {
                        report(err.to_string());
                        return;
                    }
                }
                Some(TransportCommand::Close) | None => {
                    let _ = sink.close().await;
                    return;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = msg_tx.send(Msg::FrameReceived {
                        transport,
                        text: text.as_str().to_owned(),
                    });
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        let _ = msg_tx.send(Msg::FrameReceived { transport, text });
                    }
                    Err(_) => tw_debug!("Transport {} dropped non-utf8 binary frame", transport),
                },
                Some(Ok(Message::Close(frame))) => {
                    tw_debug!("Transport {} closed by server: {:?}", transport, frame);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tw_warn!("Transport {} read failed: {}", transport, err);
                    report(err.to_string());
                    return;
                }
                None => return,
            },
        }
    }
}
