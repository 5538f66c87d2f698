//! Outbound frame pump.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Drains queued frames into the socket until cancelled, then closes it.
pub(crate) async fn write_pump<S>(
    mut sink: S,
    mut frames: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = frames.recv() => frame,
        };
        let Some(frame) = frame else { break };
        if let Err(e) = sink.send(frame).await {
            error!("backend write failed: {e}");
            return;
        }
    }

    debug!("write pump closing socket");
    let _ = sink.send(tungstenite::Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::sink;

    fn capture() -> (
        impl SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
        mpsc::Receiver<tungstenite::Message>,
    ) {
        let (tx, rx) = mpsc::channel::<tungstenite::Message>(16);
        let sink = sink::unfold(tx, |tx, msg: tungstenite::Message| async move {
            let _ = tx.send(msg).await;
            Ok::<_, tungstenite::Error>(tx)
        });
        (Box::pin(sink), rx)
    }

    #[tokio::test]
    async fn forwards_frames_in_order() {
        let (sink, mut out) = capture();
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(write_pump(sink, rx, cancel.clone()));

        tx.send(tungstenite::Message::Text("one".into())).await.unwrap();
        tx.send(tungstenite::Message::Text("two".into())).await.unwrap();

        assert_eq!(out.recv().await, Some(tungstenite::Message::Text("one".into())));
        assert_eq!(out.recv().await, Some(tungstenite::Message::Text("two".into())));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn sends_close_on_cancel() {
        let (sink, mut out) = capture();
        let (_tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(write_pump(sink, rx, cancel.clone()));

        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");

        assert!(matches!(out.recv().await, Some(tungstenite::Message::Close(_))));
    }

    #[tokio::test]
    async fn sends_close_when_queue_dropped() {
        let (sink, mut out) = capture();
        let (tx, rx) = mpsc::channel(16);
        drop(tx);

        write_pump(sink, rx, CancellationToken::new()).await;
        assert!(matches!(out.recv().await, Some(tungstenite::Message::Close(_))));
    }
}
