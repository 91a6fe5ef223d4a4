//! Decoded event output.
//!
//! One subscriber per decode topic feeds a single channel, so events come
//! out in publication order. A printer task writes each event as one JSON
//! line.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use paylens_core::event::{DecodedEvent, TOPIC_HOST_RECORD, TOPIC_RECEIPT, TOPIC_TRANSACTION};
use paylens_core::pipeline::EventBus;

/// Topics printed by the daemon.
pub const TOPICS: [&str; 3] = [TOPIC_TRANSACTION, TOPIC_HOST_RECORD, TOPIC_RECEIPT];

/// Subscribe one channel to every decode topic.
pub fn subscribe_all(bus: &dyn EventBus) -> mpsc::UnboundedReceiver<DecodedEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for topic in TOPICS {
        let tx = tx.clone();
        bus.subscribe(
            topic,
            Arc::new(move |event: &DecodedEvent| {
                let _ = tx.send(event.clone());
            }),
        );
    }
    rx
}

/// Spawn the printer task.
///
/// The task runs until `cancel` fires, then writes whatever is still queued,
/// flushes and returns the number of events written.
pub fn spawn_printer<W>(
    rx: mpsc::UnboundedReceiver<DecodedEvent>,
    writer: W,
    cancel: CancellationToken,
) -> JoinHandle<Result<u64>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(print_events(rx, writer, cancel))
}

async fn print_events<W>(
    mut rx: mpsc::UnboundedReceiver<DecodedEvent>,
    mut writer: W,
    cancel: CancellationToken,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(event) => {
                    write_event(&mut writer, &event).await?;
                    written += 1;
                }
                None => break,
            },
            _ = cancel.cancelled() => {
                while let Ok(event) = rx.try_recv() {
                    write_event(&mut writer, &event).await?;
                    written += 1;
                }
                break;
            }
        }
    }

    writer.flush().await.context("failed to flush event output")?;
    tracing::debug!(written, "event printer stopped");
    Ok(written)
}

async fn write_event<W>(writer: &mut W, event: &DecodedEvent) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(event).context("failed to serialize decoded event")?;
    line.push(b'\n');
    writer
        .write_all(&line)
        .await
        .context("failed to write decoded event")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use paylens_core::event::DecodedPayload;
    use paylens_core::types::{Receipt, TransactionMessage};
    use paylens_log_pipeline::InMemoryBus;

    fn transaction() -> DecodedEvent {
        DecodedEvent::new(DecodedPayload::Transaction(TransactionMessage::new("0200")))
    }

    #[tokio::test]
    async fn prints_every_topic_in_publication_order() {
        let bus = InMemoryBus::new();
        let rx = subscribe_all(&bus);
        for topic in TOPICS {
            assert_eq!(bus.subscriber_count(topic), 1);
        }

        let receipt = DecodedEvent::new(DecodedPayload::Receipt(Receipt {
            name: "000001M".to_owned(),
            sections: vec![],
        }));
        bus.publish(TOPIC_TRANSACTION, &transaction());
        bus.publish(TOPIC_RECEIPT, &receipt);
        bus.publish("other.topic", &transaction());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let written = print_events(rx, Vec::new(), cancel.clone()).await.unwrap();
        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn writes_one_json_object_per_line() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = transaction();
        tx.send(sent.clone()).unwrap();
        tx.send(transaction()).unwrap();
        drop(tx);

        let mut out = Vec::new();
        let written = print_events(rx, &mut out, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: DecodedEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.id, sent.id);
        assert_eq!(first.payload, sent.payload);
    }

    #[tokio::test]
    async fn cancel_drains_queued_events() {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        let printer = spawn_printer(rx, client, cancel.clone());

        for _ in 0..3 {
            tx.send(transaction()).unwrap();
        }
        cancel.cancel();

        assert_eq!(printer.await.unwrap().unwrap(), 3);
        let mut text = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut server, &mut text)
            .await
            .unwrap();
        assert_eq!(text.lines().count(), 3);
        drop(tx);
    }
}
