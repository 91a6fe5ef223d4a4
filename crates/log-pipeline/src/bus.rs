//! 인메모리 이벤트 버스
//!
//! core의 [`EventBus`] trait 구현입니다. 토픽별 핸들러 목록을 보관하고
//! 발행 시 목록을 복제한 뒤 잠금 밖에서 호출합니다.
//! 핸들러 안에서 다시 구독하거나 발행해도 교착되지 않습니다.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;

use paylens_core::event::DecodedEvent;
use paylens_core::pipeline::{EventBus, EventHandler};

/// 인메모리 이벤트 버스
#[derive(Default)]
pub struct InMemoryBus {
    handlers: RwLock<HashMap<String, Vec<EventHandler>>>,
}

impl InMemoryBus {
    /// 빈 버스를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 토픽 이벤트를 받는 무제한 채널을 구독합니다.
    ///
    /// 수신자가 drop되면 이후 이벤트는 조용히 버려집니다.
    pub fn subscribe_channel(&self, topic: &str) -> mpsc::UnboundedReceiver<DecodedEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(
            topic,
            Arc::new(move |event: &DecodedEvent| {
                let _ = tx.send(event.clone());
            }),
        );
        rx
    }

    /// 토픽의 구독자 수
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map_or(0, Vec::len)
    }
}

impl EventBus for InMemoryBus {
    fn publish(&self, topic: &str, event: &DecodedEvent) -> usize {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned()
            .unwrap_or_default();

        for handler in &handlers {
            handler(event);
        }

        tracing::trace!(
            topic,
            event_id = event.id.as_str(),
            delivered = handlers.len(),
            "published event"
        );
        handlers.len()
    }

    fn subscribe(&self, topic: &str, handler: EventHandler) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_owned())
            .or_default()
            .push(handler);
        tracing::debug!(topic, "subscribed handler");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use paylens_core::event::{DecodedPayload, TOPIC_HOST_RECORD, TOPIC_TRANSACTION};
    use paylens_core::types::TransactionMessage;

    fn event() -> DecodedEvent {
        DecodedEvent::new(DecodedPayload::Transaction(TransactionMessage::new("0200")))
    }

    #[test]
    fn publish_reaches_only_topic_subscribers() {
        let bus = InMemoryBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        bus.subscribe(
            TOPIC_TRANSACTION,
            Arc::new(move |_: &DecodedEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(bus.publish(TOPIC_TRANSACTION, &event()), 1);
        assert_eq!(bus.publish(TOPIC_HOST_RECORD, &event()), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(TOPIC_TRANSACTION), 1);
    }

    #[test]
    fn handler_may_subscribe_reentrantly() {
        let bus = Arc::new(InMemoryBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe(
            "a",
            Arc::new(move |_: &DecodedEvent| {
                inner.subscribe("b", Arc::new(|_: &DecodedEvent| {}));
            }),
        );

        bus.publish("a", &event());
        assert_eq!(bus.subscriber_count("b"), 1);
    }

    #[tokio::test]
    async fn channel_subscriber_receives_clone() {
        let bus = InMemoryBus::new();
        let mut rx = bus.subscribe_channel(TOPIC_TRANSACTION);

        let sent = event();
        bus.publish(TOPIC_TRANSACTION, &sent);

        let got = rx.recv().await.unwrap();
        assert_eq!(got.id, sent.id);
    }

    #[test]
    fn dropped_channel_receiver_is_harmless() {
        let bus = InMemoryBus::new();
        drop(bus.subscribe_channel(TOPIC_TRANSACTION));
        assert_eq!(bus.publish(TOPIC_TRANSACTION, &event()), 1);
    }
}
