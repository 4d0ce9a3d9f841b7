//! `Consumer::listen` / `listen_until` with a topic router.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use broker_rust::bus::{
    Broker, Consumer, EventEmitter, EventHandler, HandlerError, InMemoryBroker, RoutingKey,
    RoutingPattern, TopicRouter,
};
use broker_rust::listener::log_router;
use broker_rust::LogEvent;
use futures_util::StreamExt;
use tokio::sync::{oneshot, Semaphore};

use crate::support::{recv, Forwarding};

#[tokio::test]
async fn routes_every_log_category_to_the_writer() {
    let broker = InMemoryBroker::new();
    let (handler, mut rx) = Forwarding::new();
    let router = log_router(Arc::new(handler));
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let listener = {
        let broker = broker.clone();
        tokio::spawn(async move {
            Consumer::new(&broker)
                .listen_until(&[RoutingPattern::new("LOG.*")], router, async {
                    let _ = stop_rx.await;
                })
                .await
        })
    };

    // Wait until the queue is bound before publishing.
    while broker.bindings("logs_topic").is_empty() {
        tokio::task::yield_now().await;
    }

    let emitter = EventEmitter::new(&broker);
    for key in ["LOG.INFO", "LOG.WARN", "LOG.ERROR"] {
        emitter
            .push(&LogEvent::new("order-service", key), &RoutingKey::new(key))
            .await
            .unwrap();
    }

    let mut keys = Vec::new();
    for _ in 0..3 {
        let (key, event) = recv(&mut rx).await;
        assert_eq!(event.data, key.as_str());
        keys.push(key.as_str().to_string());
    }
    keys.sort();
    assert_eq!(keys, vec!["LOG.ERROR", "LOG.INFO", "LOG.WARN"]);

    stop_tx.send(()).unwrap();
    let stats = listener.await.unwrap().unwrap();
    assert_eq!(stats.received, 3);
    assert_eq!(stats.handled, 3);
    assert_eq!(broker.acked().len(), 3);
    assert_eq!(broker.open_channels(), 0);
}

#[tokio::test]
async fn handler_failure_does_not_stop_the_loop() {
    let broker = InMemoryBroker::new();
    let (handler, mut rx) = Forwarding::failing_on("broken");
    let router = log_router(Arc::new(handler));

    let listener = {
        let broker = broker.clone();
        tokio::spawn(async move {
            Consumer::new(&broker)
                .listen(&[RoutingPattern::new("LOG.*")], router)
                .await
        })
    };
    while broker.bindings("logs_topic").is_empty() {
        tokio::task::yield_now().await;
    }

    let emitter = EventEmitter::new(&broker);
    emitter
        .push(&LogEvent::new("broken", "first"), &RoutingKey::new("LOG.ERROR"))
        .await
        .unwrap();
    emitter
        .push(&LogEvent::new("healthy", "second"), &RoutingKey::new("LOG.INFO"))
        .await
        .unwrap();

    let (_, event) = recv(&mut rx).await;
    assert_eq!(event.name, "healthy");

    // Closing the connection ends the subscription.
    broker.close().await.unwrap();
    let stats = listener.await.unwrap().unwrap();
    assert_eq!(stats.received, 2);
    assert_eq!(stats.handled, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(broker.rejected(), vec![(RoutingKey::new("LOG.ERROR"), false)]);
}

#[tokio::test]
async fn unroutable_events_are_rejected() {
    let broker = InMemoryBroker::new();
    let (handler, _rx) = Forwarding::new();
    // Bound to everything, but only LOG.INFO has a route.
    let router: TopicRouter<LogEvent> = TopicRouter::new().route("LOG.INFO", Arc::new(handler));
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let listener = {
        let broker = broker.clone();
        tokio::spawn(async move {
            Consumer::new(&broker)
                .listen_until(&[RoutingPattern::new("#")], router, async {
                    let _ = stop_rx.await;
                })
                .await
        })
    };
    while broker.bindings("logs_topic").is_empty() {
        tokio::task::yield_now().await;
    }

    EventEmitter::new(&broker)
        .push(&LogEvent::new("mailer", "sent"), &RoutingKey::new("MAIL.SENT"))
        .await
        .unwrap();
    while broker.rejected().is_empty() {
        tokio::task::yield_now().await;
    }

    stop_tx.send(()).unwrap();
    let stats = listener.await.unwrap().unwrap();
    assert_eq!(stats.unroutable, 1);
    assert_eq!(broker.rejected(), vec![(RoutingKey::new("MAIL.SENT"), false)]);
}

#[tokio::test]
async fn empty_bindings_are_a_subscribe_error() {
    let broker = InMemoryBroker::new();
    let (handler, _rx) = Forwarding::new();
    let result = Consumer::new(&broker)
        .listen(&[], log_router(Arc::new(handler)))
        .await;
    assert!(result.is_err());
    assert_eq!(broker.open_channels(), 0);
}

#[tokio::test]
async fn event_stream_ends_when_connection_closes() {
    let broker = InMemoryBroker::new();
    let subscription = Consumer::new(&broker)
        .subscribe(&[RoutingPattern::new("LOG.*")])
        .await
        .unwrap();
    let mut events = subscription.into_events::<LogEvent>();

    EventEmitter::new(&broker)
        .push(&LogEvent::new("test", "hello"), &RoutingKey::new("LOG.INFO"))
        .await
        .unwrap();

    let first = events.next().await.unwrap().unwrap();
    assert_eq!(first.event, LogEvent::new("test", "hello"));

    broker.close().await.unwrap();
    assert!(events.next().await.is_none());
}

/// Holds every event until the gate opens, tracking how many wait at once.
struct Gated {
    gate: Semaphore,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    done: AtomicUsize,
}

impl Gated {
    fn closed() -> Self {
        Self {
            gate: Semaphore::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EventHandler<LogEvent> for Gated {
    async fn handle(&self, _: &RoutingKey, _: LogEvent) -> Result<(), HandlerError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let permit = self.gate.acquire().await;
        drop(permit);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.done.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn wait_until(mut ready: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !ready() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn prefetch_caps_handlers_in_flight() {
    let broker = InMemoryBroker::new();
    let handler = Arc::new(Gated::closed());
    let router = log_router(Arc::clone(&handler) as Arc<dyn EventHandler<LogEvent>>);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let listener = {
        let broker = broker.clone();
        tokio::spawn(async move {
            Consumer::new(&broker)
                .with_prefetch(2)
                .listen_until(&[RoutingPattern::new("LOG.*")], router, async {
                    let _ = stop_rx.await;
                })
                .await
        })
    };
    while broker.bindings("logs_topic").is_empty() {
        tokio::task::yield_now().await;
    }
    assert_eq!(broker.prefetch(&broker.queues()[0]), Some(2));

    let emitter = EventEmitter::new(&broker);
    for i in 0..10 {
        emitter
            .push(&LogEvent::new("svc", format!("entry {i}")), &RoutingKey::new("LOG.INFO"))
            .await
            .unwrap();
    }

    wait_until(|| handler.in_flight.load(Ordering::SeqCst) == 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handler.in_flight.load(Ordering::SeqCst), 2);

    handler.gate.add_permits(10);
    wait_until(|| handler.done.load(Ordering::SeqCst) == 10).await;
    assert_eq!(handler.peak.load(Ordering::SeqCst), 2);

    stop_tx.send(()).unwrap();
    let stats = listener.await.unwrap().unwrap();
    assert_eq!(stats.received, 10);
    assert_eq!(stats.handled, 10);
}
