//! End-to-end failover + flush (spec.md §8 scenario 5): a group with two
//! endpoints {P=primary, S=secondary} in ACTIVE_PASSIVE mode. P fails
//! mid-send, the in-flight message is buffered, and the next `send`
//! succeeds against S. Once the buffer is non-empty a single
//! `flush_buffer` drains it in priority order.

use crl::{OrchestratorConfig, ResilienceOrchestrator, SendOptions};
use crl_buffer::{BufferConfig, MessageBuffer};
use crl_compression::{CompressionConfig, CompressionService};
use crl_core::{CrlEvent, EndpointType, EventHub, FnListener, Priority, ResilienceEvent};
use crl_failover::{FailoverManager, FailoverPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

fn new_orchestrator(events: EventHub<CrlEvent>) -> Arc<ResilienceOrchestrator> {
    let buffer = MessageBuffer::new(BufferConfig::default(), events.clone());
    let compression = Arc::new(CompressionService::new(CompressionConfig::default()));
    let failover = FailoverManager::new(events.clone());
    ResilienceOrchestrator::new(
        OrchestratorConfig::builder().compress_messages(false).build(),
        buffer,
        compression,
        failover,
        events,
    )
}

#[tokio::test]
async fn failover_buffers_failed_send_and_flush_drains_on_reconnect() {
    let events = EventHub::new();
    let seen: Arc<StdMutex<Vec<&'static str>>> = Arc::new(StdMutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    events.subscribe(FnListener::new(move |event: &CrlEvent| {
        seen_clone.lock().unwrap().push(event.event_type());
    }));

    let orchestrator = new_orchestrator(events);
    orchestrator.register_endpoint("primary", "primary", "tcp://primary", Some(EndpointType::Primary), Some("g1"));
    orchestrator.register_endpoint(
        "secondary",
        "secondary",
        "tcp://secondary",
        Some(EndpointType::Secondary),
        Some("g1"),
    );
    orchestrator.failover().set_policy(
        "g1",
        FailoverPolicy::builder()
            .mode(crl_failover::SelectionMode::ActivePassive)
            .max_retries(0)
            .retry_backoff(std::time::Duration::from_millis(1))
            .build(),
    );
    // Only `primary` is HEALTHY at first; `secondary` stays UNKNOWN and
    // therefore unselectable, so `send` is forced through `primary` alone,
    // matching "the currently selected endpoint".
    orchestrator.failover().report_success("primary");

    let primary_calls = Arc::new(AtomicUsize::new(0));
    let secondary_calls = Arc::new(AtomicUsize::new(0));
    let primary_calls_clone = Arc::clone(&primary_calls);
    let secondary_calls_clone = Arc::clone(&secondary_calls);
    orchestrator.initialize(move |endpoint, _bytes| {
        let primary_calls = Arc::clone(&primary_calls_clone);
        let secondary_calls = Arc::clone(&secondary_calls_clone);
        async move {
            if endpoint.id == "primary" {
                primary_calls.fetch_add(1, Ordering::SeqCst);
                Err("connection refused".to_string())
            } else {
                secondary_calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    });

    // Start CONNECTED so `send` actually attempts the network path instead
    // of short-circuiting straight to the buffer.
    orchestrator.on_connected(Some("primary".to_string())).await;

    // Primary fails mid-send with no other healthy candidate: retries are
    // exhausted and the in-flight message is buffered instead of lost.
    let result = orchestrator
        .send("orders.created", b"buffered-message".to_vec(), SendOptions::default())
        .await;
    assert!(result.buffered);
    assert!(!result.success);
    assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.get_buffer_stats().size, 1);

    // Manual failover to secondary: emits `failover` and makes it the
    // active endpoint.
    assert!(orchestrator.trigger_failover(Some("g1"), Some("secondary")));
    {
        let captured = seen.lock().unwrap();
        assert!(captured.contains(&"failover"));
    }
    orchestrator.failover().report_success("secondary");

    // The next send now succeeds against secondary (primary is excluded:
    // still unhealthy).
    let result = orchestrator
        .send("orders.created", b"live-message".to_vec(), SendOptions::default())
        .await;
    assert!(result.success);
    assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);

    // Recovery: `onConnected` runs a single `flushBuffer`, draining the
    // earlier buffered message and emitting `bufferFlushed{count}`.
    orchestrator.on_connected(Some("secondary".to_string())).await;
    assert_eq!(orchestrator.get_buffer_stats().size, 0);
    assert_eq!(secondary_calls.load(Ordering::SeqCst), 2);

    let captured = seen.lock().unwrap();
    assert!(captured.contains(&"buffer_flushed"));
}

#[tokio::test]
async fn on_connected_flushes_buffer_once_when_flush_on_reconnect_is_set() {
    let events = EventHub::new();
    let orchestrator = new_orchestrator(events);
    orchestrator.register_endpoint("primary", "primary", "tcp://primary", Some(EndpointType::Primary), Some("g1"));
    orchestrator.failover().report_success("primary");

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);
    orchestrator.initialize(move |_endpoint, _bytes| {
        let calls = Arc::clone(&calls_clone);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    // Force everything offline so sends land straight in the buffer.
    orchestrator.on_disconnected(None);
    for priority in [Priority::Normal, Priority::Critical, Priority::High] {
        let opts = SendOptions {
            priority: Some(priority),
            ..Default::default()
        };
        let result = orchestrator.send("t", b"x".to_vec(), opts).await;
        assert!(result.buffered);
    }
    assert_eq!(orchestrator.get_buffer_stats().size, 3);

    orchestrator.on_connected(Some("primary".to_string())).await;

    assert_eq!(orchestrator.get_buffer_stats().size, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(orchestrator.connection_state(), crl::ConnectionState::Connected);
}
