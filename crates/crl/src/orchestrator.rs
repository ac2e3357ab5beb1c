//! [`ResilienceOrchestrator`]: the single `send`/`sendCommand`/`sendTelemetry`
//! surface unifying the buffer, compressor, and failover manager (spec.md
//! §4.4).

use crate::config::OrchestratorConfig;
use crate::send::{SendOptions, TransmissionResult};
use crate::state::{ConnectionState, OrchestratorState};
use crl_buffer::{BufferStats, MessageBuffer};
use crl_compression::{CompressionService, CompressionStats};
use crl_core::{CrlError, CrlEvent, CrlResult, EndpointStatus, EndpointType, EventHub, Priority};
use crl_backoff::{FixedInterval, IntervalFunction};
use crl_failover::{EndpointDescriptor, FailoverManager};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// The transport callback registered via [`ResilienceOrchestrator::initialize`]:
/// given an endpoint and already-compressed bytes, attempts delivery
/// (spec.md §6 "Transport callback").
pub type SendFn = Arc<
    dyn Fn(EndpointDescriptor, Vec<u8>) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>>
        + Send
        + Sync,
>;

/// Unifies [`MessageBuffer`], [`CompressionService`], and [`FailoverManager`]
/// behind one `send` contract; owns the connection-state machine and the
/// reconnect loop (spec.md §4.4).
pub struct ResilienceOrchestrator {
    config: OrchestratorConfig,
    buffer: Arc<MessageBuffer>,
    compression: Arc<CompressionService>,
    failover: Arc<FailoverManager>,
    events: EventHub<CrlEvent>,
    state: Arc<OrchestratorState>,
    send_fn: Mutex<Option<SendFn>>,
    default_group: Mutex<Option<String>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
}

impl ResilienceOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        buffer: Arc<MessageBuffer>,
        compression: Arc<CompressionService>,
        failover: Arc<FailoverManager>,
        events: EventHub<CrlEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            buffer,
            compression,
            failover,
            events,
            state: Arc::new(OrchestratorState::new()),
            send_fn: Mutex::new(None),
            default_group: Mutex::new(None),
            reconnect_task: Mutex::new(None),
        })
    }

    pub fn events(&self) -> &EventHub<CrlEvent> {
        &self.events
    }

    pub fn buffer(&self) -> &Arc<MessageBuffer> {
        &self.buffer
    }

    pub fn compression(&self) -> &Arc<CompressionService> {
        &self.compression
    }

    pub fn failover(&self) -> &Arc<FailoverManager> {
        &self.failover
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// `initialize(sendFn)` (spec.md §4.4).
    pub fn initialize<F, Fut>(&self, send_fn: F)
    where
        F: Fn(EndpointDescriptor, Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        *self.send_fn.lock().unwrap() = Some(Arc::new(move |ep, bytes| {
            Box::pin(send_fn(ep, bytes)) as Pin<Box<dyn Future<Output = Result<(), String>> + Send>>
        }));
    }

    /// `registerEndpoint(id, name, url, type?, groupId?)` (spec.md §4.4): a
    /// convenience wrapper around [`FailoverManager::register_endpoint`].
    /// `name` is accepted for parity with the spec's signature but carries
    /// no further meaning beyond the endpoint id.
    pub fn register_endpoint(
        &self,
        id: &str,
        _name: &str,
        url: &str,
        endpoint_type: Option<EndpointType>,
        group_id: Option<&str>,
    ) {
        let group = group_id.unwrap_or("default").to_string();
        {
            let mut default_group = self.default_group.lock().unwrap();
            if default_group.is_none() {
                *default_group = Some(group.clone());
            }
        }
        let descriptor = EndpointDescriptor::new(id, url, endpoint_type.unwrap_or(EndpointType::Primary));
        self.failover.register_endpoint(descriptor, &group);
    }

    /// `onConnected(endpointId?)` (spec.md §4.4): transitions to CONNECTED
    /// (clearing DEGRADED too), cancels any running reconnect loop, and runs
    /// `flushBuffer` once when `flush_on_reconnect` is set.
    pub async fn on_connected(self: &Arc<Self>, endpoint_id: Option<String>) {
        self.state.mark_connected();
        if let Some(task) = self.reconnect_task.lock().unwrap().take() {
            task.abort();
        }
        self.events.emit(&CrlEvent::Connected {
            endpoint_id,
            at: Instant::now(),
        });
        if self.config.flush_on_reconnect {
            let _ = self.flush_buffer().await;
        }
    }

    /// `onDisconnected(endpointId?, err?)` (spec.md §4.4): transitions to
    /// DISCONNECTED and starts the reconnect loop when `auto_reconnect`.
    pub fn on_disconnected(self: &Arc<Self>, endpoint_id: Option<String>) {
        self.state.mark_disconnected();
        self.events.emit(&CrlEvent::Disconnected {
            endpoint_id,
            at: Instant::now(),
        });
        if self.config.auto_reconnect {
            self.spawn_reconnect_loop();
        }
    }

    fn spawn_reconnect_loop(self: &Arc<Self>) {
        let mut slot = self.reconnect_task.lock().unwrap();
        if slot.is_some() {
            return;
        }
        let orchestrator = Arc::clone(self);
        let handle = tokio::spawn(async move {
            orchestrator.state.mark_reconnecting();
            let group = orchestrator.default_group.lock().unwrap().clone();
            let Some(group) = group else { return };
            let grace_deadline = Instant::now() + orchestrator.config.offline_grace_period;
            let interval = FixedInterval::new(orchestrator.config.reconnect_interval);

            loop {
                tokio::time::sleep(interval.next_interval(0)).await;
                let attempt = orchestrator.state.increment_attempts();

                orchestrator.events.emit(&CrlEvent::Reconnecting {
                    attempt,
                    at: Instant::now(),
                });

                let triggered = orchestrator.failover.trigger_failover(&group, "reconnect", None);
                if triggered {
                    orchestrator.on_connected(None).await;
                    return;
                }

                if attempt >= orchestrator.config.max_reconnect_attempts {
                    orchestrator.events.emit(&CrlEvent::MaxReconnectReached {
                        attempts: attempt,
                        at: Instant::now(),
                    });
                    orchestrator.state.mark_offline();
                    orchestrator.events.emit(&CrlEvent::Offline { at: Instant::now() });
                    return;
                }

                if Instant::now() >= grace_deadline && orchestrator.state.get() != ConnectionState::Offline {
                    orchestrator.state.mark_offline();
                    orchestrator.events.emit(&CrlEvent::Offline { at: Instant::now() });
                }
            }
        });
        *slot = Some(handle);
    }

    /// `send(topic, payload, opts)` (spec.md §4.4, control flow per §2).
    pub async fn send(&self, topic: &str, payload: Vec<u8>, opts: SendOptions) -> TransmissionResult {
        self.send_with_defaults(topic, payload, opts).await
    }

    /// `sendCommand(topic, payload, groupId?)`: priority CRITICAL, `maxRetries=5`.
    pub async fn send_command(&self, topic: &str, payload: Vec<u8>, group_id: Option<&str>) -> TransmissionResult {
        let opts = SendOptions {
            priority: Some(Priority::Critical),
            group_id: group_id.map(String::from),
            max_retries: Some(5),
            ..Default::default()
        };
        self.send_with_defaults(topic, payload, opts).await
    }

    /// `sendTelemetry(topic, payload, groupId?)`: priority NORMAL, expires in 60s.
    pub async fn send_telemetry(&self, topic: &str, payload: Vec<u8>, group_id: Option<&str>) -> TransmissionResult {
        let opts = SendOptions {
            priority: Some(Priority::Normal),
            group_id: group_id.map(String::from),
            expires_in: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        self.send_with_defaults(topic, payload, opts).await
    }

    async fn send_with_defaults(&self, topic: &str, payload: Vec<u8>, opts: SendOptions) -> TransmissionResult {
        let send_fn = self.send_fn.lock().unwrap().clone();
        let Some(send_fn) = send_fn else {
            return TransmissionResult::not_initialised();
        };

        let priority = opts.priority.unwrap_or(Priority::Normal);
        let max_retries = opts.max_retries.unwrap_or(3);
        let ttl = opts.expires_in.map(|d| chrono::Duration::milliseconds(d.as_millis() as i64));
        let group = opts
            .group_id
            .clone()
            .or_else(|| self.default_group.lock().unwrap().clone())
            .unwrap_or_else(|| "default".to_string());

        if matches!(
            self.connection_state(),
            ConnectionState::Offline | ConnectionState::Disconnected | ConnectionState::Reconnecting
        ) && self.config.buffer_when_offline
        {
            let id = self
                .buffer
                .add(topic, priority, payload, opts.metadata, max_retries, ttl);
            return TransmissionResult::buffered(id);
        }

        let (bytes, compressed) = self.maybe_compress(&payload);

        let start = Instant::now();
        let outcome = self
            .failover
            .execute_with_failover(&group, |endpoint| {
                let send_fn = send_fn.clone();
                let bytes = bytes.clone();
                async move { send_fn(endpoint, bytes).await }
            })
            .await;

        match outcome {
            Ok(()) => TransmissionResult::sent(
                uuid::Uuid::new_v4().to_string(),
                compressed,
                start.elapsed().as_secs_f64() * 1000.0,
            ),
            Err(CrlError::EndpointsExhausted { .. }) if self.config.buffer_when_offline => {
                let id = self
                    .buffer
                    .add(topic, priority, payload, opts.metadata, max_retries, ttl);
                TransmissionResult::buffered(id)
            }
            Err(err) => TransmissionResult::dropped(err.to_string()),
        }
    }

    fn maybe_compress(&self, payload: &[u8]) -> (Vec<u8>, bool) {
        if !self.config.compress_messages || payload.len() < self.config.compression_threshold {
            return (payload.to_vec(), false);
        }
        match self.compression.compress_adaptive(payload) {
            Ok(result) => {
                let compressed = !matches!(result.algorithm, crl_compression::Algorithm::None);
                (result.data, compressed)
            }
            Err(_) => (payload.to_vec(), false),
        }
    }

    /// `updateNetworkConditions(bandwidthKbps, latencyMs?)` (spec.md §4.4):
    /// forwards to the compressor; may transition CONNECTED→DEGRADED.
    pub fn update_network_conditions(&self, bandwidth_kbps: f64, latency_ms: Option<f64>) {
        self.compression.update_network_conditions(bandwidth_kbps, latency_ms);
        if self.connection_state() == ConnectionState::Connected
            && bandwidth_kbps < self.config.degraded_bandwidth_kbps
        {
            self.state.mark_degraded();
            self.events.emit(&CrlEvent::Degraded {
                bandwidth_kbps,
                at: Instant::now(),
            });
        }
    }

    /// `flushBuffer() → count` (spec.md §4.4): pops messages in priority
    /// order and resends them; stops at the first failure (including
    /// re-buffer) to preserve order. Safe to call at any state: outside
    /// CONNECTED it returns 0 and leaves the buffer untouched (spec.md §8).
    pub async fn flush_buffer(&self) -> usize {
        if self.connection_state() != ConnectionState::Connected {
            return 0;
        }
        let mut flushed = 0;
        while let Some(msg) = self.buffer.peek() {
            let send_fn = self.send_fn.lock().unwrap().clone();
            let Some(send_fn) = send_fn else { break };

            let group = self.default_group.lock().unwrap().clone().unwrap_or_else(|| "default".to_string());
            let (bytes, _) = self.maybe_compress(&msg.payload);

            let outcome = self
                .failover
                .execute_with_failover(&group, |endpoint| {
                    let send_fn = send_fn.clone();
                    let bytes = bytes.clone();
                    async move { send_fn(endpoint, bytes).await }
                })
                .await;

            match outcome {
                Ok(()) => {
                    self.buffer.pop();
                    flushed += 1;
                }
                Err(_) => {
                    // Leave msg at the head: it is still resident (peek
                    // never removed it), so flush stops here to preserve order.
                    break;
                }
            }
        }
        if flushed > 0 {
            self.events.emit(&CrlEvent::BufferFlushed {
                count: flushed,
                at: Instant::now(),
            });
        }
        flushed
    }

    /// `getHealth(groupId?)` (spec.md §4.4): connection state plus per-group
    /// endpoint statuses.
    pub fn get_health(&self, group_id: Option<&str>) -> Vec<(String, EndpointStatus)> {
        let group = group_id
            .map(String::from)
            .or_else(|| self.default_group.lock().unwrap().clone())
            .unwrap_or_else(|| "default".to_string());
        self.failover
            .get_group_endpoints(&group)
            .into_iter()
            .filter_map(|id| self.failover.get_endpoint_status(&id).map(|status| (id, status)))
            .collect()
    }

    pub fn get_buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    pub fn get_compression_stats(&self) -> CompressionStats {
        self.compression.stats()
    }

    pub fn get_endpoints_status(&self, group_id: Option<&str>) -> Vec<(String, EndpointStatus)> {
        self.get_health(group_id)
    }

    /// `triggerFailover(groupId?, targetId?)` (spec.md §4.4).
    pub fn trigger_failover(&self, group_id: Option<&str>, target_id: Option<&str>) -> bool {
        let group = group_id
            .map(String::from)
            .or_else(|| self.default_group.lock().unwrap().clone())
            .unwrap_or_else(|| "default".to_string());
        self.failover.trigger_failover(&group, "manual", target_id)
    }

    /// `persistBuffer()` (spec.md §4.4).
    pub fn persist_buffer(&self) -> CrlResult<std::path::PathBuf> {
        self.buffer.persist_to_disk()
    }

    /// `loadBuffer(filepath)` (spec.md §4.4).
    pub fn load_buffer(&self, path: &std::path::Path) -> CrlResult<usize> {
        self.buffer.load_from_disk(path)
    }

    /// `shutdown()` (spec.md §4.4): stops every background task owned by
    /// the orchestrator and its sub-components.
    pub fn shutdown(&self) {
        if let Some(task) = self.reconnect_task.lock().unwrap().take() {
            task.abort();
        }
        self.buffer.shutdown();
        self.failover.shutdown();
    }
}
