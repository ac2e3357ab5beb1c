//! Endpoint failover for the Connection Resilience Layer (spec.md §4.3).
//!
//! [`FailoverManager`] maintains named [`FailoverGroup`]s of endpoints, runs
//! a periodic health probe and a per-endpoint circuit breaker
//! ([`circuit::EndpointHealth`]), and drives [`execute_with_failover`] retry
//! loops that pick the next candidate per the group's [`SelectionMode`] and
//! back off per its [`FailoverPolicy`].

mod circuit;
mod config;
mod endpoint;
mod group;
mod health;
mod policy;

pub use circuit::CircuitState;
pub use config::{HealthCheckConfig, HealthCheckConfigBuilder, ProbeMethod};
pub use endpoint::{EndpointDescriptor, EndpointRuntime};
pub use group::FailoverGroup;
pub use health::EndpointProbe;
pub use policy::{FailoverPolicy, FailoverPolicyBuilder, SelectionMode};

use crl_core::{CrlError, CrlEvent, CrlResult, EndpointStatus, EventHub};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Maintains failover groups, health probes, and per-endpoint circuits
/// (spec.md §4.3).
pub struct FailoverManager {
    groups: Mutex<HashMap<String, FailoverGroup>>,
    events: EventHub<CrlEvent>,
    probe_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl FailoverManager {
    pub fn new(events: EventHub<CrlEvent>) -> Arc<Self> {
        Arc::new(Self {
            groups: Mutex::new(HashMap::new()),
            events,
            probe_tasks: Mutex::new(Vec::new()),
        })
    }

    /// `registerEndpoint(ep, groupId)` (spec.md §4.3). Creates the group on
    /// first use with a default [`FailoverPolicy`].
    pub fn register_endpoint(&self, endpoint: EndpointDescriptor, group_id: &str) {
        let mut groups = self.groups.lock().unwrap();
        let group = groups
            .entry(group_id.to_string())
            .or_insert_with(|| FailoverGroup::new(group_id, FailoverPolicy::default()));
        group.register(endpoint);
    }

    /// Registers an endpoint and spawns its background health-probe loop if
    /// `health_check.enabled()` and `probe` is given (spec.md §4.3 "starts
    /// health probes if enabled").
    pub fn register_endpoint_with_probe<P>(
        self: &Arc<Self>,
        endpoint: EndpointDescriptor,
        group_id: &str,
        probe: Option<Arc<P>>,
    ) where
        P: EndpointProbe + 'static,
    {
        let health_check = endpoint.health_check.clone();
        let endpoint_id = endpoint.id.clone();
        let group_id = group_id.to_string();
        self.register_endpoint(endpoint, &group_id);

        if let (true, Some(probe)) = (health_check.enabled(), probe) {
            let manager = Arc::clone(self);
            let handle = tokio::spawn(async move {
                let mut interval = tokio::time::interval(health_check.interval());
                loop {
                    interval.tick().await;
                    let descriptor = {
                        let groups = manager.groups.lock().unwrap();
                        groups
                            .get(&group_id)
                            .and_then(|g| g.member(&endpoint_id))
                            .map(|m| m.runtime.descriptor.clone())
                    };
                    let Some(descriptor) = descriptor else { break };

                    let start = Instant::now();
                    let ok = tokio::time::timeout(health_check.timeout(), probe.probe(&descriptor))
                        .await
                        .unwrap_or(false);
                    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

                    if ok {
                        manager.report_success_with_latency(&endpoint_id, Some(latency_ms));
                    } else {
                        manager.report_failure(&endpoint_id);
                    }
                }
            });
            self.probe_tasks.lock().unwrap().push(handle);
        }
    }

    /// `setPolicy(groupId, policy)` (spec.md §4.3).
    pub fn set_policy(&self, group_id: &str, policy: FailoverPolicy) {
        let mut groups = self.groups.lock().unwrap();
        let group = groups
            .entry(group_id.to_string())
            .or_insert_with(|| FailoverGroup::new(group_id, FailoverPolicy::default()));
        group.policy = policy;
    }

    /// `reportSuccess(endpointId)` (spec.md §4.3).
    pub fn report_success(&self, endpoint_id: &str) {
        self.report_success_with_latency(endpoint_id, None);
    }

    fn report_success_with_latency(&self, endpoint_id: &str, latency_ms: Option<f64>) {
        let mut groups = self.groups.lock().unwrap();
        for group in groups.values_mut() {
            if let Some(member) = group.member_mut(endpoint_id) {
                let config = member.runtime.descriptor.health_check.clone();
                let was_open = !matches!(member.health.state(), CircuitState::Closed);
                member.health.record_success(&config, &self.events);
                if let Some(latency_ms) = latency_ms {
                    member.runtime.latency.record(latency_ms);
                    if let Some(ewma) = member.runtime.latency_ewma_ms() {
                        if latency_ms > ewma * 2.0 {
                            member.health.mark_degraded(&self.events);
                        }
                    }
                }
                member.runtime.set_status(member.health.status());
                member.runtime.consecutive_failures = 0;
                member.runtime.total_successes += 1;
                if was_open && matches!(member.health.state(), CircuitState::Closed) {
                    self.events.emit(&CrlEvent::CircuitClosed {
                        endpoint_id: endpoint_id.to_string(),
                        at: Instant::now(),
                    });
                }
                return;
            }
        }
    }

    /// `reportFailure(endpointId, err?)` (spec.md §4.3).
    pub fn report_failure(&self, endpoint_id: &str) {
        let mut groups = self.groups.lock().unwrap();
        for group in groups.values_mut() {
            if let Some(member) = group.member_mut(endpoint_id) {
                let config = member.runtime.descriptor.health_check.clone();
                let was_closed = !matches!(member.health.state(), CircuitState::Open);
                member.health.record_failure(&config, &self.events);
                member.runtime.set_status(member.health.status());
                member.runtime.total_failures += 1;
                if was_closed && matches!(member.health.state(), CircuitState::Open) {
                    self.events.emit(&CrlEvent::CircuitOpened {
                        endpoint_id: endpoint_id.to_string(),
                        at: Instant::now(),
                    });
                }
                return;
            }
        }
    }

    /// `getActiveEndpoint(groupId)` (spec.md §4.3).
    pub fn get_active_endpoint(&self, group_id: &str) -> Option<EndpointDescriptor> {
        let groups = self.groups.lock().unwrap();
        let group = groups.get(group_id)?;
        let id = group.active_id.as_ref()?;
        group.member(id).map(|m| m.runtime.descriptor.clone())
    }

    /// `getEndpointStatus(id)` (spec.md §4.3).
    pub fn get_endpoint_status(&self, endpoint_id: &str) -> Option<EndpointStatus> {
        let groups = self.groups.lock().unwrap();
        groups
            .values()
            .find_map(|group| group.member(endpoint_id))
            .map(|m| m.runtime.status())
    }

    /// `getGroupEndpoints(groupId)` (spec.md §4.3).
    pub fn get_group_endpoints(&self, group_id: &str) -> Vec<String> {
        let groups = self.groups.lock().unwrap();
        groups.get(group_id).map(FailoverGroup::endpoint_ids).unwrap_or_default()
    }

    /// `triggerFailover(groupId, reason, targetId?) → bool` (spec.md §4.3).
    pub fn trigger_failover(&self, group_id: &str, reason: &str, target_id: Option<&str>) -> bool {
        let mut groups = self.groups.lock().unwrap();
        let Some(group) = groups.get_mut(group_id) else { return false };

        let target = match target_id {
            Some(id) => {
                if group.member(id).is_none() {
                    return false;
                }
                id.to_string()
            }
            None => match group.select(&[]) {
                Some(descriptor) => descriptor.id.clone(),
                None => return false,
            },
        };

        group.set_active(target, reason.to_string(), &self.events);
        true
    }

    /// Evaluates failback for every group: if `failback_enabled` and a
    /// higher-priority endpoint has been continuously HEALTHY for at least
    /// `failback_stability`, makes it active and emits `failback` (spec.md
    /// §4.3 "Failback"). Intended to be polled periodically by the caller
    /// (the orchestrator's reconnect/maintenance loop).
    pub fn evaluate_failback(&self, group_id: &str) {
        let mut groups = self.groups.lock().unwrap();
        let Some(group) = groups.get_mut(group_id) else { return };
        if !group.policy.failback_enabled {
            return;
        }
        let Some(candidate) = group.failback_candidate() else { return };
        if candidate.runtime.last_status_change.elapsed() < group.policy.failback_stability {
            return;
        }
        let id = candidate.runtime.descriptor.id.clone();
        let from = group.active_id.clone();
        group.active_id = Some(id.clone());
        self.events.emit(&CrlEvent::Failback {
            group_id: group_id.to_string(),
            to: id.clone(),
            at: Instant::now(),
        });
        let _ = from;
    }

    /// `executeWithFailover(groupId, op)` (spec.md §4.3): selects an
    /// endpoint, awaits `op`, and returns on success. On failure, records
    /// the failure, selects the next candidate excluding those already
    /// tried, backs off per the group's policy, and retries until success
    /// or `max_retries` is exhausted.
    pub async fn execute_with_failover<F, Fut>(&self, group_id: &str, op: F) -> CrlResult<()>
    where
        F: Fn(EndpointDescriptor) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        let max_retries = {
            let groups = self.groups.lock().unwrap();
            groups
                .get(group_id)
                .map(|g| g.policy.max_retries)
                .ok_or_else(|| CrlError::NotFound {
                    kind: "failover group",
                    id: group_id.to_string(),
                })?
        };

        let mut tried = Vec::new();
        for attempt in 0..=max_retries {
            let descriptor = {
                let mut groups = self.groups.lock().unwrap();
                groups.get_mut(group_id).and_then(|group| {
                    let chosen_id = group.select(&tried).map(|d| d.id.clone())?;
                    group.acquire(&chosen_id);
                    group.member(&chosen_id).map(|m| m.runtime.descriptor.clone())
                })
            };
            let Some(descriptor) = descriptor else { break };

            let endpoint_id = descriptor.id.clone();
            self.bump_inflight(group_id, &endpoint_id, 1);
            let outcome = op(descriptor).await;
            self.bump_inflight(group_id, &endpoint_id, -1);

            match outcome {
                Ok(()) => {
                    self.report_success(&endpoint_id);
                    return Ok(());
                }
                Err(_) => {
                    self.report_failure(&endpoint_id);
                    tried.push(endpoint_id);
                    if attempt < max_retries {
                        tokio::time::sleep(self.backoff_for(group_id, attempt)).await;
                    }
                }
            }
        }

        Err(CrlError::EndpointsExhausted {
            group_id: group_id.to_string(),
            attempts: max_retries + 1,
        })
    }

    fn backoff_for(&self, group_id: &str, attempt: u32) -> Duration {
        self.groups
            .lock()
            .unwrap()
            .get(group_id)
            .map(|g| g.policy.backoff_for_attempt(attempt))
            .unwrap_or(Duration::ZERO)
    }

    fn bump_inflight(&self, group_id: &str, endpoint_id: &str, delta: i64) {
        let groups = self.groups.lock().unwrap();
        if let Some(member) = groups.get(group_id).and_then(|g| g.member(endpoint_id)) {
            if delta > 0 {
                member.inflight.fetch_add(delta as u32, Ordering::Relaxed);
            } else {
                member.inflight.fetch_sub((-delta) as u32, Ordering::Relaxed);
            }
        }
    }

    /// Aborts every spawned health-probe task.
    pub fn shutdown(&self) {
        for task in self.probe_tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}
