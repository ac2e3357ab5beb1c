//! A named group of endpoints sharing one [`FailoverPolicy`] (spec.md §4.3
//! "Failover Group").

use crate::circuit::EndpointHealth;
use crate::endpoint::{EndpointDescriptor, EndpointRuntime};
use crate::policy::{FailoverPolicy, SelectionMode};
use crl_core::{CrlEvent, EndpointStatus, EventHub};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Instant;

pub(crate) struct GroupMember {
    pub(crate) runtime: EndpointRuntime,
    pub(crate) health: EndpointHealth,
    pub(crate) inflight: AtomicU32,
}

impl GroupMember {
    fn new(descriptor: EndpointDescriptor) -> Self {
        let id = descriptor.id.clone();
        Self {
            runtime: EndpointRuntime::new(descriptor),
            health: EndpointHealth::new(id),
            inflight: AtomicU32::new(0),
        }
    }

    /// An endpoint is selectable when its status is HEALTHY or DEGRADED
    /// *and* its circuit is CLOSED, or HALF_OPEN with no probe in flight, or
    /// OPEN with its cooldown elapsed (spec.md §4.3: "status ∈ {HEALTHY,
    /// DEGRADED} AND circuit CLOSED OR (HALF_OPEN AND now ≥ nextProbeAt)").
    fn is_selectable(&self) -> bool {
        self.runtime.status().is_selectable()
            && self.health.is_probe_eligible(&self.runtime.descriptor.health_check)
    }

    /// Actually acquires the circuit for a call: performs the OPEN →
    /// HALF_OPEN transition (and marks the one permitted probe in flight)
    /// when the cooldown has elapsed, mirroring [`Self::is_selectable`]'s
    /// read-only check with the state mutation spec.md §4.3 describes.
    fn acquire(&mut self) {
        let config = self.runtime.descriptor.health_check.clone();
        self.health.try_acquire(&config);
    }
}

/// Named set of endpoints, a selection policy, and per-member runtime state
/// (health, circuit, latency, inflight count).
pub struct FailoverGroup {
    pub(crate) group_id: String,
    pub(crate) policy: FailoverPolicy,
    pub(crate) members: Vec<GroupMember>,
    pub(crate) active_id: Option<String>,
    round_robin_cursor: AtomicUsize,
}

impl FailoverGroup {
    pub(crate) fn new(group_id: impl Into<String>, policy: FailoverPolicy) -> Self {
        Self {
            group_id: group_id.into(),
            policy,
            members: Vec::new(),
            active_id: None,
            round_robin_cursor: AtomicUsize::new(0),
        }
    }

    pub(crate) fn register(&mut self, descriptor: EndpointDescriptor) {
        let member = GroupMember::new(descriptor);
        if self.active_id.is_none() {
            self.active_id = Some(member.runtime.descriptor.id.clone());
        }
        self.members.push(member);
        self.members.sort_by_key(|m| m.runtime.descriptor.priority);
    }

    pub(crate) fn member(&self, id: &str) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.runtime.descriptor.id == id)
    }

    pub(crate) fn member_mut(&mut self, id: &str) -> Option<&mut GroupMember> {
        self.members.iter_mut().find(|m| m.runtime.descriptor.id == id)
    }

    /// Commits the selection of `id`: performs the OPEN → HALF_OPEN circuit
    /// transition if its cooldown has elapsed (spec.md §4.3). Called once a
    /// candidate returned by [`Self::select`] is actually about to be used.
    pub(crate) fn acquire(&mut self, id: &str) {
        if let Some(member) = self.member_mut(id) {
            member.acquire();
        }
    }

    pub fn endpoint_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.runtime.descriptor.id.clone()).collect()
    }

    /// Selects the next endpoint to try, per `self.policy.mode` (spec.md
    /// §4.3 "Selection by mode"). `exclude` skips ids already attempted in
    /// the current `execute_with_failover` retry loop.
    pub(crate) fn select(&self, exclude: &[String]) -> Option<&EndpointDescriptor> {
        let candidates: Vec<&GroupMember> = self
            .members
            .iter()
            .filter(|m| m.is_selectable() && !exclude.contains(&m.runtime.descriptor.id))
            .collect();

        if candidates.is_empty() {
            return None;
        }

        let chosen = match self.policy.mode {
            SelectionMode::ActivePassive => candidates
                .iter()
                .min_by_key(|m| m.runtime.descriptor.priority)
                .copied(),
            SelectionMode::ActiveActive => candidates.first().copied(),
            SelectionMode::RoundRobin => {
                let cursor = self.round_robin_cursor.fetch_add(1, Ordering::Relaxed);
                candidates.get(cursor % candidates.len()).copied()
            }
            SelectionMode::LeastLatency => candidates
                .iter()
                .min_by(|a, b| {
                    let latency_a = a.runtime.latency_ewma_ms().unwrap_or(f64::MAX);
                    let latency_b = b.runtime.latency_ewma_ms().unwrap_or(f64::MAX);
                    latency_a
                        .partial_cmp(&latency_b)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.runtime.descriptor.priority.cmp(&b.runtime.descriptor.priority))
                })
                .copied(),
            SelectionMode::LoadWeighted => candidates
                .iter()
                .min_by(|a, b| {
                    let ratio_a = load_ratio(a);
                    let ratio_b = load_ratio(b);
                    ratio_a.partial_cmp(&ratio_b).unwrap_or(std::cmp::Ordering::Equal)
                })
                .copied(),
        };

        chosen.map(|m| &m.runtime.descriptor)
    }

    /// Highest-priority HEALTHY endpoint that isn't already active, for
    /// failback evaluation (spec.md §4.3 "Failback").
    pub(crate) fn failback_candidate(&self) -> Option<&GroupMember> {
        self.members
            .iter()
            .filter(|m| {
                m.runtime.status() == EndpointStatus::Healthy
                    && Some(m.runtime.descriptor.id.clone()) != self.active_id
            })
            .min_by_key(|m| m.runtime.descriptor.priority)
            .filter(|candidate| {
                self.active_id
                    .as_deref()
                    .and_then(|active| self.member(active))
                    .map(|active| candidate.runtime.descriptor.priority < active.runtime.descriptor.priority)
                    .unwrap_or(true)
            })
    }

    pub(crate) fn set_active(&mut self, id: String, reason: String, events: &EventHub<CrlEvent>) {
        let from = self.active_id.clone();
        if from.as_deref() == Some(id.as_str()) {
            return;
        }
        self.active_id = Some(id.clone());
        events.emit(&CrlEvent::Failover {
            group_id: self.group_id.clone(),
            from,
            to: id,
            reason,
            at: Instant::now(),
        });
    }
}

fn load_ratio(member: &GroupMember) -> f64 {
    let weight = (member.runtime.descriptor.priority.max(0) + 1) as f64;
    let inflight = member.inflight.load(Ordering::Relaxed) as f64;
    inflight / weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crl_core::EndpointType;

    fn descriptor(id: &str, endpoint_type: EndpointType) -> EndpointDescriptor {
        EndpointDescriptor::new(id, "tcp://host", endpoint_type)
    }

    fn healthy_group(mode: SelectionMode) -> FailoverGroup {
        let mut group = FailoverGroup::new("g1", FailoverPolicy::builder().mode(mode).build());
        group.register(descriptor("primary", EndpointType::Primary));
        group.register(descriptor("secondary", EndpointType::Secondary));
        for id in ["primary", "secondary"] {
            let member = group.member_mut(id).unwrap();
            member.runtime.status = EndpointStatus::Healthy;
        }
        group
    }

    #[test]
    fn active_passive_prefers_lowest_priority() {
        let group = healthy_group(SelectionMode::ActivePassive);
        let chosen = group.select(&[]).unwrap();
        assert_eq!(chosen.id, "primary");
    }

    #[test]
    fn active_passive_skips_excluded() {
        let group = healthy_group(SelectionMode::ActivePassive);
        let chosen = group.select(&["primary".to_string()]).unwrap();
        assert_eq!(chosen.id, "secondary");
    }

    #[test]
    fn unselectable_when_no_healthy_endpoint() {
        let mut group = FailoverGroup::new("g1", FailoverPolicy::default());
        group.register(descriptor("primary", EndpointType::Primary));
        assert!(group.select(&[]).is_none());
    }

    #[test]
    fn round_robin_cycles_candidates() {
        let group = healthy_group(SelectionMode::RoundRobin);
        let first = group.select(&[]).unwrap().id.clone();
        let second = group.select(&[]).unwrap().id.clone();
        assert_ne!(first, second);
    }

    #[test]
    fn least_latency_prefers_lower_latency() {
        let mut group = healthy_group(SelectionMode::LeastLatency);
        group.member_mut("secondary").unwrap().runtime.latency.record(5.0);
        group.member_mut("primary").unwrap().runtime.latency.record(500.0);
        let chosen = group.select(&[]).unwrap();
        assert_eq!(chosen.id, "secondary");
    }

    #[test]
    fn failback_candidate_requires_higher_priority_than_active() {
        let mut group = healthy_group(SelectionMode::ActivePassive);
        group.active_id = Some("secondary".to_string());
        let candidate = group.failback_candidate();
        assert_eq!(candidate.unwrap().runtime.descriptor.id, "primary");
    }
}
