//! Health probing (spec.md §4.3): an [`EndpointProbe`] checks one endpoint;
//! [`FailoverManager`](crate::FailoverManager) spawns a background loop per
//! endpoint that calls it on `health_check.interval` and feeds the result
//! into the endpoint's circuit via `report_success`/`report_failure`.
//!
//! The trait and its blanket closure impl are grounded on the teacher's
//! `tower-resilience-healthcheck::checker::HealthChecker<T>`.

use crate::endpoint::EndpointDescriptor;
use std::future::Future;

/// Checks whether an endpoint is currently reachable.
pub trait EndpointProbe: Send + Sync {
    fn probe(&self, endpoint: &EndpointDescriptor) -> impl Future<Output = bool> + Send;
}

impl<F, Fut> EndpointProbe for F
where
    F: Fn(&EndpointDescriptor) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    fn probe(&self, endpoint: &EndpointDescriptor) -> impl Future<Output = bool> + Send {
        self(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crl_core::EndpointType;

    #[tokio::test]
    async fn closure_probe_is_callable() {
        let descriptor = EndpointDescriptor::new("e1", "tcp://host:1", EndpointType::Primary);
        let probe = |_: &EndpointDescriptor| async { true };
        assert!(probe.probe(&descriptor).await);
    }
}
