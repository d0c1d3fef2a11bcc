use crate::config::PollPolicy;
use crate::error::WaitError;
use crate::shutdown::ShutdownSignal;
use geturl_providers::ContainerProvider;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};

/// Exponential delays: `initial`, `initial * factor`, ... capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    factor: f64,
}

impl Backoff {
    pub fn new(policy: &PollPolicy) -> Self {
        Self {
            next: policy.initial_interval.min(policy.max_interval),
            max: policy.max_interval,
            factor: policy.factor.max(1.0),
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = current.mul_f64(self.factor).min(self.max);
        Some(current)
    }
}

/// Poll the container group until it is Running and return its private IP.
///
/// Transient query errors and "not found yet" are retried until the deadline.
/// A terminal state ends the wait early since the group restarts `Never`.
pub async fn wait_until_running(
    provider: &dyn ContainerProvider,
    name: &str,
    policy: &PollPolicy,
    shutdown: &mut ShutdownSignal,
) -> Result<String, WaitError> {
    let deadline = Instant::now() + policy.timeout;
    let mut backoff = Backoff::new(policy);
    let mut attempt = 0u32;

    loop {
        if shutdown.is_triggered() {
            return Err(WaitError::Cancelled);
        }
        attempt += 1;

        match timeout_at(deadline, provider.get_container_group(name)).await {
            Err(_) => return Err(WaitError::TimedOut(policy.timeout)),
            Ok(Ok(Some(status))) if status.state.is_running() => {
                return match status.private_ip.filter(|ip| !ip.trim().is_empty()) {
                    Some(ip) => {
                        tracing::info!(
                            "✅ [wait] {} is Running at {} (attempt {})",
                            name,
                            ip,
                            attempt
                        );
                        Ok(ip)
                    }
                    None => Err(WaitError::NoPrivateAddress),
                };
            }
            Ok(Ok(Some(status))) if status.state.is_terminal() => {
                return Err(WaitError::Terminal(status.state));
            }
            Ok(Ok(Some(status))) if status.provisioning_failed() => {
                return Err(WaitError::ProvisioningFailed(
                    status.provisioning_state.unwrap_or_default(),
                ));
            }
            Ok(Ok(Some(status))) => {
                tracing::debug!(
                    "⏳ [wait] {} is {} (provisioning {:?}, attempt {})",
                    name,
                    status.state,
                    status.provisioning_state,
                    attempt
                );
            }
            Ok(Ok(None)) => {
                tracing::debug!("⏳ [wait] {} not visible yet (attempt {})", name, attempt);
            }
            Ok(Err(e)) => {
                tracing::warn!("⚠️ [wait] status query for {} failed: {:#}", name, e);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::TimedOut(policy.timeout));
        }
        let delay = backoff
            .next()
            .unwrap_or(policy.max_interval)
            .min(deadline - now);

        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown.cancelled() => return Err(WaitError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown;
    use geturl_common::InstanceState;
    use geturl_providers::inventory::ContainerGroupSpec;
    use geturl_providers::mock::MockProvider;
    use std::collections::BTreeMap;

    fn spec(name: &str) -> ContainerGroupSpec {
        ContainerGroupSpec {
            name: name.into(),
            location: "centralus".into(),
            image: "img".into(),
            cpu: 1.0,
            memory_gb: 1.0,
            port: 8080,
            environment: vec![],
            subnet_id: "subnet".into(),
            registry: None,
            tags: BTreeMap::new(),
        }
    }

    async fn created(provider: MockProvider) -> MockProvider {
        provider.create_container_group(&spec("g")).await.unwrap();
        provider
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let delays: Vec<u64> = Backoff::new(&PollPolicy::default())
            .take(6)
            .map(|d| d.as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_ip_once_running() {
        let provider = created(
            MockProvider::new()
                .with_private_ip(Some("10.0.0.5"))
                .with_states(vec![
                    InstanceState::Pending,
                    InstanceState::Pending,
                    InstanceState::Running,
                ]),
        )
        .await;
        let (_trigger, mut signal) = shutdown::channel();

        let start = Instant::now();
        let ip = wait_until_running(&provider, "g", &PollPolicy::default(), &mut signal)
            .await
            .unwrap();
        assert_eq!(ip, "10.0.0.5");
        assert_eq!(provider.status_queries(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_at_deadline() {
        let provider = created(MockProvider::new().never_running()).await;
        let (_trigger, mut signal) = shutdown::channel();

        let start = Instant::now();
        let err = wait_until_running(&provider, "g", &PollPolicy::default(), &mut signal)
            .await
            .unwrap_err();
        assert_eq!(err, WaitError::TimedOut(Duration::from_secs(120)));
        assert_eq!(start.elapsed(), Duration::from_secs(120));
        // t = 0, 1, 3, 7, then every 5s up to 117, then the deadline itself.
        assert_eq!(provider.status_queries(), 27);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_state_stops_early() {
        let provider = created(
            MockProvider::new().with_states(vec![InstanceState::Pending, InstanceState::Failed]),
        )
        .await;
        let (_trigger, mut signal) = shutdown::channel();

        let err = wait_until_running(&provider, "g", &PollPolicy::default(), &mut signal)
            .await
            .unwrap_err();
        assert_eq!(err, WaitError::Terminal(InstanceState::Failed));
        assert_eq!(provider.status_queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_provisioning_stops_early() {
        for provisioning_state in ["Failed", "Canceled"] {
            let provider = created(
                MockProvider::new()
                    .never_running()
                    .with_provisioning_state(provisioning_state),
            )
            .await;
            let (_trigger, mut signal) = shutdown::channel();

            let start = Instant::now();
            let err = wait_until_running(&provider, "g", &PollPolicy::default(), &mut signal)
                .await
                .unwrap_err();
            assert_eq!(
                err,
                WaitError::ProvisioningFailed(provisioning_state.to_string())
            );
            assert_eq!(provider.status_queries(), 1);
            assert_eq!(start.elapsed(), Duration::ZERO);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn running_without_ip_is_an_error() {
        let provider = created(MockProvider::new().with_private_ip(None)).await;
        let (_trigger, mut signal) = shutdown::channel();

        let err = wait_until_running(&provider, "g", &PollPolicy::default(), &mut signal)
            .await
            .unwrap_err();
        assert_eq!(err, WaitError::NoPrivateAddress);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_group_keeps_polling_until_timeout() {
        let provider = MockProvider::new();
        let (_trigger, mut signal) = shutdown::channel();
        let policy = PollPolicy {
            timeout: Duration::from_secs(10),
            ..PollPolicy::default()
        };

        let err = wait_until_running(&provider, "missing", &policy, &mut signal)
            .await
            .unwrap_err();
        assert_eq!(err, WaitError::TimedOut(Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_the_wait() {
        let provider = created(MockProvider::new().never_running()).await;
        let (trigger, mut signal) = shutdown::channel();

        let waiter = async {
            wait_until_running(&provider, "g", &PollPolicy::default(), &mut signal).await
        };
        let stopper = async {
            sleep(Duration::from_secs(10)).await;
            trigger.trigger();
        };
        let (res, _) = tokio::join!(waiter, stopper);
        assert_eq!(res.unwrap_err(), WaitError::Cancelled);
    }
}
