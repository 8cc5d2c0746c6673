use std::time::Duration;

use tripmate_domain::util::backoff_ms;

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(5_000);

/// Decides how long to wait before reconnect attempt `attempt` (1-based).
/// `None` gives up.
pub trait BackoffPolicy: Send + Sync {
    fn delay(&self, attempt: u32) -> Option<Duration>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_DELAY,
            max: DEFAULT_MAX_DELAY,
            max_attempts: None,
        }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt > max) {
            return None;
        }
        let delay = backoff_ms(
            self.initial.as_millis() as u64,
            attempt.max(1),
            self.max.as_millis() as u64,
        );
        Some(Duration::from_millis(delay.max(1)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32, delay: Duration },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connect,
    Disconnect { reason: String },
    ConnectError { error: String },
    Reconnect { attempt: u32 },
    ReconnectAttempt { attempt: u32 },
    ReconnectError { error: String },
    ReconnectFailed,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Connect => "connect",
            LifecycleEvent::Disconnect { .. } => "disconnect",
            LifecycleEvent::ConnectError { .. } => "connect_error",
            LifecycleEvent::Reconnect { .. } => "reconnect",
            LifecycleEvent::ReconnectAttempt { .. } => "reconnect_attempt",
            LifecycleEvent::ReconnectError { .. } => "reconnect_error",
            LifecycleEvent::ReconnectFailed => "reconnect_failed",
        }
    }
}

/// Connection lifecycle: `Disconnected -> Reconnecting(attempt, delay) ->
/// Connected | Disconnected`. The caller performs the actual connects and sleeps.
pub struct ReconnectMachine {
    policy: Box<dyn BackoffPolicy>,
    state: ConnectionState,
    attempt: u32,
}

impl ReconnectMachine {
    pub fn new(policy: Box<dyn BackoffPolicy>) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            attempt: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connected(&mut self) -> LifecycleEvent {
        let event = if self.attempt == 0 {
            LifecycleEvent::Connect
        } else {
            LifecycleEvent::Reconnect {
                attempt: self.attempt,
            }
        };
        self.attempt = 0;
        self.state = ConnectionState::Connected;
        event
    }

    pub fn disconnected(&mut self, reason: impl Into<String>) -> LifecycleEvent {
        self.state = ConnectionState::Disconnected;
        LifecycleEvent::Disconnect {
            reason: reason.into(),
        }
    }

    /// Records a failed connect. Attempts after the first report `reconnect_error`.
    pub fn attempt_failed(&mut self, error: impl Into<String>) -> LifecycleEvent {
        self.state = ConnectionState::Disconnected;
        let error = error.into();
        if self.attempt == 0 {
            LifecycleEvent::ConnectError { error }
        } else {
            LifecycleEvent::ReconnectError { error }
        }
    }

    /// Moves to `Reconnecting` with the policy's delay, or gives up.
    pub fn schedule(&mut self) -> LifecycleEvent {
        let attempt = self.attempt.saturating_add(1);
        match self.policy.delay(attempt) {
            Some(delay) => {
                self.attempt = attempt;
                self.state = ConnectionState::Reconnecting { attempt, delay };
                LifecycleEvent::ReconnectAttempt { attempt }
            }
            None => {
                self.attempt = 0;
                self.state = ConnectionState::Disconnected;
                LifecycleEvent::ReconnectFailed
            }
        }
    }

    /// Stops retrying; the next `connected` reports a fresh `connect`.
    pub fn stop(&mut self) {
        self.attempt = 0;
        self.state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_doubles_up_to_cap() {
        let policy = ExponentialBackoff::default();
        let delays: Vec<u64> = (1..=5)
            .map(|attempt| policy.delay(attempt).expect("delay").as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 5_000, 5_000]);
        assert!(policy.delay(10_000).is_some());
    }

    #[test]
    fn bounded_backoff_gives_up() {
        let policy = ExponentialBackoff {
            max_attempts: Some(2),
            ..ExponentialBackoff::default()
        };
        assert!(policy.delay(2).is_some());
        assert_eq!(policy.delay(3), None);
    }

    #[test]
    fn machine_walks_through_reconnect() {
        let mut machine = ReconnectMachine::new(Box::new(ExponentialBackoff::default()));
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert_eq!(machine.connected(), LifecycleEvent::Connect);

        assert_eq!(
            machine.disconnected("transport close"),
            LifecycleEvent::Disconnect {
                reason: "transport close".to_string()
            }
        );
        assert_eq!(machine.schedule(), LifecycleEvent::ReconnectAttempt { attempt: 1 });
        assert_eq!(
            machine.state(),
            ConnectionState::Reconnecting {
                attempt: 1,
                delay: Duration::from_millis(1_000)
            }
        );

        assert!(matches!(
            machine.attempt_failed("refused"),
            LifecycleEvent::ReconnectError { .. }
        ));
        assert_eq!(machine.schedule(), LifecycleEvent::ReconnectAttempt { attempt: 2 });
        assert_eq!(machine.connected(), LifecycleEvent::Reconnect { attempt: 2 });
        assert!(machine.state().is_connected());
    }

    #[test]
    fn first_failure_is_a_connect_error() {
        let mut machine = ReconnectMachine::new(Box::new(ExponentialBackoff::default()));
        assert!(matches!(
            machine.attempt_failed("refused"),
            LifecycleEvent::ConnectError { .. }
        ));
    }

    #[test]
    fn exhausted_policy_reports_failure() {
        let mut machine = ReconnectMachine::new(Box::new(ExponentialBackoff {
            max_attempts: Some(1),
            ..ExponentialBackoff::default()
        }));
        machine.connected();
        machine.disconnected("io");
        assert_eq!(machine.schedule(), LifecycleEvent::ReconnectAttempt { attempt: 1 });
        machine.attempt_failed("io");
        assert_eq!(machine.schedule(), LifecycleEvent::ReconnectFailed);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }
}
