//! Connection lifecycle as a pure state machine.
//!
//! The machine performs no I/O. Each [`Input`] yields the [`Action`]s the
//! driver must carry out. At most one timer is pending at any time: every
//! [`Action::Arm`] replaces the previous timer.

use std::time::Duration;

use tokio::time::Instant;

use hisho_protocol::OutboundMessage;

use crate::endpoint::Endpoint;
use crate::types::{
    ConnectionConfig, ConnectionEvent, ConnectionState, ERR_CONNECTION, ERR_UNREACHABLE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Timer {
    Startup,
    ConnectTimeout,
    StartMonitoring,
    Reconnect,
    Recovery,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Input {
    /// Connect after the startup delay.
    Start,
    /// Connect now.
    Connect,
    Opened,
    Closed(String),
    Errored(String),
    TimerFired(Timer),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action {
    Open(String),
    Close,
    Arm(Timer, Duration),
    Disarm,
    Send(OutboundMessage),
    Emit(ConnectionEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cause {
    Timeout,
    Closed,
    Error,
}

pub(crate) struct Machine {
    config: ConnectionConfig,
    endpoint: Endpoint,
    state: ConnectionState,
    attempts: u32,
    /// Set while a reconnect or recovery timer is pending.
    reconnecting: bool,
    /// Set once an error has been surfaced; cleared on open.
    error_shown: bool,
    created: Instant,
}

impl Machine {
    pub(crate) fn new(endpoint: Endpoint, config: ConnectionConfig, created: Instant) -> Self {
        Self {
            config,
            endpoint,
            state: ConnectionState::Idle,
            attempts: 0,
            reconnecting: false,
            error_shown: false,
            created,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub(crate) fn handle(&mut self, input: Input, now: Instant) -> Vec<Action> {
        use ConnectionState::*;

        match (input, self.state) {
            (Input::Start, Idle | Closed) => {
                vec![Action::Arm(Timer::Startup, self.config.startup_delay)]
            }
            (Input::Start, _) => Vec::new(),
            (Input::Connect, _) => self.begin_connect(),

            (Input::TimerFired(Timer::Startup), Idle | Closed)
            | (Input::TimerFired(Timer::Reconnect), Reconnecting) => self.begin_connect(),
            (Input::TimerFired(Timer::Recovery), Failed) => {
                self.attempts = 0;
                self.begin_connect()
            }
            (Input::TimerFired(Timer::ConnectTimeout), Connecting) => {
                self.disconnect(Cause::Timeout, now)
            }
            (Input::TimerFired(Timer::StartMonitoring), Open) => {
                vec![Action::Send(OutboundMessage::start_monitoring())]
            }
            (Input::TimerFired(_), _) => Vec::new(),

            (Input::Opened, Connecting) => self.open(),
            (Input::Closed(_), Connecting | Open) => self.disconnect(Cause::Closed, now),
            (Input::Errored(_), Connecting | Open) => self.disconnect(Cause::Error, now),
            (Input::Opened | Input::Closed(_) | Input::Errored(_), _) => Vec::new(),

            (Input::Shutdown, Closed) => Vec::new(),
            (Input::Shutdown, _) => self.shutdown(),
        }
    }

    fn begin_connect(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Open) {
            actions.push(Action::Close);
        }
        self.reconnecting = false;
        self.set_state(ConnectionState::Connecting, &mut actions);
        actions.push(Action::Open(self.endpoint.current().to_string()));
        actions.push(Action::Arm(Timer::ConnectTimeout, self.config.connect_timeout));
        actions
    }

    fn open(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.attempts = 0;
        self.error_shown = false;
        self.reconnecting = false;
        self.set_state(ConnectionState::Open, &mut actions);
        actions.push(Action::Send(OutboundMessage::client_hello()));
        actions.push(Action::Send(OutboundMessage::check_status()));
        actions.push(Action::Arm(
            Timer::StartMonitoring,
            self.config.start_monitoring_delay,
        ));
        actions
    }

    /// One disconnect flips the endpoint once and enters the retry policy once.
    fn disconnect(&mut self, cause: Cause, now: Instant) -> Vec<Action> {
        let mut actions = vec![Action::Close];
        self.endpoint.flip();

        if cause == Cause::Error {
            self.surface(ERR_CONNECTION, now, &mut actions);
        }

        if self.reconnecting {
            return actions;
        }
        self.reconnecting = true;

        if self.attempts < self.config.max_attempts {
            self.attempts += 1;
            self.set_state(ConnectionState::Reconnecting, &mut actions);
            actions.push(Action::Arm(Timer::Reconnect, self.config.reconnect_interval));
        } else {
            self.set_state(ConnectionState::Failed, &mut actions);
            self.surface(ERR_UNREACHABLE, now, &mut actions);
            actions.push(Action::Arm(Timer::Recovery, self.config.recovery_delay));
        }
        actions
    }

    fn shutdown(&mut self) -> Vec<Action> {
        let mut actions = vec![Action::Disarm, Action::Close];
        self.reconnecting = false;
        self.set_state(ConnectionState::Closing, &mut actions);
        self.set_state(ConnectionState::Closed, &mut actions);
        actions
    }

    fn surface(&mut self, message: &str, now: Instant, actions: &mut Vec<Action>) {
        let in_grace = now.saturating_duration_since(self.created) <= self.config.error_grace;
        if self.error_shown || in_grace {
            return;
        }
        self.error_shown = true;
        actions.push(Action::Emit(ConnectionEvent::Error(message.to_string())));
    }

    fn set_state(&mut self, state: ConnectionState, actions: &mut Vec<Action>) {
        self.state = state;
        actions.push(Action::Emit(ConnectionEvent::StatusChanged {
            state,
            attempt: self.attempts,
            max_attempts: self.config.max_attempts,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> (Machine, Instant) {
        let created = Instant::now();
        let m = Machine::new(
            Endpoint::new("ws://primary/ws", "ws://alternate/ws"),
            ConnectionConfig::default(),
            created,
        );
        (m, created)
    }

    fn later(created: Instant) -> Instant {
        created + Duration::from_secs(60)
    }

    fn states(actions: &[Action]) -> Vec<ConnectionState> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Emit(ConnectionEvent::StatusChanged { state, .. }) => Some(*state),
                _ => None,
            })
            .collect()
    }

    fn errors(actions: &[Action]) -> Vec<String> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Emit(ConnectionEvent::Error(msg)) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    fn opened_url(actions: &[Action]) -> Option<&str> {
        actions.iter().find_map(|a| match a {
            Action::Open(url) => Some(url.as_str()),
            _ => None,
        })
    }

    fn armed(actions: &[Action]) -> Vec<Timer> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Arm(t, _) => Some(*t),
                _ => None,
            })
            .collect()
    }

    /// Drives `n` consecutive dial failures, firing whichever timer each
    /// failure arms. Returns every action produced.
    fn fail_n(m: &mut Machine, now: Instant, n: usize) -> Vec<Action> {
        let mut all = m.handle(Input::Connect, now);
        for _ in 0..n {
            let actions = m.handle(Input::Errored("refused".into()), now);
            let next = armed(&actions);
            all.extend(actions);
            if let Some(timer) = next.last() {
                all.extend(m.handle(Input::TimerFired(*timer), now));
            }
        }
        all
    }

    #[test]
    fn start_waits_for_startup_delay() {
        let (mut m, now) = machine();
        let actions = m.handle(Input::Start, now);
        assert_eq!(
            actions,
            vec![Action::Arm(Timer::Startup, Duration::from_secs(5))]
        );
        assert_eq!(m.state(), ConnectionState::Idle);

        let actions = m.handle(Input::TimerFired(Timer::Startup), now);
        assert_eq!(states(&actions), vec![ConnectionState::Connecting]);
        assert_eq!(opened_url(&actions), Some("ws://alternate/ws"));
    }

    #[test]
    fn open_sends_handshake_then_schedules_monitoring() {
        let (mut m, now) = machine();
        m.handle(Input::Connect, now);
        let actions = m.handle(Input::Opened, now);

        let sent: Vec<&str> = actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(msg) => Some(msg.label()),
                _ => None,
            })
            .collect();
        assert_eq!(sent, vec!["client_hello", "check_status"]);
        assert_eq!(armed(&actions), vec![Timer::StartMonitoring]);
        assert_eq!(m.state(), ConnectionState::Open);

        let actions = m.handle(Input::TimerFired(Timer::StartMonitoring), now);
        assert_eq!(
            actions,
            vec![Action::Send(OutboundMessage::start_monitoring())]
        );
    }

    #[test]
    fn start_monitoring_is_skipped_after_disconnect() {
        let (mut m, now) = machine();
        m.handle(Input::Connect, now);
        m.handle(Input::Opened, now);
        m.handle(Input::Closed("gone".into()), now);
        assert!(m.handle(Input::TimerFired(Timer::StartMonitoring), now).is_empty());
    }

    #[test]
    fn timeout_closes_and_schedules_retry() {
        let (mut m, now) = machine();
        m.handle(Input::Connect, now);
        let actions = m.handle(Input::TimerFired(Timer::ConnectTimeout), later(now));
        assert_eq!(actions[0], Action::Close);
        assert_eq!(states(&actions), vec![ConnectionState::Reconnecting]);
        assert_eq!(armed(&actions), vec![Timer::Reconnect]);
        assert_eq!(m.attempts(), 1);
        // A timeout is not surfaced as a transport error.
        assert!(errors(&actions).is_empty());
    }

    #[test]
    fn each_disconnect_alternates_endpoint() {
        let (mut m, now) = machine();
        let mut urls = Vec::new();
        let mut actions = m.handle(Input::Connect, now);
        for _ in 0..4 {
            urls.push(opened_url(&actions).unwrap_or_default().to_string());
            m.handle(Input::Errored("refused".into()), now);
            actions = m.handle(Input::TimerFired(Timer::Reconnect), now);
        }
        assert_eq!(
            urls,
            vec![
                "ws://alternate/ws",
                "ws://primary/ws",
                "ws://alternate/ws",
                "ws://primary/ws",
            ]
        );
    }

    #[test]
    fn reconnects_at_fixed_interval_up_to_budget() {
        let (mut m, now) = machine();
        let all = fail_n(&mut m, now, 10);
        let delays: Vec<Duration> = all
            .iter()
            .filter_map(|a| match a {
                Action::Arm(Timer::Reconnect, d) => Some(*d),
                _ => None,
            })
            .collect();
        assert_eq!(delays, vec![Duration::from_secs(5); 10]);
        assert!(!states(&all).contains(&ConnectionState::Failed));
        assert_eq!(m.attempts(), 10);
    }

    #[test]
    fn budget_exhaustion_fails_once_and_recovers() {
        let (mut m, now) = machine();
        let all = fail_n(&mut m, later(now), 11);

        let failed = states(&all)
            .into_iter()
            .filter(|s| *s == ConnectionState::Failed)
            .count();
        assert_eq!(failed, 1);
        let recoveries = armed(&all)
            .into_iter()
            .filter(|t| *t == Timer::Recovery)
            .count();
        assert_eq!(recoveries, 1);
        // The recovery timer has fired: counter reset, fresh attempt started.
        assert_eq!(m.attempts(), 0);
        assert_eq!(m.state(), ConnectionState::Connecting);
    }

    #[test]
    fn fifteen_failures_schedule_one_recovery() {
        let (mut m, now) = machine();
        let all = fail_n(&mut m, later(now), 15);
        let recoveries = armed(&all)
            .into_iter()
            .filter(|t| *t == Timer::Recovery)
            .count();
        assert_eq!(recoveries, 1);
        // Four failures after the reset.
        assert_eq!(m.attempts(), 4);
    }

    #[test]
    fn stale_disconnects_are_ignored_while_waiting() {
        let (mut m, now) = machine();
        m.handle(Input::Connect, now);
        m.handle(Input::Errored("refused".into()), now);
        assert_eq!(m.state(), ConnectionState::Reconnecting);
        assert!(m.handle(Input::Closed("late".into()), now).is_empty());
        assert!(m.handle(Input::Errored("late".into()), now).is_empty());
        assert_eq!(m.attempts(), 1);
    }

    #[test]
    fn connect_while_pending_replaces_timer() {
        let (mut m, now) = machine();
        m.handle(Input::Connect, now);
        m.handle(Input::Errored("refused".into()), now);
        let actions = m.handle(Input::Connect, now);
        assert_eq!(armed(&actions), vec![Timer::ConnectTimeout]);
        // The old reconnect timer no longer starts an attempt.
        assert!(m.handle(Input::TimerFired(Timer::Reconnect), now).is_empty());
    }

    #[test]
    fn connect_while_open_closes_first() {
        let (mut m, now) = machine();
        m.handle(Input::Connect, now);
        m.handle(Input::Opened, now);
        let actions = m.handle(Input::Connect, now);
        assert_eq!(actions[0], Action::Close);
        assert_eq!(opened_url(&actions), Some("ws://alternate/ws"));
    }

    #[test]
    fn errors_are_silent_during_grace_period() {
        let (mut m, now) = machine();
        let all = fail_n(&mut m, now, 11);
        assert!(errors(&all).is_empty());
    }

    #[test]
    fn error_is_surfaced_once_until_open() {
        let (mut m, now) = machine();
        let t = later(now);
        let all = fail_n(&mut m, t, 11);
        assert_eq!(errors(&all), vec![ERR_CONNECTION.to_string()]);

        m.handle(Input::Opened, t);
        let after_open = m.handle(Input::Errored("reset".into()), t);
        assert_eq!(errors(&after_open), vec![ERR_CONNECTION.to_string()]);
    }

    #[test]
    fn unreachable_surfaced_when_only_timeouts() {
        let (mut m, now) = machine();
        let t = later(now);
        let mut all = m.handle(Input::Connect, t);
        for _ in 0..11 {
            all.extend(m.handle(Input::TimerFired(Timer::ConnectTimeout), t));
            let next = armed(&all).last().copied();
            if let Some(timer) = next {
                all.extend(m.handle(Input::TimerFired(timer), t));
            }
        }
        assert_eq!(errors(&all), vec![ERR_UNREACHABLE.to_string()]);
    }

    #[test]
    fn shutdown_closes_without_retry() {
        let (mut m, now) = machine();
        m.handle(Input::Connect, now);
        m.handle(Input::Opened, now);
        let actions = m.handle(Input::Shutdown, now);
        assert_eq!(&actions[..2], &[Action::Disarm, Action::Close]);
        assert_eq!(
            states(&actions),
            vec![ConnectionState::Closing, ConnectionState::Closed]
        );
        assert!(armed(&actions).is_empty());

        assert!(m.handle(Input::Shutdown, now).is_empty());
        assert!(m.handle(Input::TimerFired(Timer::Reconnect), now).is_empty());
        assert_eq!(m.state(), ConnectionState::Closed);
    }

    #[test]
    fn status_reports_attempt_counts() {
        let (mut m, now) = machine();
        m.handle(Input::Connect, now);
        let actions = m.handle(Input::Errored("refused".into()), now);
        assert!(actions.contains(&Action::Emit(ConnectionEvent::StatusChanged {
            state: ConnectionState::Reconnecting,
            attempt: 1,
            max_attempts: 10,
        })));
        assert_eq!(m.endpoint().current(), "ws://primary/ws");
    }
}
