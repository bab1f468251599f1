//! High-level console command dispatcher.
//!
//! This module glues the parsed grammar to the probe boundary API: trigger
//! requests, latency queries, and gated configuration writes. It stays
//! `no_std` friendly so the firmware and emulator crates can share the same
//! implementation.

use crate::config::{ConfigUpdate, ProbeConfig, StimulusEdge};
use crate::engine::{Latency, ProbeHandle, TriggerRejection};

use super::grammar::{self, Command, ConfigCommand};

/// Command execution successes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome<Instant> {
    Trigger(TriggerAck<Instant>),
    Latency(Option<Latency>),
    Config(ConfigOutcome),
    Unlocked,
    Locked,
}

/// Summary returned after a trigger request was accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerAck<Instant> {
    pub requested_at: Instant,
    pub edge: StimulusEdge,
}

/// Summary returned after a configuration read or write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigOutcome {
    /// Configuration in force after the command.
    pub config: ProbeConfig,
    /// `true` when a write changed a stored value.
    pub changed: bool,
}

/// Errors surfaced while executing a command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandError<'a> {
    Parse(grammar::ParseError<'a>),
    /// Commands the dispatcher leaves to the hosting front-end.
    Unsupported(&'static str),
    /// Trigger refused by the no-op guard; a normal negative result.
    Rejected(TriggerRejection),
    /// Configuration write attempted while the session is locked.
    AccessDenied,
}

impl<'a> From<grammar::ParseError<'a>> for CommandError<'a> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

/// Abstraction over the probe boundary used by the dispatcher.
pub trait ProbeControl {
    /// Validates the configured edge against the live output level and,
    /// when permitted, arms the pending trigger.
    fn request_trigger(&mut self) -> Result<StimulusEdge, TriggerRejection>;

    /// Latency of the current cycle, when a response has been latched.
    fn latency(&self) -> Option<Latency>;

    /// Configuration currently in force.
    fn config(&self) -> ProbeConfig;

    /// Applies a partial configuration update and returns the result.
    fn update_config(&mut self, update: ConfigUpdate) -> ProbeConfig;
}

impl ProbeControl for ProbeHandle<'_> {
    fn request_trigger(&mut self) -> Result<StimulusEdge, TriggerRejection> {
        let edge = self.config_cell().get().stimulus_edge;
        self.timing().request_trigger(edge).map(|()| edge)
    }

    fn latency(&self) -> Option<Latency> {
        self.timing().latency()
    }

    fn config(&self) -> ProbeConfig {
        self.config_cell().get()
    }

    fn update_config(&mut self, update: ConfigUpdate) -> ProbeConfig {
        self.config_cell().update(update)
    }
}

/// Dispatches console commands into the probe boundary.
///
/// Configuration writes are gated by an unlocked configuration mode that
/// lives with the session, not with the probe; `unlock` and `lock` toggle
/// it and a write attempted while locked surfaces [`CommandError::AccessDenied`].
pub struct CommandExecutor<P> {
    probe: P,
    config_unlocked: bool,
}

impl<P> CommandExecutor<P> {
    /// Creates a new executor around the provided probe, starting locked.
    pub const fn new(probe: P) -> Self {
        Self {
            probe,
            config_unlocked: false,
        }
    }

    /// Creates an executor with an explicit configuration-mode state.
    pub const fn with_mode(probe: P, config_unlocked: bool) -> Self {
        Self {
            probe,
            config_unlocked,
        }
    }

    /// Returns an immutable reference to the underlying probe.
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Returns a mutable reference to the underlying probe.
    pub fn probe_mut(&mut self) -> &mut P {
        &mut self.probe
    }

    /// Consumes the executor and yields the inner probe.
    pub fn into_inner(self) -> P {
        self.probe
    }

    /// Returns `true` while configuration writes are permitted.
    pub fn config_unlocked(&self) -> bool {
        self.config_unlocked
    }
}

impl<P> CommandExecutor<P>
where
    P: ProbeControl,
{
    /// Parses and executes a console command.
    pub fn execute<'a, I: Copy>(
        &mut self,
        line: &'a str,
        now: I,
    ) -> Result<CommandOutcome<I>, CommandError<'a>> {
        let command = grammar::parse(line)?;
        self.dispatch(command, now)
    }

    fn dispatch<'a, I: Copy>(
        &mut self,
        command: Command<'a>,
        now: I,
    ) -> Result<CommandOutcome<I>, CommandError<'a>> {
        match command {
            Command::Trigger => {
                let edge = self
                    .probe
                    .request_trigger()
                    .map_err(CommandError::Rejected)?;
                Ok(CommandOutcome::Trigger(TriggerAck {
                    requested_at: now,
                    edge,
                }))
            }
            Command::Latency => Ok(CommandOutcome::Latency(self.probe.latency())),
            Command::Config(ConfigCommand::Show) => Ok(CommandOutcome::Config(ConfigOutcome {
                config: self.probe.config(),
                changed: false,
            })),
            Command::Config(write) => self.handle_config_write(write),
            Command::Unlock => {
                self.config_unlocked = true;
                Ok(CommandOutcome::Unlocked)
            }
            Command::Lock => {
                self.config_unlocked = false;
                Ok(CommandOutcome::Locked)
            }
            Command::Status => Err(CommandError::Unsupported("status")),
            Command::Help(_) => Err(CommandError::Unsupported("help")),
        }
    }

    fn handle_config_write<'a, I: Copy>(
        &mut self,
        write: ConfigCommand,
    ) -> Result<CommandOutcome<I>, CommandError<'a>> {
        if !self.config_unlocked {
            return Err(CommandError::AccessDenied);
        }

        let update = match write {
            ConfigCommand::Stimulus(edge) => ConfigUpdate::stimulus(edge),
            ConfigCommand::Response(policy) => ConfigUpdate::response(policy),
            ConfigCommand::Reset(after) => ConfigUpdate::reset(after),
            ConfigCommand::Show => ConfigUpdate::none(),
        };

        let before = self.probe.config();
        let config = self.probe.update_config(update);
        Ok(CommandOutcome::Config(ConfigOutcome {
            config,
            changed: config != before,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigCell, ResponsePolicy};
    use crate::engine::{TimingCell, can_fire};
    use core::time::Duration;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct MockInstant(u64);

    impl MockInstant {
        fn micros(value: u64) -> Self {
            Self(value)
        }
    }

    struct MockProbe {
        output_high: bool,
        latency: Option<Latency>,
        config: ProbeConfig,
    }

    impl MockProbe {
        fn new() -> Self {
            Self {
                output_high: false,
                latency: None,
                config: ProbeConfig::DEFAULT,
            }
        }
    }

    impl ProbeControl for MockProbe {
        fn request_trigger(&mut self) -> Result<StimulusEdge, TriggerRejection> {
            let edge = self.config.stimulus_edge;
            if can_fire(edge, self.output_high) {
                Ok(edge)
            } else {
                Err(TriggerRejection::AlreadyAtLevel {
                    edge,
                    output_high: self.output_high,
                })
            }
        }

        fn latency(&self) -> Option<Latency> {
            self.latency
        }

        fn config(&self) -> ProbeConfig {
            self.config
        }

        fn update_config(&mut self, update: ConfigUpdate) -> ProbeConfig {
            update.apply(&mut self.config);
            self.config
        }
    }

    #[test]
    fn trigger_returns_ack_with_timestamp() {
        let mut executor = CommandExecutor::new(MockProbe::new());
        let now = MockInstant::micros(1_000);

        let outcome = executor
            .execute("trigger", now)
            .expect("dispatch should succeed");

        assert_eq!(
            outcome,
            CommandOutcome::Trigger(TriggerAck {
                requested_at: now,
                edge: StimulusEdge::Rise,
            })
        );
    }

    #[test]
    fn redundant_trigger_surfaces_rejection() {
        let mut probe = MockProbe::new();
        probe.output_high = true;
        let mut executor = CommandExecutor::new(probe);

        let error = executor
            .execute("trigger", MockInstant::micros(0))
            .expect_err("rise while high should be refused");
        assert_eq!(
            error,
            CommandError::Rejected(TriggerRejection::AlreadyAtLevel {
                edge: StimulusEdge::Rise,
                output_high: true,
            })
        );
    }

    #[test]
    fn latency_reports_pending_and_observed_states() {
        let mut executor = CommandExecutor::new(MockProbe::new());
        let outcome = executor
            .execute("latency", MockInstant::micros(0))
            .expect("dispatch should succeed");
        assert_eq!(outcome, CommandOutcome::Latency(None));

        let measured = Latency {
            millis: 50,
            micros: 50_123,
        };
        executor.probe_mut().latency = Some(measured);
        let outcome = executor
            .execute("latency", MockInstant::micros(0))
            .expect("dispatch should succeed");
        assert_eq!(outcome, CommandOutcome::Latency(Some(measured)));
    }

    #[test]
    fn config_show_works_while_locked() {
        let mut executor = CommandExecutor::new(MockProbe::new());
        let outcome = executor
            .execute("config show", MockInstant::micros(0))
            .expect("show should not require unlock");
        assert_eq!(
            outcome,
            CommandOutcome::Config(ConfigOutcome {
                config: ProbeConfig::DEFAULT,
                changed: false,
            })
        );
    }

    #[test]
    fn config_writes_require_unlock() {
        let mut executor = CommandExecutor::new(MockProbe::new());
        let error = executor
            .execute("config stimulus toggle", MockInstant::micros(0))
            .expect_err("locked session must refuse writes");
        assert_eq!(error, CommandError::AccessDenied);
        assert_eq!(executor.probe().config, ProbeConfig::DEFAULT);
    }

    #[test]
    fn unlock_permits_independent_field_writes() {
        let mut executor = CommandExecutor::new(MockProbe::new());
        let now = MockInstant::micros(0);

        assert_eq!(
            executor.execute("unlock", now).expect("unlock"),
            CommandOutcome::Unlocked
        );

        executor
            .execute("config response reverse", now)
            .expect("response write");
        let outcome = executor
            .execute("config reset 100ms", now)
            .expect("reset write");

        // The response write must not have disturbed the stimulus edge.
        let config = executor.probe().config;
        assert_eq!(config.stimulus_edge, StimulusEdge::Rise);
        assert_eq!(config.response_policy, ResponsePolicy::Reverse);
        assert_eq!(config.reset_after, Duration::from_millis(100));
        assert_eq!(
            outcome,
            CommandOutcome::Config(ConfigOutcome {
                config,
                changed: true,
            })
        );
    }

    #[test]
    fn lock_re_gates_writes() {
        let mut executor = CommandExecutor::new(MockProbe::new());
        let now = MockInstant::micros(0);
        executor.execute("unlock", now).expect("unlock");
        executor
            .execute("config stimulus fall", now)
            .expect("write while unlocked");
        assert_eq!(
            executor.execute("lock", now).expect("lock"),
            CommandOutcome::Locked
        );

        let error = executor
            .execute("config stimulus rise", now)
            .expect_err("locked again");
        assert_eq!(error, CommandError::AccessDenied);
        assert_eq!(executor.probe().config.stimulus_edge, StimulusEdge::Fall);
    }

    #[test]
    fn redundant_write_reports_unchanged() {
        let mut executor = CommandExecutor::with_mode(MockProbe::new(), true);
        let outcome = executor
            .execute("config stimulus rise", MockInstant::micros(0))
            .expect("write");
        assert_eq!(
            outcome,
            CommandOutcome::Config(ConfigOutcome {
                config: ProbeConfig::DEFAULT,
                changed: false,
            })
        );
    }

    #[test]
    fn status_and_help_are_front_end_concerns() {
        let mut executor = CommandExecutor::new(MockProbe::new());
        let now = MockInstant::micros(0);
        assert_eq!(
            executor.execute("status", now).expect_err("status"),
            CommandError::Unsupported("status")
        );
        assert_eq!(
            executor.execute("help", now).expect_err("help"),
            CommandError::Unsupported("help")
        );
    }

    #[test]
    fn parse_error_is_returned() {
        let mut executor = CommandExecutor::new(MockProbe::new());
        let error = executor
            .execute("trigger twice please", MockInstant::micros(0))
            .expect_err("parse should fail");
        assert!(matches!(error, CommandError::Parse(_)));
    }

    #[test]
    fn probe_handle_round_trip() {
        let timing = TimingCell::new();
        let config = ConfigCell::default();
        let mut executor = CommandExecutor::with_mode(ProbeHandle::new(&timing, &config), true);
        let now = MockInstant::micros(0);

        executor
            .execute("config stimulus toggle", now)
            .expect("config write");
        assert_eq!(config.get().stimulus_edge, StimulusEdge::Toggle);

        let outcome = executor.execute("trigger", now).expect("trigger");
        assert_eq!(
            outcome,
            CommandOutcome::Trigger(TriggerAck {
                requested_at: now,
                edge: StimulusEdge::Toggle,
            })
        );
        assert!(timing.take_trigger());
    }
}
