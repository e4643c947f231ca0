use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use pwrseq_core::attr::Attribute;
use pwrseq_core::driver::{self, BindError, Binding, BoundPwrseq};
use pwrseq_core::registry::{HostPwrseq, PwrseqRegistry};
use pwrseq_core::telemetry::EventId;

use crate::board::{BoardOptions, HostDelay, SharedState, SimBoard};

pub type EmulatedPwrseq = BoundPwrseq<NoopRawMutex, SimBoard, HostDelay>;
type Handle = Rc<EmulatedPwrseq>;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "pre-power-on",
        "pre-power-on                 - start the clock and hold the card in reset",
    ),
    (
        "post-power-on",
        "post-power-on                - release reset and wait out the settle time",
    ),
    (
        "power-off",
        "power-off                    - assert reset, hold, then stop the clock",
    ),
    (
        "reset",
        "reset                        - controller hardware reset hook",
    ),
    (
        "cat",
        "cat <pwr_gpio|vref_uV>       - read an override attribute",
    ),
    (
        "echo",
        "echo [-n] <value> > <attr>   - write an override attribute",
    ),
    (
        "status",
        "status                       - show sequencer and board state",
    ),
    (
        "events",
        "events                       - dump the sequencer event trail",
    ),
    (
        "help",
        "help [topic]                 - show help for a command",
    ),
];

pub struct Session {
    board: SimBoard,
    state: SharedState,
    registry: PwrseqRegistry<Handle, 1>,
    binding: Binding<Handle>,
    host: HostPwrseq<Handle>,
    next_event: EventId,
}

impl Session {
    pub fn new(options: BoardOptions) -> Result<Self, BindError> {
        let mut board = SimBoard::new(options);
        let state = board.state();
        let mut registry: PwrseqRegistry<Handle, 1> = PwrseqRegistry::new();

        if !driver::matches(&board) {
            log::warn!("emulated node is not {}", driver::COMPATIBLE);
        }
        let binding = driver::bind(&mut board, HostDelay, &mut registry, |seq: EmulatedPwrseq| {
            Rc::new(seq)
        })?;
        log::info!("{} bound to {}", driver::DRIVER_NAME, binding.node());

        let host = HostPwrseq::attach(&registry, binding.node()).unwrap_or_else(HostPwrseq::none);

        Ok(Self {
            board,
            state,
            registry,
            binding,
            host,
            next_event: 0,
        })
    }

    pub fn handle_command(&mut self, line: &str) -> Vec<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let (command, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (trimmed, ""),
        };

        match command {
            "help" => handle_help(rest),
            "pre-power-on" => {
                self.host.pre_power_on();
                self.drain_events()
            }
            "post-power-on" => {
                self.host.post_power_on();
                self.drain_events()
            }
            "power-off" => {
                self.host.power_off();
                self.drain_events()
            }
            "reset" => {
                self.host.reset();
                self.drain_events()
            }
            "cat" => self.handle_cat(rest),
            "echo" => self.handle_echo(rest),
            "status" => self.handle_status(),
            "events" => self.handle_events(),
            other => vec![format!("ERR unknown command `{other}` (try `help`)")],
        }
    }

    /// Drops the binding and the controller's reference to it.
    pub fn shutdown(mut self) {
        self.host.detach();
        let handle = self.binding.unbind(&mut self.board, &mut self.registry);
        log::info!(
            "{} unbound, {} handle(s) left",
            driver::DRIVER_NAME,
            Rc::strong_count(&handle)
        );
    }

    fn sequencer(&self) -> &EmulatedPwrseq {
        self.binding.handle()
    }

    fn attribute(&self, name: &str) -> Result<Attribute, String> {
        Attribute::from_name(name)
            .filter(|attribute| self.state.borrow().attributes.contains(attribute))
            .ok_or_else(|| format!("ERR no such attribute `{name}`"))
    }

    fn handle_cat(&mut self, name: &str) -> Vec<String> {
        let attribute = match self.attribute(name) {
            Ok(attribute) => attribute,
            Err(message) => return vec![message],
        };

        let mut out = String::new();
        match self.sequencer().show(attribute, &mut out) {
            Ok(()) => vec![out.trim_end_matches('\n').to_string()],
            Err(err) => vec![format!("ERR {attribute}: {err}")],
        }
    }

    fn handle_echo(&mut self, args: &str) -> Vec<String> {
        let Some((value, target)) = args.rsplit_once('>') else {
            return vec!["ERR usage: echo [-n] <value> > <attr>".to_string()];
        };
        let attribute = match self.attribute(target.trim()) {
            Ok(attribute) => attribute,
            Err(message) => return vec![message],
        };

        let value = value.trim();
        let input = match value.strip_prefix("-n") {
            Some(raw) if raw.is_empty() || raw.starts_with(char::is_whitespace) => {
                raw.trim_start().to_string()
            }
            _ => format!("{value}\n"),
        };

        let consumed = self.sequencer().store(attribute, &input);
        let mut lines = vec![format!("OK {attribute} consumed {consumed} bytes")];
        lines.extend(self.drain_events());
        lines
    }

    fn handle_status(&mut self) -> Vec<String> {
        let seq = self.sequencer();
        let (phase, clock_enabled, has_clock, has_reset, has_regulator, config) =
            seq.with(|inner| {
                (
                    inner.phase(),
                    inner.clock_enabled(),
                    inner.has_clock(),
                    inner.has_reset_lines(),
                    inner.has_regulator(),
                    *inner.config(),
                )
            });
        let state = self.state.borrow();

        let reset = if has_reset {
            let levels: Vec<&str> = state
                .reset_lines
                .iter()
                .map(|&level| if level { "1" } else { "0" })
                .collect();
            format!("[{}]", levels.join(" "))
        } else {
            "absent".to_string()
        };
        let clock = if has_clock {
            if state.clock_running { "running" } else { "stopped" }
        } else {
            "absent"
        };
        let vref = match (has_regulator, state.vref_uv) {
            (true, Some(uv)) => format!("{uv}uV"),
            _ => "absent".to_string(),
        };

        vec![
            format!(
                "{} {} phase={} clock_enabled={clock_enabled}",
                driver::DRIVER_NAME,
                self.binding.node(),
                phase.as_str()
            ),
            format!("  clock={clock} reset={reset} vref={vref}"),
            format!(
                "  post-power-on-delay={}ms power-off-delay={}us seed={}",
                config.post_power_on_delay_ms(),
                config.power_off_delay_us(),
                config.jitter_seed()
            ),
        ]
    }

    fn handle_events(&mut self) -> Vec<String> {
        let lines: Vec<String> = self.sequencer().with(|inner| {
            inner
                .telemetry()
                .oldest_first()
                .map(ToString::to_string)
                .collect()
        });
        if lines.is_empty() {
            vec!["no events recorded".to_string()]
        } else {
            lines
        }
    }

    /// Renders events recorded since the previous call.
    fn drain_events(&mut self) -> Vec<String> {
        let since = self.next_event;
        let (lines, next) = self.sequencer().with(|inner| {
            let lines: Vec<String> = inner
                .telemetry()
                .oldest_first()
                .filter(|record| record.id >= since)
                .map(|record| format!("  {record}"))
                .collect();
            let next = inner
                .telemetry()
                .latest()
                .map_or(since, |record| record.id.wrapping_add(1));
            (lines, next)
        });
        self.next_event = next;
        if lines.is_empty() {
            vec!["OK".to_string()]
        } else {
            lines
        }
    }
}

fn handle_help(topic: &str) -> Vec<String> {
    let mut lines = Vec::new();
    if topic.is_empty() {
        lines.push("Available commands:".to_string());
        for (_, detail) in HELP_TOPICS {
            lines.push(format!("  {detail}"));
        }
        lines.push("Type `help <topic>` for a specific command.".to_string());
    } else if let Some((_, detail)) = HELP_TOPICS.iter().find(|(name, _)| *name == topic) {
        lines.push((*detail).to_string());
    } else {
        lines.push(format!("No help available for `{topic}`."));
        lines.push(format!("Available topics: {}", help_topic_list()));
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(args: &[&str]) -> Session {
        let options =
            BoardOptions::from_args(args.iter().map(|arg| (*arg).to_string())).unwrap();
        Session::new(options).unwrap()
    }

    #[test]
    fn power_cycle_drives_simulated_hardware() {
        let mut session = session(&["--reset-lines=2"]);

        let output = session.handle_command("pre-power-on");
        assert!(output.iter().any(|line| line.contains("clock-enabled")));
        assert!(session.state.borrow().clock_running);
        assert_eq!(session.state.borrow().reset_lines, vec![true, true]);

        session.handle_command("post-power-on");
        assert_eq!(session.state.borrow().reset_lines, vec![false, false]);
        assert_eq!(session.handle_command("cat pwr_gpio"), vec!["on"]);

        session.handle_command("power-off");
        assert!(!session.state.borrow().clock_running);
        assert_eq!(session.handle_command("cat pwr_gpio"), vec!["off"]);
    }

    #[test]
    fn echo_writes_reach_the_attributes() {
        let mut session = session(&[]);

        let output = session.handle_command("echo 1800000 > vref_uV");
        assert_eq!(output[0], "OK vref_uV consumed 8 bytes");
        assert_eq!(session.handle_command("cat vref_uV"), vec!["1800000"]);

        let output = session.handle_command("echo -n on > pwr_gpio");
        assert_eq!(output[0], "OK pwr_gpio consumed 2 bytes");
        assert!(session.state.borrow().clock_running);
    }

    #[test]
    fn missing_regulator_hides_vref_attribute() {
        let mut session = session(&["--no-regulator"]);
        assert_eq!(
            session.handle_command("cat vref_uV"),
            vec!["ERR no such attribute `vref_uV`"]
        );
    }

    #[test]
    fn status_reports_absent_resources() {
        let mut session = session(&["--no-clock", "--no-reset"]);
        let status = session.handle_command("status");
        assert!(status[0].contains("phase=off"));
        assert!(status[1].contains("clock=absent"));
        assert!(status[1].contains("reset=absent"));
    }

    #[test]
    fn status_shows_the_effective_jitter_seed() {
        let mut pinned = session(&["--seed=42"]);
        assert!(pinned.handle_command("status")[2].ends_with("seed=42"));

        let mut derived = session(&[]);
        let seed = pwrseq_core::config::node_jitter_seed(crate::board::EMULATED_NODE.0);
        let expected = format!("seed={seed}");
        assert!(derived.handle_command("status")[2].ends_with(&expected));
    }

    #[test]
    fn unknown_commands_are_reported() {
        let mut session = session(&[]);
        assert_eq!(
            session.handle_command("reboot"),
            vec!["ERR unknown command `reboot` (try `help`)"]
        );
        assert_eq!(session.handle_command("help cat").len(), 1);
    }
}
