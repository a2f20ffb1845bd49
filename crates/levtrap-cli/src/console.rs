// SPDX-License-Identifier: AGPL-3.0-only

//! Interactive operator console
//!
//! Reads one command per line and drives the gain controller and k_d search.
//! Generic over its input and output so sessions can be replayed in tests.

use levtrap_driver::{
    GainController, GainSearch, RegisterPort, SearchConfig, SearchMode, SearchMonitor,
    SearchOutcome, StepReport, Termination,
};
use std::io::{self, BufRead, Write};
use std::num::IntErrorKind;
use std::ops::ControlFlow;

const RED: &str = "\x1b[91m";
const RESET: &str = "\x1b[0m";
const RULE: &str = "------------------------";
const BANNER_RULE: &str = "##########################################################";

/// A console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Print,
    Delay,
    Feedback,
    Manual,
    Auto,
    Kill,
    Exit,
}

impl Command {
    fn parse(input: &str) -> Option<Self> {
        Some(match input {
            "p" => Self::Print,
            "delay" => Self::Delay,
            "f" => Self::Feedback,
            "ml" => Self::Manual,
            "mlauto" => Self::Auto,
            "k" => Self::Kill,
            "exit" => Self::Exit,
            _ => return None,
        })
    }
}

/// Operator console over a gain controller.
pub struct Console<P, R, W> {
    controller: GainController<P>,
    input: R,
    output: W,
    search: SearchConfig,
}

impl<P: RegisterPort, R: BufRead, W: Write> Console<P, R, W> {
    /// Console reading `input` and writing `output`.
    pub fn new(controller: GainController<P>, input: R, output: W, search: SearchConfig) -> Self {
        Self {
            controller,
            input,
            output,
            search,
        }
    }

    /// Release the controller and output.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn into_parts(self) -> (GainController<P>, W) {
        (self.controller, self.output)
    }

    /// Run until `exit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns error if the console cannot read its input or write its output.
    pub fn run(&mut self) -> io::Result<()> {
        self.banner()?;
        self.print_settings()?;

        loop {
            self.menu()?;
            let Some(line) = self.read_line()? else {
                tracing::debug!("Input closed");
                break;
            };
            writeln!(self.output)?;

            match Command::parse(&line) {
                Some(cmd) => {
                    if self.dispatch(cmd)?.is_break() {
                        break;
                    }
                }
                None if line.is_empty() => {}
                None => writeln!(self.output, "Unknown command '{line}'\n")?,
            }
        }

        self.output.flush()
    }

    fn dispatch(&mut self, cmd: Command) -> io::Result<ControlFlow<()>> {
        tracing::debug!("Command {cmd:?}");
        match cmd {
            Command::Print => self.print_settings()?,
            Command::Delay => self.change_delay()?,
            Command::Feedback => return self.feedback_menu(),
            Command::Manual => self.search(SearchMode::Manual)?,
            Command::Auto => self.search(SearchMode::Automatic)?,
            Command::Kill => {
                let gains = self.controller.zero_gains();
                self.print_new_gains(gains.k_p, gains.k_d)?;
            }
            Command::Exit => return Ok(ControlFlow::Break(())),
        }
        Ok(ControlFlow::Continue(()))
    }

    fn banner(&mut self) -> io::Result<()> {
        let out = &mut self.output;
        writeln!(out)?;
        writeln!(out, "{RED}{BANNER_RULE}")?;
        writeln!(out, "{RULE}")?;
        writeln!(out, "| levtrap feedback console |")?;
        writeln!(out, "{RULE}")?;
        writeln!(out)?;
        writeln!(out, "Version: {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(out)?;
        writeln!(out, "{RULE}")?;
        writeln!(out, "Feedback cooling of an optically levitated particle.")?;
        writeln!(out)?;
        writeln!(out, "Signal path in the FPGA:")?;
        writeln!(out, "1. Read position data from the trapped particle")?;
        writeln!(out, "2. Delay it and apply the k_p / k_d compensator")?;
        writeln!(out, "{RULE}")?;
        writeln!(out, "{BANNER_RULE}{RESET}")
    }

    fn menu(&mut self) -> io::Result<()> {
        let out = &mut self.output;
        writeln!(out, "Type...")?;
        writeln!(out, "    'p' to print current settings (k_p, k_d, delay)")?;
        writeln!(out, "    'delay' to configure the total delay,")?;
        writeln!(out, "    'f' to configure the feedback parameters,")?;
        writeln!(out, "    'ml' to optimize k_d step by step,")?;
        writeln!(out, "    'mlauto' to optimize k_d automatically,")?;
        writeln!(out, "    'k' to kill (i.e. stop) the feedback!,")?;
        writeln!(out, "    'exit' to quit")?;
        write!(out, ">> ")?;
        out.flush()
    }

    fn print_settings(&mut self) -> io::Result<()> {
        let s = self.controller.settings();
        let out = &mut self.output;
        writeln!(out, "{RULE}")?;
        writeln!(out, "Current settings:")?;
        writeln!(out, "{RULE}")?;
        writeln!(out, "Current value of delay: {}", s.delay)?;
        writeln!(out, "{RULE}")?;
        writeln!(out, "Current value of k_p:   {}", s.gains.k_p)?;
        writeln!(out, "Current value of k_d:   {}", s.gains.k_d)?;
        writeln!(out, "{RULE}")?;
        writeln!(out)
    }

    fn print_new_gains(&mut self, k_p: i16, k_d: i16) -> io::Result<()> {
        let out = &mut self.output;
        writeln!(out, "{RULE}")?;
        writeln!(out, "New value of k_p: {k_p}")?;
        writeln!(out, "New value of k_d: {k_d}")?;
        writeln!(out, "{RULE}")?;
        writeln!(out)
    }

    fn change_delay(&mut self) -> io::Result<()> {
        let Some(cycles) = self.prompt_integer("Write number of clock cycles to delay x(t)")? else {
            return Ok(());
        };
        let delay = self.controller.set_delay(cycles);
        writeln!(self.output, "Delay set to {delay} cycles\n")
    }

    fn feedback_menu(&mut self) -> io::Result<ControlFlow<()>> {
        writeln!(self.output, "Type...")?;
        writeln!(self.output, "    'c' to change values of k_p, k_d,")?;
        writeln!(self.output, "    'exit' to end execution")?;
        write!(self.output, ">> ")?;
        self.output.flush()?;

        let Some(line) = self.read_line()? else {
            return Ok(ControlFlow::Break(()));
        };
        writeln!(self.output)?;

        match line.as_str() {
            "exit" => return Ok(ControlFlow::Break(())),
            "c" => {
                let Some(k_p) = self.prompt_integer("Type value of 'k_p'")? else {
                    return Ok(ControlFlow::Continue(()));
                };
                let Some(k_d) = self.prompt_integer("Type value of 'k_d'")? else {
                    return Ok(ControlFlow::Continue(()));
                };
                let gains = self.controller.set_gain_pair(k_p, k_d);
                self.print_new_gains(gains.k_p, gains.k_d)?;
            }
            _ => {}
        }
        Ok(ControlFlow::Continue(()))
    }

    fn search(&mut self, mode: SearchMode) -> io::Result<()> {
        let mut monitor = ConsoleMonitor {
            input: &mut self.input,
            output: &mut self.output,
            error: None,
        };
        let outcome =
            GainSearch::new(&mut self.controller, self.search.clone()).run(mode, &mut monitor);
        if let Some(e) = monitor.error {
            return Err(e);
        }
        self.print_outcome(&outcome)
    }

    fn print_outcome(&mut self, outcome: &SearchOutcome) -> io::Result<()> {
        let out = &mut self.output;
        if outcome.termination == Termination::IterationLimit {
            writeln!(
                out,
                "{RED}No convergence after {} iterations{RESET}",
                outcome.iterations
            )?;
        }
        writeln!(out, "{RULE}")?;
        writeln!(out, "Final energy value: {}", outcome.energy)?;
        writeln!(out, "{RULE}")?;
        writeln!(out, "Final value of k_d: {}", outcome.k_d)?;
        writeln!(out, "{RULE}")?;
        writeln!(out)
    }

    fn prompt_integer(&mut self, prompt: &str) -> io::Result<Option<i64>> {
        write!(self.output, "{prompt}\n>> ")?;
        self.output.flush()?;
        let Some(line) = self.read_line()? else {
            return Ok(None);
        };
        writeln!(self.output)?;
        match line.parse::<i64>() {
            Ok(v) => Ok(Some(v)),
            // Too wide for i64 still saturates in the codec
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(Some(i64::MAX)),
            Err(e) if *e.kind() == IntErrorKind::NegOverflow => Ok(Some(i64::MIN)),
            Err(_) => {
                writeln!(self.output, "Not an integer: '{line}'\n")?;
                Ok(None)
            }
        }
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        read_trimmed(&mut self.input)
    }
}

fn read_trimmed(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Prints search progress and gates manual steps on the operator.
struct ConsoleMonitor<'a, R, W> {
    input: &'a mut R,
    output: &'a mut W,
    error: Option<io::Error>,
}

impl<R: BufRead, W: Write> ConsoleMonitor<'_, R, W> {
    fn emit(&mut self, f: impl FnOnce(&mut W) -> io::Result<()>) {
        if self.error.is_none() {
            if let Err(e) = f(&mut *self.output) {
                self.error = Some(e);
            }
        }
    }
}

impl<R: BufRead, W: Write> SearchMonitor for ConsoleMonitor<'_, R, W> {
    fn primed(&mut self, k_d: i16, energy: u16, next_k_d: f64) {
        self.emit(|out| {
            writeln!(out, "Initial k_d = {k_d}")?;
            writeln!(out, "{RULE}")?;
            writeln!(out, "Initial energy value: {energy}")?;
            writeln!(out, "{RULE}\n")?;
            writeln!(out, "{RED}{BANNER_RULE}{RESET}")?;
            writeln!(out, "{RULE}")?;
            writeln!(out, "Next value of k_d: {next_k_d:.1}")?;
            writeln!(out, "{RULE}")
        });
    }

    fn stepped(&mut self, report: &StepReport) {
        self.emit(|out| {
            writeln!(out, "{RULE}")?;
            writeln!(out, "Updated energy value: {}", report.energy)?;
            writeln!(out, "{RULE}")?;
            writeln!(out, "Energy difference: {:.1}", report.energy_delta)?;
            writeln!(out, "{RULE}\n")?;
            writeln!(out, "{RED}{BANNER_RULE}{RESET}")?;
            writeln!(out, "{RULE}")?;
            writeln!(out, "Next value of k_d will be: {:.1}", report.target_k_d)?;
            if report.next_k_d != report.target_k_d {
                writeln!(out, "(clamped to {:.1})", report.next_k_d)?;
            }
            writeln!(out, "{RULE}")
        });
    }

    fn confirm(&mut self, _next_k_d: f64) -> ControlFlow<()> {
        self.emit(|out| {
            writeln!(out, "Press Enter to continue, 'q' to stop")?;
            out.flush()
        });
        if self.error.is_some() {
            return ControlFlow::Break(());
        }
        match read_trimmed(&mut *self.input) {
            Ok(Some(line)) if line != "q" => ControlFlow::Continue(()),
            Ok(_) => ControlFlow::Break(()),
            Err(e) => {
                self.error = Some(e);
                ControlFlow::Break(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use levtrap_driver::{GainPair, Register, SimulatedTrap};
    use std::io::Cursor;

    fn session(trap: SimulatedTrap, script: &str) -> (GainController<SimulatedTrap>, String) {
        let mut console = Console::new(
            GainController::new(trap),
            Cursor::new(script.as_bytes().to_vec()),
            Vec::new(),
            SearchConfig::instant(),
        );
        console.run().unwrap();
        let (ctl, out) = console.into_parts();
        (ctl, String::from_utf8(out).unwrap())
    }

    #[test]
    fn startup_prints_live_settings() {
        let trap = SimulatedTrap::new()
            .with_word(Register::Delay, 42)
            .with_word(Register::Gain, 0xFFFF_0002);
        let (_, out) = session(trap, "exit\n");
        assert!(out.contains("Current value of delay: 42"));
        assert!(out.contains("Current value of k_p:   2"));
        assert!(out.contains("Current value of k_d:   -1"));
    }

    #[test]
    fn delay_is_clamped_and_reported() {
        let (ctl, out) = session(SimulatedTrap::new(), "delay\n-5\ndelay\n10000\np\nexit\n");
        assert!(out.contains("Delay set to 0 cycles"));
        assert!(out.contains("Delay set to 500 cycles"));
        assert!(out.contains("Current value of delay: 500"));
        assert_eq!(ctl.delay(), 500);
    }

    #[test]
    fn non_numeric_delay_writes_nothing() {
        let (ctl, out) = session(SimulatedTrap::new(), "delay\nfast\nexit\n");
        assert!(out.contains("Not an integer: 'fast'"));
        assert_eq!(ctl.port().writes(Register::Delay), 0);
    }

    #[test]
    fn integers_wider_than_i64_still_saturate() {
        let (ctl, out) = session(
            SimulatedTrap::new(),
            "delay\n99999999999999999999\nf\nc\n-99999999999999999999\n99999999999999999999\nexit\n",
        );
        assert!(!out.contains("Not an integer"));
        assert!(out.contains("Delay set to 500 cycles"));
        assert_eq!(ctl.port().writes(Register::Delay), 1);
        assert_eq!(ctl.delay(), 500);
        assert_eq!(ctl.gain_pair(), GainPair { k_p: -8191, k_d: 8191 });
    }

    #[test]
    fn feedback_change_saturates_gains() {
        let (ctl, out) = session(SimulatedTrap::new(), "f\nc\n20000\n-7\nexit\n");
        assert!(out.contains("New value of k_p: 8191"));
        assert!(out.contains("New value of k_d: -7"));
        assert_eq!(ctl.gain_pair(), GainPair { k_p: 8191, k_d: -7 });
    }

    #[test]
    fn feedback_exit_quits_console() {
        let (ctl, out) = session(SimulatedTrap::new(), "f\nexit\np\n");
        assert_eq!(out.matches("Current settings:").count(), 1);
        assert_eq!(ctl.port().writes(Register::Gain), 0);
    }

    #[test]
    fn kill_zeroes_gains() {
        let trap = SimulatedTrap::new().with_word(Register::Gain, 0x0010_0020);
        let (ctl, out) = session(trap, "k\nexit\n");
        assert!(out.contains("New value of k_p: 0"));
        assert_eq!(ctl.gain_pair(), GainPair::ZERO);
    }

    #[test]
    fn automatic_search_reports_final_values() {
        let (ctl, out) = session(SimulatedTrap::new(), "mlauto\nexit\n");
        assert!(out.contains("Initial energy value: 2521"));
        assert!(out.contains("Final value of k_d: -50"));
        assert_eq!(ctl.gain_pair().k_d, -50);
    }

    #[test]
    fn manual_search_steps_until_q() {
        let (ctl, out) = session(SimulatedTrap::new(), "ml\n\n\nq\nexit\n");
        assert_eq!(out.matches("Updated energy value").count(), 2);
        assert_eq!(out.matches("Press Enter to continue").count(), 3);
        assert!(out.contains("Final value of k_d"));
        assert_eq!(ctl.port().writes(Register::Gain), 3);
    }

    #[test]
    fn manual_search_ends_at_end_of_input() {
        let (_, out) = session(SimulatedTrap::new(), "ml\n\n");
        assert_eq!(out.matches("Updated energy value").count(), 1);
        assert!(out.contains("Final energy value"));
    }

    #[test]
    fn unknown_command_is_reported() {
        let (_, out) = session(SimulatedTrap::new(), "foo\nexit\n");
        assert!(out.contains("Unknown command 'foo'"));
    }

    #[test]
    fn end_of_input_exits_cleanly() {
        let (ctl, _) = session(SimulatedTrap::new(), "");
        assert_eq!(ctl.port().writes(Register::Gain), 0);
    }
}
