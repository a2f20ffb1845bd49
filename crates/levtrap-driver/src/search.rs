// SPDX-License-Identifier: AGPL-3.0-only

//! Adaptive derivative-gain search
//!
//! Finds a k_d that minimises the detector energy using a secant estimate of
//! the gradient, because the only view of the cost is one noisy scalar per
//! settling period.
//!
//! # Iteration
//!
//! ```text
//! prime:    k_p = 0, k_d = k0 = -1, settle, energy0 = E
//!           k1 = -5, energy1 = energy0 + 2        (seeded difference)
//!
//! iterate:  write k_d = trunc(k1), read back
//!           settle, energy0 = energy1, energy1 = E
//!           dk = k1 - k0  (1 if zero)
//!           k0, k1 = k1, clamp(k1 - 0.2 (energy1 - energy0) / dk, -1000, 0)
//! ```
//!
//! The seeded `energy1` is a placeholder, not a measurement. It forces the
//! first step to descend instead of dividing a zero difference.
//!
//! Manual mode asks the [`SearchMonitor`] before every probe write and runs
//! until the monitor stops it. Automatic mode runs until two consecutive
//! samples differ by at most the tolerance, or until the iteration cap.

use crate::controller::GainController;
use crate::port::RegisterPort;
use std::ops::ControlFlow;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default iteration cap for automatic mode.
pub const DEFAULT_MAX_ITERATIONS: usize = 500;

/// Search constants. Defaults are the values the trap was commissioned with.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Wait between a gain write and the energy sample it is judged by.
    pub settle: Duration,
    /// Extra wait after each automatic iteration before the next write.
    pub auto_dwell: Duration,
    /// k_d written while priming.
    pub initial_k_d: f64,
    /// First k_d probed after priming.
    pub first_probe_k_d: f64,
    /// Offset added to the primed energy to seed the first difference.
    pub seed_offset: f64,
    /// Step gain applied to the secant gradient.
    pub step_gain: f64,
    /// Most negative k_d the search will probe.
    pub k_d_floor: f64,
    /// Most positive k_d the search will probe.
    pub k_d_ceiling: f64,
    /// Automatic mode stops once `|energy1 - energy0|` is at most this.
    pub tolerance: f64,
    /// Iteration cap for automatic mode; `None` runs until convergence.
    pub max_iterations: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(3),
            auto_dwell: Duration::from_secs(3),
            initial_k_d: -1.0,
            first_probe_k_d: -5.0,
            seed_offset: 2.0,
            step_gain: 0.2,
            k_d_floor: -1000.0,
            k_d_ceiling: 0.0,
            tolerance: 1.0,
            max_iterations: Some(DEFAULT_MAX_ITERATIONS),
        }
    }
}

impl SearchConfig {
    /// Use `settle` for both the settling wait and the automatic dwell.
    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self.auto_dwell = settle;
        self
    }

    /// Set the automatic-mode iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// No settling waits. For simulation and tests.
    #[must_use]
    pub fn instant() -> Self {
        Self::default().with_settle(Duration::ZERO)
    }
}

/// Trial points and samples of one search run.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    k0: f64,
    k1: f64,
    energy0: f64,
    energy1: f64,
    iteration: usize,
}

impl SearchState {
    /// State with explicit trial points and samples.
    #[must_use]
    pub const fn new(k0: f64, k1: f64, energy0: f64, energy1: f64) -> Self {
        Self {
            k0,
            k1,
            energy0,
            energy1,
            iteration: 0,
        }
    }

    /// State after priming at `config.initial_k_d` and sampling `energy`.
    #[must_use]
    pub fn primed(config: &SearchConfig, energy: u16) -> Self {
        let energy0 = f64::from(energy);
        Self::new(
            config.initial_k_d,
            config.first_probe_k_d,
            energy0,
            energy0 + config.seed_offset,
        )
    }

    /// k_d to probe next.
    #[must_use]
    pub const fn probe(&self) -> f64 {
        self.k1
    }

    /// Previous trial k_d.
    #[must_use]
    pub const fn previous(&self) -> f64 {
        self.k0
    }

    /// `|energy1 - energy0|`.
    #[must_use]
    pub fn energy_delta(&self) -> f64 {
        (self.energy1 - self.energy0).abs()
    }

    /// Completed iterations.
    #[must_use]
    pub const fn iteration(&self) -> usize {
        self.iteration
    }

    /// Shift in a new energy sample.
    pub fn record(&mut self, energy: u16) {
        self.energy0 = self.energy1;
        self.energy1 = f64::from(energy);
    }

    /// Take one secant step and clamp the next probe into the envelope.
    ///
    /// Returns the unclamped step target. A zero step between trial points
    /// is treated as a unit step.
    pub fn descend(&mut self, config: &SearchConfig) -> f64 {
        let mut dk = self.k1 - self.k0;
        if dk == 0.0 {
            dk = 1.0;
        }
        let next = self.k1 - config.step_gain * (self.energy1 - self.energy0) / dk;
        self.k0 = self.k1;
        self.k1 = next.clamp(config.k_d_floor, config.k_d_ceiling);
        self.iteration += 1;
        next
    }
}

/// What one iteration did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// 1-based iteration number.
    pub iteration: usize,
    /// k_d the hardware held while sampling.
    pub k_d: i16,
    /// Energy sampled at that k_d.
    pub energy: u16,
    /// `|energy1 - energy0|` after this sample.
    pub energy_delta: f64,
    /// Step target before clamping.
    pub target_k_d: f64,
    /// k_d the next iteration will probe.
    pub next_k_d: f64,
}

/// How the search advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Operator confirms every probe.
    Manual,
    /// Runs until the energy settles.
    Automatic,
}

/// Why the search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Consecutive samples agreed within tolerance.
    Converged,
    /// The monitor declined the next probe.
    Stopped,
    /// The automatic iteration cap was reached first.
    IterationLimit,
}

/// Result of a search run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome {
    /// Mode the search ran in.
    pub mode: SearchMode,
    /// Why it ended.
    pub termination: Termination,
    /// k_d read back from hardware at the end.
    pub k_d: i16,
    /// Energy read at the end.
    pub energy: u16,
    /// The search's own k_d estimate, i.e. its next probe.
    pub estimate: f64,
    /// Completed iterations.
    pub iterations: usize,
}

impl SearchOutcome {
    /// Whether the search converged.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Observer and gate for a running search.
///
/// Every method has a default, so `()` observes nothing and confirms every
/// probe. A manual search under `()` therefore never ends.
pub trait SearchMonitor {
    /// Priming finished at `k_d` with `energy`; `next_k_d` is the first probe.
    fn primed(&mut self, _k_d: i16, _energy: u16, _next_k_d: f64) {}

    /// An iteration finished.
    fn stepped(&mut self, _report: &StepReport) {}

    /// Manual mode only: may the search write `next_k_d`?
    fn confirm(&mut self, _next_k_d: f64) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl SearchMonitor for () {}

/// One search run over a gain controller.
///
/// k_p is held at zero for the whole run.
#[derive(Debug)]
pub struct GainSearch<'c, P> {
    controller: &'c mut GainController<P>,
    config: SearchConfig,
}

impl<'c, P: RegisterPort> GainSearch<'c, P> {
    /// Prepare a search.
    pub fn new(controller: &'c mut GainController<P>, config: SearchConfig) -> Self {
        Self { controller, config }
    }

    /// Run in `mode`.
    pub fn run(&mut self, mode: SearchMode, monitor: &mut dyn SearchMonitor) -> SearchOutcome {
        match mode {
            SearchMode::Manual => self.run_manual(monitor),
            SearchMode::Automatic => self.run_automatic(monitor),
        }
    }

    /// Step on operator confirmation until the monitor stops the search.
    pub fn run_manual(&mut self, monitor: &mut dyn SearchMonitor) -> SearchOutcome {
        info!("Starting manual k_d search");
        let mut state = self.prime(monitor);

        while monitor.confirm(state.probe()).is_continue() {
            let report = self.iterate(&mut state);
            monitor.stepped(&report);
        }

        self.finish(SearchMode::Manual, &state, Termination::Stopped)
    }

    /// Step until consecutive energies agree within tolerance.
    pub fn run_automatic(&mut self, monitor: &mut dyn SearchMonitor) -> SearchOutcome {
        info!(
            "Starting automatic k_d search (cap {:?}, tolerance {})",
            self.config.max_iterations, self.config.tolerance
        );
        let mut state = self.prime(monitor);

        let termination = loop {
            if self
                .config
                .max_iterations
                .is_some_and(|cap| state.iteration() >= cap)
            {
                warn!(
                    "k_d search stopped after {} iterations without converging",
                    state.iteration()
                );
                break Termination::IterationLimit;
            }

            let report = self.iterate(&mut state);
            monitor.stepped(&report);

            if state.energy_delta() <= self.config.tolerance {
                break Termination::Converged;
            }
            std::thread::sleep(self.config.auto_dwell);
        };

        self.finish(SearchMode::Automatic, &state, termination)
    }

    fn prime(&mut self, monitor: &mut dyn SearchMonitor) -> SearchState {
        let gains = self.controller.set_gain_pair(0, probe_value(self.config.initial_k_d));
        std::thread::sleep(self.config.settle);
        let energy = self.controller.energy();

        let state = SearchState::primed(&self.config, energy);
        debug!("primed at k_d={} energy={energy}", gains.k_d);
        monitor.primed(gains.k_d, energy, state.probe());
        state
    }

    fn iterate(&mut self, state: &mut SearchState) -> StepReport {
        let gains = self.controller.set_gain_pair(0, probe_value(state.probe()));
        std::thread::sleep(self.config.settle);
        let energy = self.controller.energy();

        state.record(energy);
        let energy_delta = state.energy_delta();
        let target_k_d = state.descend(&self.config);

        let report = StepReport {
            iteration: state.iteration(),
            k_d: gains.k_d,
            energy,
            energy_delta,
            target_k_d,
            next_k_d: state.probe(),
        };
        debug!(
            "step {}: k_d={} energy={} delta={:.1} next={:.1}",
            report.iteration, report.k_d, report.energy, report.energy_delta, report.next_k_d
        );
        report
    }

    fn finish(
        &mut self,
        mode: SearchMode,
        state: &SearchState,
        termination: Termination,
    ) -> SearchOutcome {
        let outcome = SearchOutcome {
            mode,
            termination,
            k_d: self.controller.gain_pair().k_d,
            energy: self.controller.energy(),
            estimate: state.probe(),
            iterations: state.iteration(),
        };
        info!(
            "k_d search finished ({termination:?}) after {} iterations: k_d={} energy={}",
            outcome.iterations, outcome.k_d, outcome.energy
        );
        outcome
    }
}

/// Integer k_d written for a trial point, truncated toward zero.
#[allow(clippy::cast_possible_truncation)]
fn probe_value(k: f64) -> i64 {
    k as i64
}
