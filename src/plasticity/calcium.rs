//! Calcium-based plasticity in the spirit of Graupner and Brunel (2012).
//!
//! Every synapse carries a calcium-like concentration `c` following
//!
//! `dc/dt = -c / tau_c + c_pre * sum(delta(t - t_pre)) + c_post * sum(delta(t - t_post))`
//!
//! integrated in closed form: impulses are added at the exact spike times and the concentration decays
//! exponentially in between. An optional white noise of intensity `noise_sigma` is added to `c` once per tick.
//!
//! Once per tick, after the concentration has been brought to the end of the tick, the weight relaxes
//! exponentially towards `w_potentiated` at rate `gamma_p` if `c > theta_p`, towards `w_depressed` at rate
//! `gamma_d` if `theta_d < c <= theta_p`, and does not change otherwise. When ticks are skipped, the
//! relaxation covers the whole time since the last processed tick.
use derivative::Derivative;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{check_finite, check_time_constant, PlasticityRule};
use crate::clock::Tick;
use crate::config::{load_json, save_json};
use crate::error::SynapseError;
use crate::event::SpikeKind;
use crate::synapse::Synapse;

/// Parameters of the calcium-based rule.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct CalciumParams {
    /// Decay time constant of the calcium concentration.
    pub tau_c: f64,
    /// Calcium jump on a pre-synaptic spike.
    pub c_pre: f64,
    /// Calcium jump on a post-synaptic spike.
    pub c_post: f64,
    /// Depression threshold.
    pub theta_d: f64,
    /// Potentiation threshold.
    pub theta_p: f64,
    /// Relaxation rate towards the depressed weight.
    pub gamma_d: f64,
    /// Relaxation rate towards the potentiated weight.
    pub gamma_p: f64,
    /// Weight of the depressed state.
    pub w_depressed: f64,
    /// Weight of the potentiated state.
    pub w_potentiated: f64,
    /// Standard deviation of the calcium noise per square root of time unit, zero to disable.
    pub noise_sigma: f64,
    /// Seed of the noise generator, reused on every reinit.
    pub seed: u64,
}

impl Default for CalciumParams {
    fn default() -> Self {
        CalciumParams {
            tau_c: 20e-3,
            c_pre: 1.0,
            c_post: 2.0,
            theta_d: 1.0,
            theta_p: 1.3,
            gamma_d: 200.0,
            gamma_p: 321.808,
            w_depressed: 0.0,
            w_potentiated: 1.0,
            noise_sigma: 0.0,
            seed: 0,
        }
    }
}

impl CalciumParams {
    pub fn validate(&self) -> Result<(), SynapseError> {
        check_time_constant("tau_c", self.tau_c)?;
        check_finite("c_pre", self.c_pre)?;
        check_finite("c_post", self.c_post)?;
        check_finite("theta_d", self.theta_d)?;
        check_finite("theta_p", self.theta_p)?;
        if self.theta_d >= self.theta_p {
            return Err(SynapseError::InvalidParameter(format!(
                "Depression threshold {} must be below potentiation threshold {}",
                self.theta_d, self.theta_p
            )));
        }
        for (name, rate) in [("gamma_d", self.gamma_d), ("gamma_p", self.gamma_p)] {
            check_finite(name, rate)?;
            if rate < 0.0 {
                return Err(SynapseError::InvalidParameter(format!(
                    "{} must be non-negative, got {}",
                    name, rate
                )));
            }
        }
        check_finite("w_depressed", self.w_depressed)?;
        check_finite("w_potentiated", self.w_potentiated)?;
        check_finite("noise_sigma", self.noise_sigma)?;
        if self.noise_sigma < 0.0 {
            return Err(SynapseError::InvalidParameter(format!(
                "noise_sigma must be non-negative, got {}",
                self.noise_sigma
            )));
        }
        Ok(())
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SynapseError> {
        save_json(self, path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SynapseError> {
        load_json(path)
    }
}

/// Per-synapse calcium state.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct CalciumState {
    /// Calcium concentration at `last_update`.
    c: f64,
    last_update: f64,
    /// Index of the last tick the weight drifted over.
    last_tick: Option<u64>,
}

impl Default for CalciumState {
    fn default() -> Self {
        CalciumState {
            c: 0.0,
            last_update: f64::NEG_INFINITY,
            last_tick: None,
        }
    }
}

impl CalciumState {
    /// Returns the calcium concentration at the last update.
    pub fn calcium(&self) -> f64 {
        self.c
    }

    /// Returns the time of the last update.
    pub fn last_update(&self) -> f64 {
        self.last_update
    }

    /// Bring the concentration to time `t`. Earlier times leave it untouched.
    fn decay_to(&mut self, t: f64, tau_c: f64) {
        if t <= self.last_update {
            return;
        }
        if self.c != 0.0 {
            self.c *= (-(t - self.last_update) / tau_c).exp();
        }
        self.last_update = t;
    }

    /// Time elapsed since the end of the last drift step, one tick for the first step.
    fn drift_span(&mut self, tick: &Tick) -> f64 {
        let num_ticks = match self.last_tick {
            Some(last) => tick.index.saturating_sub(last),
            None => 1,
        };
        self.last_tick = Some(tick.index);
        num_ticks as f64 * tick.dt
    }
}

/// The calcium-based rule.
#[derive(Derivative, Clone)]
#[derivative(Debug, PartialEq)]
pub struct GraupnerBrunel {
    params: CalciumParams,
    #[derivative(Debug = "ignore", PartialEq = "ignore")]
    rng: ChaCha8Rng,
}

impl Default for GraupnerBrunel {
    fn default() -> Self {
        GraupnerBrunel::new(CalciumParams::default())
    }
}

impl GraupnerBrunel {
    pub fn new(params: CalciumParams) -> Self {
        GraupnerBrunel {
            params,
            rng: ChaCha8Rng::seed_from_u64(params.seed),
        }
    }

    pub fn params(&self) -> &CalciumParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut CalciumParams {
        &mut self.params
    }

    /// Returns the fixed point and rate towards which the weight relaxes at concentration `c`, if any.
    pub fn drift(&self, c: f64) -> Option<(f64, f64)> {
        if c > self.params.theta_p {
            Some((self.params.w_potentiated, self.params.gamma_p))
        } else if c > self.params.theta_d {
            Some((self.params.w_depressed, self.params.gamma_d))
        } else {
            None
        }
    }
}

impl PlasticityRule for GraupnerBrunel {
    type State = CalciumState;

    fn name(&self) -> &'static str {
        "calcium"
    }

    fn validate(&self) -> Result<(), SynapseError> {
        self.params.validate()
    }

    fn init_state(&self) -> Self::State {
        CalciumState::default()
    }

    fn reinit(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.params.seed);
    }

    fn on_event(
        &mut self,
        synapse: &mut Synapse,
        state: &mut Self::State,
        kind: SpikeKind,
        time: f64,
    ) {
        state.decay_to(time, self.params.tau_c);
        state.c += match kind {
            SpikeKind::Pre => self.params.c_pre,
            SpikeKind::Post => self.params.c_post,
        };
        log::trace!("Synapse {}: calcium {} at {}", synapse.id(), state.c, time);
    }

    fn advance(&mut self, synapse: &mut Synapse, state: &mut Self::State, tick: &Tick) {
        state.decay_to(tick.end(), self.params.tau_c);
        // skipped ticks are integrated in one step
        let span = state.drift_span(tick);

        if self.params.noise_sigma > 0.0 {
            let z: f64 = self.rng.sample(StandardNormal);
            state.c += self.params.noise_sigma * span.sqrt() * z;
        }

        if !state.c.is_finite() {
            log::warn!(
                "Synapse {} reached a non-finite calcium concentration, reset to 0",
                synapse.id()
            );
            state.c = 0.0;
        }

        if let Some((target, rate)) = self.drift(state.c) {
            let w = target + (synapse.weight() - target) * (-rate * span).exp();
            synapse.move_weight(w);
        }
    }
}
