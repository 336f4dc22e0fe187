//! Pair-based spike-timing-dependent plasticity.
//!
//! Each synapse keeps a pre- and a post-synaptic trace. A trace jumps by one on every spike of its side
//! and decays exponentially in between. Decay is evaluated from the exact elapsed time since the last
//! update, so the result does not depend on the tick duration and only depends on spike time differences.
//!
//! On a pre-synaptic spike, the weight changes by `a_plus * post_trace`, then the pre trace is incremented.
//! On a post-synaptic spike, the weight changes by `-a_minus * pre_trace`, then the post trace is incremented.
//! Negative amplitudes flip the sign of the corresponding change.
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{check_finite, check_time_constant, PlasticityRule};
use crate::config::{load_json, save_json};
use crate::error::SynapseError;
use crate::event::SpikeKind;
use crate::synapse::Synapse;

/// Parameters of the STDP rule.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct StdpParams {
    /// Amplitude of the change applied on a pre-synaptic spike, scaled by the post trace.
    pub a_plus: f64,
    /// Amplitude of the depression applied on a post-synaptic spike, scaled by the pre trace.
    pub a_minus: f64,
    /// Time constant of the pre-synaptic trace.
    pub tau_pre: f64,
    /// Time constant of the post-synaptic trace.
    pub tau_post: f64,
}

impl Default for StdpParams {
    fn default() -> Self {
        StdpParams {
            a_plus: 0.01,
            a_minus: 0.0105,
            tau_pre: 20e-3,
            tau_post: 20e-3,
        }
    }
}

impl StdpParams {
    pub fn validate(&self) -> Result<(), SynapseError> {
        check_finite("a_plus", self.a_plus)?;
        check_finite("a_minus", self.a_minus)?;
        check_time_constant("tau_pre", self.tau_pre)?;
        check_time_constant("tau_post", self.tau_post)?;
        Ok(())
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SynapseError> {
        save_json(self, path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SynapseError> {
        load_json(path)
    }
}

/// An exponentially decaying trace, evaluated lazily.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Trace {
    value: f64,
    last_update: f64,
}

impl Default for Trace {
    fn default() -> Self {
        Trace {
            value: 0.0,
            last_update: f64::NEG_INFINITY,
        }
    }
}

impl Trace {
    /// Returns the trace value at time `t`.
    /// Times before the last update are treated as the last update itself.
    pub fn at(&self, t: f64, tau: f64) -> f64 {
        if self.value == 0.0 {
            return 0.0;
        }
        let elapsed = (t - self.last_update).max(0.0);
        self.value * (-elapsed / tau).exp()
    }

    /// Decay the trace up to time `t` and add `amount`.
    pub fn bump(&mut self, t: f64, tau: f64, amount: f64) {
        self.value = self.at(t, tau) + amount;
        self.last_update = self.last_update.max(t);
    }

    pub fn last_update(&self) -> f64 {
        self.last_update
    }
}

/// Per-synapse state of the STDP rule.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct StdpState {
    pub pre: Trace,
    pub post: Trace,
}

/// The STDP rule.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Stdp {
    params: StdpParams,
}

impl Stdp {
    pub fn new(params: StdpParams) -> Self {
        Stdp { params }
    }

    pub fn params(&self) -> &StdpParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut StdpParams {
        &mut self.params
    }

    /// Returns the pre-synaptic trace of a synapse at time `t`.
    pub fn pre_trace(&self, state: &StdpState, t: f64) -> f64 {
        state.pre.at(t, self.params.tau_pre)
    }

    /// Returns the post-synaptic trace of a synapse at time `t`.
    pub fn post_trace(&self, state: &StdpState, t: f64) -> f64 {
        state.post.at(t, self.params.tau_post)
    }
}

/// Apply the pair-based update of the given parameters. Shared with the sequence rule.
pub(crate) fn stdp_update(
    params: &StdpParams,
    synapse: &mut Synapse,
    state: &mut StdpState,
    kind: SpikeKind,
    time: f64,
) {
    match kind {
        SpikeKind::Pre => {
            let dw = params.a_plus * state.post.at(time, params.tau_post);
            synapse.add_weight(dw);
            state.pre.bump(time, params.tau_pre, 1.0);
            log::trace!("Synapse {}: pre spike at {}, dw = {}", synapse.id(), time, dw);
        }
        SpikeKind::Post => {
            let dw = -params.a_minus * state.pre.at(time, params.tau_pre);
            synapse.add_weight(dw);
            state.post.bump(time, params.tau_post, 1.0);
            log::trace!("Synapse {}: post spike at {}, dw = {}", synapse.id(), time, dw);
        }
    }
}

impl PlasticityRule for Stdp {
    type State = StdpState;

    fn name(&self) -> &'static str {
        "stdp"
    }

    fn validate(&self) -> Result<(), SynapseError> {
        self.params.validate()
    }

    fn init_state(&self) -> Self::State {
        StdpState::default()
    }

    fn on_event(
        &mut self,
        synapse: &mut Synapse,
        state: &mut Self::State,
        kind: SpikeKind,
        time: f64,
    ) {
        stdp_update(&self.params, synapse, state, kind, time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> StdpParams {
        StdpParams {
            a_plus: 0.01,
            a_minus: 0.02,
            tau_pre: 20.0,
            tau_post: 10.0,
        }
    }

    #[test]
    fn test_trace_decay() {
        let mut trace = Trace::default();
        assert_eq!(trace.at(5.0, 1.0), 0.0);
        trace.bump(1.0, 2.0, 1.0);
        assert_eq!(trace.at(1.0, 2.0), 1.0);
        assert!((trace.at(3.0, 2.0) - (-1.0_f64).exp()).abs() < 1e-15);
        // earlier times do not grow the trace
        assert_eq!(trace.at(0.0, 2.0), 1.0);

        trace.bump(3.0, 2.0, 1.0);
        assert!((trace.at(3.0, 2.0) - (1.0 + (-1.0_f64).exp())).abs() < 1e-15);
        assert_eq!(trace.last_update(), 3.0);
    }

    #[test]
    fn test_pre_then_post() {
        let mut rule = Stdp::new(params());
        let mut synapse = Synapse::build(0.5, 1.0, 0).unwrap();
        let mut state = rule.init_state();

        rule.on_event(&mut synapse, &mut state, SpikeKind::Pre, 10.0);
        assert_eq!(synapse.weight(), 0.5);

        rule.on_event(&mut synapse, &mut state, SpikeKind::Post, 12.0);
        let expected = 0.5 - 0.02 * (-2.0_f64 / 20.0).exp();
        assert!((synapse.weight() - expected).abs() < 1e-15);
    }

    #[test]
    fn test_post_then_pre() {
        let mut rule = Stdp::new(params());
        let mut synapse = Synapse::build(0.5, 1.0, 0).unwrap();
        let mut state = rule.init_state();

        rule.on_event(&mut synapse, &mut state, SpikeKind::Post, 10.0);
        assert_eq!(synapse.weight(), 0.5);

        rule.on_event(&mut synapse, &mut state, SpikeKind::Pre, 15.0);
        let expected = 0.5 + 0.01 * (-5.0_f64 / 10.0).exp();
        assert!((synapse.weight() - expected).abs() < 1e-15);
        assert!((rule.pre_trace(&state, 15.0) - 1.0).abs() < 1e-15);
        assert!((rule.post_trace(&state, 15.0) - (-0.5_f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn test_translation_invariance() {
        let run = |offset: f64| {
            let mut rule = Stdp::new(params());
            let mut synapse = Synapse::build(0.5, 0.0, 0).unwrap();
            let mut state = rule.init_state();
            let mut deltas = vec![];
            for (kind, t) in [
                (SpikeKind::Pre, 1.0),
                (SpikeKind::Post, 4.0),
                (SpikeKind::Pre, 9.0),
                (SpikeKind::Post, 9.5),
                (SpikeKind::Post, 30.0),
            ] {
                let before = synapse.weight();
                rule.on_event(&mut synapse, &mut state, kind, t + offset);
                deltas.push(synapse.weight() - before);
            }
            deltas
        };

        let reference = run(0.0);
        for offset in [128.0, 4096.0, -64.0] {
            run(offset)
                .iter()
                .zip(reference.iter())
                .for_each(|(a, b)| assert!((a - b).abs() < 1e-12));
        }
    }

    #[test]
    fn test_validate() {
        assert!(Stdp::new(params()).validate().is_ok());
        let mut rule = Stdp::new(params());
        rule.params_mut().tau_pre = 0.0;
        assert!(rule.validate().is_err());
        rule.params_mut().tau_pre = 1.0;
        rule.params_mut().a_plus = f64::NAN;
        assert!(rule.validate().is_err());
    }
}
