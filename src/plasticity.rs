//! Plasticity rules, i.e., how synaptic weights evolve with spike timing.
//!
//! This module provides the [`PlasticityRule`] trait and the following rules:
//!
//! - [`NoPlasticity`]: static weights
//! - [`stdp::Stdp`]: pair-based spike-timing-dependent plasticity with exact trace decay
//! - [`seq_stdp::SeqStdp`]: STDP rewarding causally ordered pre-synaptic sequences
//! - [`calcium::GraupnerBrunel`]: calcium-based bistable plasticity
//!
//! A rule is injected into a generic handler (see [`crate::handler`]), which owns one rule state per synapse
//! and calls the rule for every event and once per tick for every synapse.
use std::fmt;

use crate::clock::Tick;
use crate::error::SynapseError;
use crate::event::SpikeKind;
use crate::synapse::Synapse;

pub mod calcium;
pub mod seq_stdp;
pub mod stdp;

pub trait PlasticityRule: fmt::Debug {
    /// The state attached to every synapse.
    type State: fmt::Debug + Clone;

    /// A short name of the rule, used in logs.
    fn name(&self) -> &'static str;

    /// Check the rule parameters.
    fn validate(&self) -> Result<(), SynapseError>;

    /// The initial state of a synapse.
    fn init_state(&self) -> Self::State;

    /// Reset the rule-level state, e.g., histories shared between synapses.
    fn reinit(&mut self) {}

    /// Update the synapse on a pre- or post-synaptic spike at the given time.
    fn on_event(
        &mut self,
        synapse: &mut Synapse,
        state: &mut Self::State,
        kind: SpikeKind,
        time: f64,
    );

    /// Advance the continuous-time dynamics of the synapse by one tick.
    #[allow(unused_variables)]
    fn advance(&mut self, synapse: &mut Synapse, state: &mut Self::State, tick: &Tick) {}
}

/// Static synapses: weights never change.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct NoPlasticity;

impl PlasticityRule for NoPlasticity {
    type State = ();

    fn name(&self) -> &'static str {
        "simple"
    }

    fn validate(&self) -> Result<(), SynapseError> {
        Ok(())
    }

    fn init_state(&self) -> Self::State {}

    fn on_event(&mut self, _: &mut Synapse, _: &mut Self::State, _: SpikeKind, _: f64) {}
}

/// Check that a time constant is finite and positive.
pub(crate) fn check_time_constant(name: &str, tau: f64) -> Result<(), SynapseError> {
    if !(tau.is_finite() && tau > 0.0) {
        return Err(SynapseError::InvalidParameter(format!(
            "{} must be finite and positive, got {}",
            name, tau
        )));
    }
    Ok(())
}

/// Check that a parameter is finite.
pub(crate) fn check_finite(name: &str, value: f64) -> Result<(), SynapseError> {
    if !value.is_finite() {
        return Err(SynapseError::InvalidParameter(format!(
            "{} must be finite, got {}",
            name, value
        )));
    }
    Ok(())
}
