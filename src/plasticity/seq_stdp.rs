//! Sequence-dependent STDP.
//!
//! On top of the pair-based rule, the handler keeps a window of the last pre-synaptic spikes received
//! by any of its synapses, each tagged with the target index of the synapse it arrived on.
//! When a pre-synaptic spike arrives at time `t` on a synapse with target index `i`, every earlier spike
//! of the window at time `t_k` on target index `j` contributes
//!
//! `sign(i - j) * exp(-(t - t_k) / tau_seq) / (r + 1)`
//!
//! to a sequence score, where `r` is the rank of that spike in the window (0 for the most recent).
//! Spikes on the same target index, or coincident with the triggering one, contribute nothing.
//! Sequences sweeping through increasing target indices (causal order) thus score positively and
//! reversed ones negatively. The weight then changes by `seq_gain * score`, after the pair-based update.
//! The triggering spike finally enters the window, evicting the oldest one once the window is full.
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::stdp::{stdp_update, StdpParams, StdpState};
use super::{check_finite, check_time_constant, PlasticityRule};
use crate::config::{load_json, save_json};
use crate::error::SynapseError;
use crate::event::SpikeKind;
use crate::rolling::RollingBuffer;
use crate::synapse::Synapse;

/// Parameters of the sequence-dependent STDP rule.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct SeqStdpParams {
    /// Parameters of the underlying pair-based rule.
    pub stdp: StdpParams,
    /// Number of recent pre-synaptic spikes kept in the window.
    pub window: usize,
    /// Time constant weighting the age of the spikes in the window.
    pub tau_seq: f64,
    /// Gain applied to the sequence score.
    pub seq_gain: f64,
}

impl Default for SeqStdpParams {
    fn default() -> Self {
        SeqStdpParams {
            stdp: StdpParams::default(),
            window: 8,
            tau_seq: 10e-3,
            seq_gain: 0.005,
        }
    }
}

impl SeqStdpParams {
    pub fn validate(&self) -> Result<(), SynapseError> {
        self.stdp.validate()?;
        if self.window == 0 {
            return Err(SynapseError::InvalidParameter(
                "Sequence window must hold at least one spike".to_string(),
            ));
        }
        check_time_constant("tau_seq", self.tau_seq)?;
        check_finite("seq_gain", self.seq_gain)?;
        Ok(())
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SynapseError> {
        save_json(self, path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SynapseError> {
        load_json(path)
    }
}

/// The sequence-dependent STDP rule, shared by all synapses of a handler.
#[derive(Debug, PartialEq, Clone)]
pub struct SeqStdp {
    params: SeqStdpParams,
    /// Recent pre-synaptic spikes as (time, target index).
    window: RollingBuffer,
}

impl Default for SeqStdp {
    fn default() -> Self {
        SeqStdp::new(SeqStdpParams::default())
    }
}

impl SeqStdp {
    pub fn new(params: SeqStdpParams) -> Self {
        SeqStdp {
            params,
            window: RollingBuffer::new(params.window),
        }
    }

    pub fn params(&self) -> &SeqStdpParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut SeqStdpParams {
        &mut self.params
    }

    /// Returns the window of recent pre-synaptic spikes as (time, target index), oldest first.
    pub fn window(&self) -> &RollingBuffer {
        &self.window
    }

    /// Returns the sequence score of a spike at time `t` on target index `target_index`.
    pub fn sequence_score(&self, target_index: usize, t: f64) -> f64 {
        self.window
            .iter()
            .rev()
            .enumerate()
            .filter(|(_, (tk, _))| *tk < t)
            .map(|(rank, (tk, index))| {
                let direction = match (index as usize).cmp(&target_index) {
                    std::cmp::Ordering::Less => 1.0,
                    std::cmp::Ordering::Greater => -1.0,
                    std::cmp::Ordering::Equal => 0.0,
                };
                direction * (-(t - tk) / self.params.tau_seq).exp() / (rank + 1) as f64
            })
            .sum()
    }
}

impl PlasticityRule for SeqStdp {
    type State = StdpState;

    fn name(&self) -> &'static str {
        "seq-stdp"
    }

    fn validate(&self) -> Result<(), SynapseError> {
        self.params.validate()
    }

    fn init_state(&self) -> Self::State {
        StdpState::default()
    }

    fn reinit(&mut self) {
        if self.window.capacity() == self.params.window {
            self.window.clear();
        } else {
            self.window.reset(self.params.window);
        }
    }

    fn on_event(
        &mut self,
        synapse: &mut Synapse,
        state: &mut Self::State,
        kind: SpikeKind,
        time: f64,
    ) {
        stdp_update(&self.params.stdp, synapse, state, kind, time);

        if kind == SpikeKind::Pre {
            let score = self.sequence_score(synapse.target_index(), time);
            synapse.add_weight(self.params.seq_gain * score);
            self.window.push(time, synapse.target_index() as f64);
            log::trace!(
                "Synapse {}: sequence score {} at {}",
                synapse.id(),
                score,
                time
            );
        }
    }
}
