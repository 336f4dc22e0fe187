//! Module implementing the concept of a synapse, i.e., a weighted and delayed connection onto a target.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SynapseError;
use crate::rolling::RollingBuffer;

/// Identifier of a synapse within its handler.
/// Identifiers are assigned in increasing order and never reused, so they stay valid across removals.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct SynapseId(pub usize);

impl fmt::Display for SynapseId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed interval to which plastic weights are clamped after each update.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct WeightBounds {
    pub min: f64,
    pub max: f64,
}

impl WeightBounds {
    /// Create weight bounds, returning an error if they are not finite or if `min > max`.
    pub fn build(min: f64, max: f64) -> Result<Self, SynapseError> {
        let bounds = WeightBounds { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), SynapseError> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            return Err(SynapseError::InvalidWeightBounds {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    pub fn clamp(&self, weight: f64) -> f64 {
        weight.clamp(self.min, self.max)
    }
}

/// A single connection feeding one site of a post-synaptic target.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Synapse {
    /// Identifier within the owning handler, assigned on insertion.
    id: SynapseId,
    /// Current (signed) weight of the synapse.
    weight: f64,
    /// Weight restored on every reinit.
    initial_weight: f64,
    /// Transmission delay, already applied by the event source.
    delay: f64,
    /// Post-synaptic site fed by the synapse.
    target_index: usize,
    /// Latest time among the processed events.
    last_event_time: f64,
    /// Recent (time, event value) history of the synapse.
    history: RollingBuffer,
}

impl Synapse {
    /// Create a new synapse with the specified parameters.
    /// Returns an error if the delay is negative or not finite, or if the weight is not finite.
    /// The identifier is assigned once the synapse is added to a handler.
    pub fn build(weight: f64, delay: f64, target_index: usize) -> Result<Self, SynapseError> {
        if !(delay.is_finite() && delay >= 0.0) {
            return Err(SynapseError::InvalidDelay(delay));
        }
        if !weight.is_finite() {
            return Err(SynapseError::InvalidParameter(format!(
                "Synapse weight must be finite, got {}",
                weight
            )));
        }

        Ok(Synapse {
            id: SynapseId(0),
            weight,
            initial_weight: weight,
            delay,
            target_index,
            last_event_time: f64::NEG_INFINITY,
            history: RollingBuffer::new(0),
        })
    }

    /// Returns the identifier of the synapse.
    pub fn id(&self) -> SynapseId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: SynapseId) {
        self.id = id;
    }

    /// Returns the current weight of the synapse.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Returns the weight the synapse is reset to on reinit.
    pub fn initial_weight(&self) -> f64 {
        self.initial_weight
    }

    /// Set both the current and the initial weight of the synapse.
    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
        self.initial_weight = weight;
    }

    /// Returns the delay of the synapse.
    pub fn delay(&self) -> f64 {
        self.delay
    }

    /// Returns the post-synaptic site fed by the synapse.
    pub fn target_index(&self) -> usize {
        self.target_index
    }

    /// Returns the latest time among the processed events, or negative infinity if none.
    pub fn last_event_time(&self) -> f64 {
        self.last_event_time
    }

    /// Returns the recent event history of the synapse.
    pub fn history(&self) -> &RollingBuffer {
        &self.history
    }

    /// Returns the exponentially decayed sum of the recent event values.
    pub fn activity(&self, now: f64, tau: f64) -> f64 {
        self.history.decayed_sum(now, tau)
    }

    /// Apply a weight change.
    pub fn add_weight(&mut self, delta: f64) {
        self.weight += delta;
    }

    /// Move the weight to a new value, e.g., a relaxation towards a fixed point.
    pub fn move_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    /// Bring the weight back into the bounds, and back to its initial value if it is not finite.
    /// Returns true if the weight had to be reset.
    pub(crate) fn sanitize_weight(&mut self, bounds: Option<&WeightBounds>) -> bool {
        let mut reset = false;
        if !self.weight.is_finite() {
            log::warn!(
                "Synapse {} reached a non-finite weight, reset to {}",
                self.id,
                self.initial_weight
            );
            self.weight = self.initial_weight;
            reset = true;
        }
        if let Some(bounds) = bounds {
            self.weight = bounds.clamp(self.weight);
        }
        reset
    }

    /// Record an event in the synapse history. A late event does not move `last_event_time` backwards.
    pub(crate) fn record_event(&mut self, time: f64, value: f64) {
        self.history.push(time, value);
        self.last_event_time = self.last_event_time.max(time);
    }

    /// Restore the initial weight and clear the history.
    pub(crate) fn reinit(&mut self, history_capacity: usize) {
        self.weight = self.initial_weight;
        self.last_event_time = f64::NEG_INFINITY;
        if self.history.capacity() == history_capacity {
            self.history.clear();
        } else {
            self.history.reset(history_capacity);
        }
    }
}
