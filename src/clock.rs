//! Simulation clock ticks handed to handlers by the scheduler.

use serde::{Deserialize, Serialize};

use crate::error::SynapseError;

/// One discrete step of the global simulation clock.
/// The tick with index `k` covers the half-open interval `[k * dt, (k + 1) * dt)`,
/// but events landing exactly on its end are still drained by it.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct Tick {
    /// The index of the tick, monotonically increasing over a run.
    pub index: u64,
    /// The duration of a tick.
    pub dt: f64,
}

impl Tick {
    pub fn new(index: u64, dt: f64) -> Self {
        Tick { index, dt }
    }

    /// Returns an error if the tick duration is not finite and positive.
    pub fn validate(&self) -> Result<(), SynapseError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(SynapseError::InvalidTimeStep(self.dt));
        }
        Ok(())
    }

    /// Returns the simulated time at which the tick starts.
    pub fn start(&self) -> f64 {
        self.index as f64 * self.dt
    }

    /// Returns the simulated time at which the tick ends.
    pub fn end(&self) -> f64 {
        (self.index + 1) as f64 * self.dt
    }

    /// Returns the following tick.
    pub fn next(&self) -> Self {
        Tick {
            index: self.index + 1,
            dt: self.dt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_bounds() {
        let tick = Tick::new(3, 0.5);
        assert_eq!(tick.start(), 1.5);
        assert_eq!(tick.end(), 2.0);
        assert_eq!(tick.next().start(), 2.0);
    }

    #[test]
    fn test_tick_validate() {
        assert!(Tick::new(0, 1e-4).validate().is_ok());
        assert_eq!(Tick::new(0, 0.0).validate(), Err(SynapseError::InvalidTimeStep(0.0)));
        assert_eq!(Tick::new(0, -1.0).validate(), Err(SynapseError::InvalidTimeStep(-1.0)));
        assert!(Tick::new(0, f64::NAN).validate().is_err());
    }
}
