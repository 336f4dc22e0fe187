//! Synaptic handlers, i.e., the synapses feeding one post-synaptic target, and their tick interface.
//!
//! # Example
//!
//! ```rust
//! use rusty_synapse::clock::Tick;
//! use rusty_synapse::config::HandlerConfig;
//! use rusty_synapse::handler::{Process, StdpSynHandler};
//! use rusty_synapse::plasticity::stdp::{Stdp, StdpParams};
//! use rusty_synapse::synapse::Synapse;
//!
//! let mut handler = StdpSynHandler::new(
//!     HandlerConfig::new("exc").with_weight_bounds(0.0, 1.0),
//!     Stdp::new(StdpParams::default()),
//! );
//! let id = handler.add_synapse(Synapse::build(0.5, 1e-3, 0).unwrap());
//!
//! let mut tick = Tick::new(0, 1e-4);
//! handler.reinit(&tick).unwrap();
//!
//! handler.handle_event(id, 2e-4, 1.0);
//! let mut delivered: Vec<f64> = vec![];
//! for _ in 0..4 {
//!     handler.process(&tick, &mut delivered, None);
//!     tick = tick.next();
//! }
//! assert_eq!(delivered, vec![0.0, 0.5, 0.0, 0.0]);
//! ```
use crate::clock::Tick;
use crate::error::SynapseError;
use crate::plasticity::calcium::GraupnerBrunel;
use crate::plasticity::seq_stdp::SeqStdp;
use crate::plasticity::stdp::Stdp;
use crate::plasticity::NoPlasticity;
use crate::stream::StreamSink;

pub mod population;
pub mod synaptic_handler;

pub use population::Population;
pub use synaptic_handler::SynapticHandler;

/// Handler with static synapses.
pub type SimpleSynHandler = SynapticHandler<NoPlasticity>;
/// Handler with pair-based STDP synapses.
pub type StdpSynHandler = SynapticHandler<Stdp>;
/// Handler with sequence-dependent STDP synapses.
pub type SeqSynHandler = SynapticHandler<SeqStdp>;
/// Handler with calcium-based synapses.
pub type CalciumSynHandler = SynapticHandler<GraupnerBrunel>;

/// The calling contract of the scheduler: one reinit, then one process call per tick,
/// with monotonically increasing tick indices.
pub trait Process {
    /// Reset every state to its initial conditions and validate the configuration.
    fn reinit(&mut self, tick: &Tick) -> Result<(), SynapseError>;

    /// Advance by one tick, deliver the output to the target and optionally sample into the sink.
    /// Never fails: problems are logged and the simulation keeps going.
    fn process(
        &mut self,
        tick: &Tick,
        target: &mut dyn SynapticTarget,
        sink: Option<&mut dyn StreamSink>,
    );
}

/// The receiving side of a handler, e.g., a compartment accumulating synaptic current.
pub trait SynapticTarget {
    /// Receive the aggregated synaptic output of a tick. Called at most once per tick.
    fn deliver(&mut self, tick: &Tick, value: f64);
}

/// Keeps every delivered value, in tick order.
impl SynapticTarget for Vec<f64> {
    fn deliver(&mut self, _: &Tick, value: f64) {
        self.push(value);
    }
}

/// Accumulates every delivered value.
impl SynapticTarget for f64 {
    fn deliver(&mut self, _: &Tick, value: f64) {
        *self += value;
    }
}
