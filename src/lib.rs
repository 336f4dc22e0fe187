//! This crate provides the synapse and plasticity layer of a tick-driven spiking neural simulation.
//!
//! Spikes are delivered with per-connection delays onto the synapses of a handler, which aggregates them
//! into one output per tick for its post-synaptic target, while evolving the synaptic weights according to
//! a plasticity rule.
//!
//! # Building Handlers
//!
//! ```rust
//! use rusty_synapse::config::HandlerConfig;
//! use rusty_synapse::handler::CalciumSynHandler;
//! use rusty_synapse::plasticity::calcium::{CalciumParams, GraupnerBrunel};
//! use rusty_synapse::synapse::Synapse;
//!
//! let mut handler = CalciumSynHandler::new(
//!     HandlerConfig::new("dend").with_weight_bounds(0.0, 1.0),
//!     GraupnerBrunel::new(CalciumParams::default()),
//! );
//! handler.add_synapse(Synapse::build(0.5, 1e-3, 0).unwrap());
//! handler.add_synapse(Synapse::build(0.2, 2e-3, 1).unwrap());
//!
//! assert_eq!(handler.num_synapses(), 2);
//! ```
//!
//! # Running Handlers
//!
//! The scheduler calls [`handler::Process::reinit`] once, then [`handler::Process::process`] once per tick.
//! Event sources queue spikes at any time with [`handler::SynapticHandler::handle_event`]; they take effect
//! on the first tick whose end is not before their arrival time.
//!
//! ```rust
//! use rusty_synapse::clock::Tick;
//! use rusty_synapse::config::HandlerConfig;
//! use rusty_synapse::handler::{Process, SimpleSynHandler};
//! use rusty_synapse::plasticity::NoPlasticity;
//! use rusty_synapse::synapse::Synapse;
//!
//! let mut handler = SimpleSynHandler::new(HandlerConfig::new("soma"), NoPlasticity);
//! let id = handler.add_synapse(Synapse::build(-0.5, 0.0, 0).unwrap());
//!
//! let tick = Tick::new(0, 1e-3);
//! handler.reinit(&tick).unwrap();
//! handler.handle_event(id, 5e-4, 1.0);
//!
//! let mut current = 0.0_f64;
//! handler.process(&tick, &mut current, None);
//! assert_eq!(current, -0.5);
//! ```
//!
//! # Streaming Samples
//!
//! Handlers configured with a sample interval append `[time, output, weights...]` rows to a
//! [`stream::StreamSink`], such as the file-backed [`stream::streamer::Streamer`].

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod plasticity;
pub mod rolling;
pub mod stream;
pub mod synapse;

/// Minimum number of handlers to step a population in parallel.
pub const MIN_PARALLEL_HANDLERS: usize = 8;
/// Default number of recent events kept per synapse.
pub const DEFAULT_HISTORY_CAPACITY: usize = 64;
