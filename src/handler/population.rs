//! A population of independent handlers sharing the same plasticity rule type.
//!
//! Handlers own disjoint synapses and targets, so they can be stepped in parallel.
//! Outputs are collected and delivered in handler order, hence the result does not depend on thread scheduling.
use rayon::prelude::*;

use crate::clock::Tick;
use crate::error::SynapseError;
use crate::plasticity::PlasticityRule;
use crate::MIN_PARALLEL_HANDLERS;

use super::{SynapticHandler, SynapticTarget};

#[derive(Debug, Clone)]
pub struct Population<R: PlasticityRule> {
    handlers: Vec<SynapticHandler<R>>,
}

impl<R: PlasticityRule> Default for Population<R> {
    fn default() -> Self {
        Population { handlers: vec![] }
    }
}

impl<R> Population<R>
where
    R: PlasticityRule + Send,
    R::State: Send,
{
    pub fn new() -> Self {
        Population::default()
    }

    /// Add a handler and return its index.
    pub fn push(&mut self, handler: SynapticHandler<R>) -> usize {
        self.handlers.push(handler);
        self.handlers.len() - 1
    }

    pub fn handler(&self, index: usize) -> Option<&SynapticHandler<R>> {
        self.handlers.get(index)
    }

    pub fn handler_mut(&mut self, index: usize) -> Option<&mut SynapticHandler<R>> {
        self.handlers.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SynapticHandler<R>> + '_ {
        self.handlers.iter()
    }

    /// Reinitialize every handler, stopping at the first configuration error.
    pub fn reinit(&mut self, tick: &Tick) -> Result<(), SynapseError> {
        self.handlers
            .iter_mut()
            .try_for_each(|handler| handler.reinit(tick))
    }

    /// Step every handler by one tick and return their outputs, in handler order.
    pub fn step(&mut self, tick: &Tick) -> Vec<Option<f64>> {
        if self.handlers.len() >= MIN_PARALLEL_HANDLERS {
            self.handlers
                .par_iter_mut()
                .map(|handler| handler.step(tick))
                .collect()
        } else {
            self.handlers
                .iter_mut()
                .map(|handler| handler.step(tick))
                .collect()
        }
    }

    /// Step every handler and deliver its output to the target of the same index.
    pub fn process<T: SynapticTarget>(&mut self, tick: &Tick, targets: &mut [T]) {
        if targets.len() != self.handlers.len() {
            log::warn!(
                "Population of {} handlers processed with {} targets",
                self.handlers.len(),
                targets.len()
            );
        }
        let outputs = self.step(tick);
        outputs
            .into_iter()
            .zip(targets.iter_mut())
            .for_each(|(output, target)| {
                if let Some(output) = output {
                    target.deliver(tick, output);
                }
            });
    }
}
