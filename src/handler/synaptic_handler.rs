//! Generic handler owning the synapses of one target and applying a plasticity rule to them.

use crate::clock::Tick;
use crate::config::HandlerConfig;
use crate::error::SynapseError;
use crate::event::{EventQueue, EventSource, SpikeEvent, SpikeKind};
use crate::plasticity::PlasticityRule;
use crate::stream::StreamSink;
use crate::synapse::{Synapse, SynapseId};

use super::{Process, SynapticTarget};

/// The synapses feeding one post-synaptic target, together with their plasticity rule.
///
/// Synapses are kept in insertion order, which is also the order of their weights in the sampled rows.
/// Events are queued by [`SynapticHandler::handle_event`] and only take effect on the next tick covering them.
#[derive(Debug, Clone)]
pub struct SynapticHandler<R: PlasticityRule> {
    config: HandlerConfig,
    rule: R,
    synapses: Vec<Synapse>,
    /// Rule state of every synapse, aligned with `synapses`.
    states: Vec<R::State>,
    queue: EventQueue,
    next_id: usize,
    /// Tick duration captured at the last successful reinit.
    dt: Option<f64>,
    /// False until a successful reinit, and again after any setter call.
    ready: bool,
    /// Whether the not-ready warning has been logged since the last change.
    warned: bool,
    last_tick: Option<u64>,
    last_output: f64,
}

impl<R: PlasticityRule> SynapticHandler<R> {
    /// Create an empty handler. It must be reinitialized before processing ticks.
    pub fn new(config: HandlerConfig, rule: R) -> Self {
        SynapticHandler {
            config,
            rule,
            synapses: vec![],
            states: vec![],
            queue: EventQueue::new(),
            next_id: 0,
            dt: None,
            ready: false,
            warned: false,
            last_tick: None,
            last_output: 0.0,
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect on the next reinit.
    pub fn set_config(&mut self, config: HandlerConfig) {
        self.config = config;
        self.invalidate();
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }

    /// Mutable access to the rule, e.g., to change its parameters. Takes effect on the next reinit.
    pub fn rule_mut(&mut self) -> &mut R {
        self.invalidate();
        &mut self.rule
    }

    fn invalidate(&mut self) {
        self.ready = false;
        self.warned = false;
    }

    /// Returns true if the handler has been reinitialized since its last change.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Returns the tick duration captured at the last reinit.
    pub fn dt(&self) -> Option<f64> {
        self.dt
    }

    /// Add a synapse and return its identifier.
    pub fn add_synapse(&mut self, mut synapse: Synapse) -> SynapseId {
        let id = SynapseId(self.next_id);
        self.next_id += 1;
        synapse.set_id(id);
        synapse.reinit(self.config.history_capacity);
        self.states.push(self.rule.init_state());
        self.synapses.push(synapse);
        id
    }

    /// Remove a synapse, keeping the order of the others.
    /// Returns `None` (and logs) if the synapse does not belong to the handler.
    /// Events already queued for the synapse are dropped when their tick comes.
    pub fn remove_synapse(&mut self, id: SynapseId) -> Option<Synapse> {
        match self.position(id) {
            Some(pos) => {
                self.states.remove(pos);
                Some(self.synapses.remove(pos))
            }
            None => {
                log::warn!(
                    "Handler {}: cannot remove unknown synapse {}",
                    self.config.name,
                    id
                );
                None
            }
        }
    }

    /// Position of a synapse; identifiers are increasing along the collection.
    fn position(&self, id: SynapseId) -> Option<usize> {
        self.synapses.binary_search_by_key(&id, |s| s.id()).ok()
    }

    pub fn synapse(&self, id: SynapseId) -> Option<&Synapse> {
        self.position(id).map(|pos| &self.synapses[pos])
    }

    /// Returns the rule state of a synapse.
    pub fn state(&self, id: SynapseId) -> Option<&R::State> {
        self.position(id).map(|pos| &self.states[pos])
    }

    /// Set the (initial) weight of a synapse. Takes effect on the next reinit.
    pub fn set_weight(&mut self, id: SynapseId, weight: f64) -> Result<(), SynapseError> {
        let pos = self.position(id).ok_or(SynapseError::SynapseNotFound(id))?;
        self.synapses[pos].set_weight(weight);
        self.invalidate();
        Ok(())
    }

    pub fn synapses(&self) -> &[Synapse] {
        &self.synapses
    }

    pub fn num_synapses(&self) -> usize {
        self.synapses.len()
    }

    /// Returns the current weights, in insertion order.
    pub fn weights(&self) -> Vec<f64> {
        self.synapses.iter().map(|s| s.weight()).collect()
    }

    pub fn num_pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Returns the output of the last processed tick.
    pub fn last_output(&self) -> f64 {
        self.last_output
    }

    /// Queue a spike arriving on a synapse at `arrival_time` (delay included).
    /// Events for unknown synapses or with a non-finite time are logged and dropped.
    pub fn handle_event(&mut self, id: SynapseId, arrival_time: f64, value: f64) {
        if self.position(id).is_none() {
            log::warn!(
                "Handler {}: dropped event for unknown synapse {}",
                self.config.name,
                id
            );
            return;
        }
        if !(arrival_time.is_finite() && value.is_finite()) {
            log::warn!(
                "Handler {}: dropped event at {} with value {} for synapse {}",
                self.config.name,
                arrival_time,
                value,
                id
            );
            return;
        }
        self.queue.push(SpikeEvent::pre(id, arrival_time, value));
    }

    /// Queue a spike of the post-synaptic target at time `time`.
    pub fn handle_post_spike(&mut self, time: f64) {
        if !time.is_finite() {
            log::warn!(
                "Handler {}: dropped post-synaptic spike at {}",
                self.config.name,
                time
            );
            return;
        }
        self.queue.push(SpikeEvent::post(time));
    }

    /// Validate the configuration and reset every state: weights, histories, rule states and pending events.
    /// On error, the handler stays unusable until a successful reinit.
    pub fn reinit(&mut self, tick: &Tick) -> Result<(), SynapseError> {
        self.ready = false;
        self.warned = false;
        tick.validate()?;
        self.config.validate()?;
        self.rule.validate()?;
        for synapse in self.synapses.iter() {
            if !(synapse.delay().is_finite() && synapse.delay() >= 0.0) {
                return Err(SynapseError::InvalidDelay(synapse.delay()));
            }
            if !synapse.initial_weight().is_finite() {
                return Err(SynapseError::InvalidParameter(format!(
                    "Synapse {} has a non-finite weight",
                    synapse.id()
                )));
            }
        }
        if self.synapses.is_empty() {
            log::warn!("Handler {} has no synapse", self.config.name);
        }

        self.queue.clear();
        self.rule.reinit();
        let capacity = self.config.history_capacity;
        self.synapses.iter_mut().for_each(|s| s.reinit(capacity));
        self.states = self.synapses.iter().map(|_| self.rule.init_state()).collect();
        self.dt = Some(tick.dt);
        self.last_tick = None;
        self.last_output = 0.0;
        self.ready = true;

        log::info!(
            "Handler {} ({}) reinitialized with {} synapses, dt = {}",
            self.config.name,
            self.rule.name(),
            self.synapses.len(),
            tick.dt
        );
        Ok(())
    }

    /// Advance the handler by one tick and return its output, i.e., the sum of `weight * value` over the
    /// pre-synaptic events of the tick, each weighted after the plastic update triggered by the event.
    ///
    /// Returns `None` when nothing must be delivered: the handler is not ready, or the tick was already processed.
    pub fn step(&mut self, tick: &Tick) -> Option<f64> {
        if !self.ready {
            if !self.warned {
                log::warn!(
                    "Handler {} is not initialized, ticks are ignored until reinit",
                    self.config.name
                );
                self.warned = true;
            }
            return None;
        }
        if let Some(last) = self.last_tick {
            if tick.index <= last {
                log::warn!(
                    "Handler {}: tick {} already processed",
                    self.config.name,
                    tick.index
                );
                return None;
            }
        }

        let dt = self.dt.unwrap_or(tick.dt);
        if tick.dt != dt {
            log::warn!(
                "Handler {}: tick duration {} differs from {} set at reinit",
                self.config.name,
                tick.dt,
                dt
            );
        }
        let tick = Tick::new(tick.index, dt);

        let mut output = 0.0;
        while let Some(event) = self.queue.pop_due(tick.end()) {
            if event.time < tick.start() {
                log::debug!(
                    "Handler {}: late event at {} processed in tick {}",
                    self.config.name,
                    event.time,
                    tick.index
                );
            }
            match event.source {
                EventSource::Pre(id) => match self.position(id) {
                    Some(pos) => {
                        let synapse = &mut self.synapses[pos];
                        synapse.record_event(event.time, event.value);
                        self.rule.on_event(
                            synapse,
                            &mut self.states[pos],
                            SpikeKind::Pre,
                            event.time,
                        );
                        synapse.sanitize_weight(self.config.weight_bounds.as_ref());
                        output += synapse.weight() * event.value;
                    }
                    None => log::warn!(
                        "Handler {}: dropped event for removed synapse {}",
                        self.config.name,
                        id
                    ),
                },
                EventSource::Post => {
                    for (synapse, state) in self.synapses.iter_mut().zip(self.states.iter_mut()) {
                        self.rule
                            .on_event(synapse, state, SpikeKind::Post, event.time);
                        synapse.sanitize_weight(self.config.weight_bounds.as_ref());
                    }
                }
            }
        }

        for (synapse, state) in self.synapses.iter_mut().zip(self.states.iter_mut()) {
            self.rule.advance(synapse, state, &tick);
            synapse.sanitize_weight(self.config.weight_bounds.as_ref());
        }

        if !output.is_finite() {
            log::warn!(
                "Handler {}: non-finite output at tick {}, replaced by 0",
                self.config.name,
                tick.index
            );
            output = 0.0;
        }

        self.last_tick = Some(tick.index);
        self.last_output = output;
        Some(output)
    }

    /// Names of the sampled columns, excluding the leading time column.
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(format!("{}.output", self.config.name))
            .chain(
                self.synapses
                    .iter()
                    .map(|s| format!("{}.w{}", self.config.name, s.id())),
            )
            .collect()
    }

    /// The sample of the last processed tick: time at the end of the tick, output, then the weights.
    pub fn sample_row(&self, tick: &Tick) -> Vec<f64> {
        std::iter::once(tick.end())
            .chain(std::iter::once(self.last_output))
            .chain(self.synapses.iter().map(|s| s.weight()))
            .collect()
    }

    fn sampling_due(&self, tick: &Tick) -> bool {
        match self.config.sample_interval {
            Some(interval) if interval > 0 => tick.index % interval == 0,
            _ => false,
        }
    }
}

impl<R: PlasticityRule> Process for SynapticHandler<R> {
    fn reinit(&mut self, tick: &Tick) -> Result<(), SynapseError> {
        SynapticHandler::reinit(self, tick)
    }

    fn process(
        &mut self,
        tick: &Tick,
        target: &mut dyn SynapticTarget,
        sink: Option<&mut dyn StreamSink>,
    ) {
        let output = match self.step(tick) {
            Some(output) => output,
            None => return,
        };
        target.deliver(tick, output);

        if let Some(sink) = sink {
            if self.sampling_due(tick) {
                let row = self.sample_row(&Tick::new(tick.index, self.dt.unwrap_or(tick.dt)));
                if let Err(e) = sink.append_row(&row) {
                    log::warn!(
                        "Handler {}: sample of tick {} dropped: {}",
                        self.config.name,
                        tick.index,
                        e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plasticity::stdp::{Stdp, StdpParams};
    use crate::plasticity::NoPlasticity;

    fn simple() -> SynapticHandler<NoPlasticity> {
        SynapticHandler::new(HandlerConfig::new("simple"), NoPlasticity)
    }

    #[test]
    fn test_add_remove_synapses() {
        let mut handler = simple();
        let ids: Vec<SynapseId> = (0..4)
            .map(|k| handler.add_synapse(Synapse::build(k as f64, 0.0, k).unwrap()))
            .collect();
        assert_eq!(ids, vec![SynapseId(0), SynapseId(1), SynapseId(2), SynapseId(3)]);

        let removed = handler.remove_synapse(SynapseId(1)).unwrap();
        assert_eq!(removed.weight(), 1.0);
        assert_eq!(handler.weights(), vec![0.0, 2.0, 3.0]);
        assert_eq!(handler.synapse(SynapseId(2)).unwrap().weight(), 2.0);
        assert!(handler.synapse(SynapseId(1)).is_none());
        assert!(handler.remove_synapse(SynapseId(1)).is_none());

        // identifiers are never reused
        let id = handler.add_synapse(Synapse::build(4.0, 0.0, 4).unwrap());
        assert_eq!(id, SynapseId(4));
        assert_eq!(handler.weights(), vec![0.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_unknown_synapse_event_is_dropped() {
        let mut handler = simple();
        let id = handler.add_synapse(Synapse::build(1.0, 0.0, 0).unwrap());
        let tick = Tick::new(0, 1.0);
        handler.reinit(&tick).unwrap();

        handler.handle_event(SynapseId(17), 0.5, 1.0);
        handler.handle_event(id, f64::NAN, 1.0);
        assert_eq!(handler.num_pending_events(), 0);

        handler.handle_event(id, 0.5, 2.0);
        assert_eq!(handler.step(&tick), Some(2.0));
    }

    #[test]
    fn test_event_of_removed_synapse_is_dropped() {
        let mut handler = simple();
        let a = handler.add_synapse(Synapse::build(1.0, 0.0, 0).unwrap());
        let b = handler.add_synapse(Synapse::build(10.0, 0.0, 1).unwrap());
        let tick = Tick::new(0, 1.0);
        handler.reinit(&tick).unwrap();

        handler.handle_event(a, 0.5, 1.0);
        handler.handle_event(b, 0.5, 1.0);
        handler.remove_synapse(a);
        assert_eq!(handler.step(&tick), Some(10.0));
        assert_eq!(handler.synapse(b).unwrap().last_event_time(), 0.5);
    }

    #[test]
    fn test_not_ready_until_reinit() {
        let mut handler = simple();
        handler.add_synapse(Synapse::build(1.0, 0.0, 0).unwrap());
        let tick = Tick::new(0, 1.0);
        assert_eq!(handler.step(&tick), None);

        handler.reinit(&tick).unwrap();
        assert!(handler.is_ready());
        assert_eq!(handler.step(&tick), Some(0.0));

        handler.set_config(HandlerConfig::new("renamed"));
        assert!(!handler.is_ready());
        assert_eq!(handler.step(&tick.next()), None);
    }

    #[test]
    fn test_reinit_errors() {
        let mut handler = simple();
        handler.add_synapse(Synapse::build(1.0, 0.0, 0).unwrap());
        assert_eq!(
            handler.reinit(&Tick::new(0, 0.0)),
            Err(SynapseError::InvalidTimeStep(0.0))
        );
        assert!(!handler.is_ready());

        handler.set_config(HandlerConfig::new("bad").with_weight_bounds(1.0, 0.0));
        assert!(handler.reinit(&Tick::new(0, 1.0)).is_err());

        let mut handler = SynapticHandler::new(
            HandlerConfig::new("stdp"),
            Stdp::new(StdpParams::default()),
        );
        handler.rule_mut().params_mut().tau_post = -1.0;
        assert!(matches!(
            handler.reinit(&Tick::new(0, 1.0)),
            Err(SynapseError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_empty_handler_is_noop() {
        let mut handler = simple();
        let mut tick = Tick::new(0, 1.0);
        handler.reinit(&tick).unwrap();
        let mut delivered: Vec<f64> = vec![];
        for _ in 0..3 {
            handler.process(&tick, &mut delivered, None);
            tick = tick.next();
        }
        assert_eq!(delivered, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_no_double_delivery() {
        let mut handler = simple();
        let id = handler.add_synapse(Synapse::build(1.0, 0.0, 0).unwrap());
        let tick = Tick::new(0, 1.0);
        handler.reinit(&tick).unwrap();
        handler.handle_event(id, 0.5, 1.0);

        let mut total = 0.0_f64;
        handler.process(&tick, &mut total, None);
        handler.process(&tick, &mut total, None);
        assert_eq!(total, 1.0);
    }

    #[test]
    fn test_weight_bounds_and_history() {
        let mut handler = SynapticHandler::new(
            HandlerConfig::new("stdp")
                .with_weight_bounds(0.0, 0.6)
                .with_history_capacity(2),
            Stdp::new(StdpParams {
                a_plus: 1.0,
                a_minus: 0.0,
                tau_pre: 1.0,
                tau_post: 1.0,
            }),
        );
        let id = handler.add_synapse(Synapse::build(0.5, 0.0, 0).unwrap());
        let tick = Tick::new(0, 1.0);
        handler.reinit(&tick).unwrap();

        handler.handle_post_spike(0.1);
        handler.handle_event(id, 0.2, 1.0);
        handler.handle_event(id, 0.3, 1.0);
        handler.handle_event(id, 0.4, 1.0);
        assert_eq!(handler.step(&tick), Some(0.6 + 0.6 + 0.6));

        let synapse = handler.synapse(id).unwrap();
        assert_eq!(synapse.weight(), 0.6);
        assert_eq!(synapse.history().to_vec(), vec![(0.3, 1.0), (0.4, 1.0)]);
        assert_eq!(synapse.last_event_time(), 0.4);
    }

    #[test]
    fn test_late_event_keeps_history_ordered() {
        let mut handler = simple();
        let id = handler.add_synapse(Synapse::build(1.0, 0.0, 0).unwrap());
        let tick = Tick::new(0, 1.0);
        handler.reinit(&tick).unwrap();

        handler.handle_event(id, 0.9, 1.0);
        assert_eq!(handler.step(&tick), Some(1.0));
        // arrives after its tick was processed, handled by the next one
        handler.handle_event(id, 0.5, 1.0);
        assert_eq!(handler.step(&tick.next()), Some(1.0));

        let synapse = handler.synapse(id).unwrap();
        assert_eq!(synapse.history().to_vec(), vec![(0.5, 1.0), (0.9, 1.0)]);
        assert_eq!(synapse.last_event_time(), 0.9);
    }

    #[test]
    fn test_sampling() {
        let mut handler = SynapticHandler::new(
            HandlerConfig::new("syn").with_sample_interval(2),
            NoPlasticity,
        );
        let id = handler.add_synapse(Synapse::build(0.5, 0.0, 0).unwrap());
        handler.add_synapse(Synapse::build(-1.0, 0.0, 1).unwrap());
        assert_eq!(handler.columns(), vec!["syn.output", "syn.w0", "syn.w1"]);

        let mut tick = Tick::new(0, 0.5);
        handler.reinit(&tick).unwrap();
        handler.handle_event(id, 0.25, 2.0);

        let mut rows: Vec<Vec<f64>> = vec![];
        let mut target: Vec<f64> = vec![];
        for _ in 0..4 {
            handler.process(&tick, &mut target, Some(&mut rows));
            tick = tick.next();
        }
        assert_eq!(rows, vec![vec![0.5, 1.0, 0.5, -1.0], vec![1.5, 0.0, 0.5, -1.0]]);
    }

    #[test]
    fn test_set_weight() {
        let mut handler = simple();
        let id = handler.add_synapse(Synapse::build(0.5, 0.0, 0).unwrap());
        handler.set_weight(id, 2.0).unwrap();
        assert_eq!(
            handler.set_weight(SynapseId(9), 1.0),
            Err(SynapseError::SynapseNotFound(SynapseId(9)))
        );
        handler.reinit(&Tick::new(0, 1.0)).unwrap();
        assert_eq!(handler.weights(), vec![2.0]);
    }
}
