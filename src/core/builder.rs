use std::collections::VecDeque;
use std::sync::Arc;

use crate::{
    core::Config,
    events::{Event, EventDispatcher, EventKind},
    procedures::Procedure,
    subscribers::{Subscribe, SubscriberSet},
};

use super::{handle::Handle, sequencer::Sequencer};

/// Builder for constructing a [`Sequencer`] with handlers, subscribers and steps.
pub struct SequencerBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    dispatcher: EventDispatcher,
    procedures: VecDeque<Procedure>,
}

impl SequencerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            dispatcher: EventDispatcher::new(),
            procedures: VecDeque::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive every event through dedicated workers with bounded queues.
    /// Building with subscribers spawns their workers, so it must happen inside a
    /// Tokio runtime.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Binds a handler to one named event.
    pub fn on<F>(self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&Event, &Handle) + Send + Sync + 'static,
    {
        self.dispatcher.on(kind, handler);
        self
    }

    /// Binds the catch-all handler.
    pub fn on_other<F>(self, handler: F) -> Self
    where
        F: Fn(&str, &Event, &Handle) + Send + Sync + 'static,
    {
        self.dispatcher.on_other(handler);
        self
    }

    /// Appends a procedure to the initial queue.
    pub fn with_procedure(mut self, procedure: Procedure) -> Self {
        self.procedures.push_back(procedure);
        self
    }

    /// Builds and returns the sequencer.
    pub fn build(self) -> Sequencer {
        let subs = SubscriberSet::new(self.subscribers);
        Sequencer::from_parts(self.cfg, self.dispatcher, subs, self.procedures)
    }
}
