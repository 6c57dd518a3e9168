//! The `Context` drives a simulation: it owns simulated time, a queue of timed
//! plans, a queue of immediate callbacks, the data containers registered by
//! each module, and typed event subscriptions.
//!
//! A day of the epidemic model is one plan. Change notifications (dataset
//! advanced, stockpile changed, threshold crossed) are events, and every
//! subscribed handler runs as a callback before the next plan executes.
use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::data_plugin::DataPlugin;
use crate::hashing::HashMap;
use crate::plan::{PlanId, Queue};
use crate::trace;

/// The order in which plans scheduled for the same time are executed
///
/// `Last` plans observe the state left by every `Normal` plan at that time,
/// which is where reports and monitors hook in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExecutionPhase {
    First,
    Normal,
    Last,
}

/// Marker for types that can be emitted through `Context::emit_event`
pub trait ModelEvent: Clone + 'static {}

type Callback = dyn FnOnce(&mut Context);
type EventHandler<E> = dyn Fn(&mut Context, E);

pub struct Context {
    plan_queue: Queue<Box<Callback>, ExecutionPhase>,
    callback_queue: VecDeque<Box<Callback>>,
    event_handlers: HashMap<TypeId, Box<dyn Any>>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    current_time: f64,
    shutdown_requested: bool,
}

impl Context {
    #[must_use]
    pub fn new() -> Context {
        Context {
            plan_queue: Queue::new(),
            callback_queue: VecDeque::new(),
            event_handlers: HashMap::default(),
            data_plugins: HashMap::default(),
            current_time: 0.0,
            shutdown_requested: false,
        }
    }

    /// Add a plan to be executed at `time` in the `Normal` phase
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite, or earlier than the current time.
    pub fn add_plan(&mut self, time: f64, callback: impl FnOnce(&mut Context) + 'static) -> PlanId {
        self.add_plan_with_phase(time, callback, ExecutionPhase::Normal)
    }

    /// Add a plan to be executed at `time` in the given phase
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite, or earlier than the current time.
    pub fn add_plan_with_phase(
        &mut self,
        time: f64,
        callback: impl FnOnce(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) -> PlanId {
        assert!(
            !time.is_nan() && !time.is_infinite() && time >= self.current_time,
            "Invalid time value"
        );
        self.plan_queue.add_plan(time, Box::new(callback), phase)
    }

    /// Cancel a plan that has not executed yet
    ///
    /// # Panics
    ///
    /// Panics if the plan was already cancelled or executed.
    pub fn cancel_plan(&mut self, id: &PlanId) {
        assert!(
            self.plan_queue.cancel_plan(id).is_some(),
            "Plan does not exist"
        );
    }

    pub fn queue_callback(&mut self, callback: impl FnOnce(&mut Context) + 'static) {
        self.callback_queue.push_back(Box::new(callback));
    }

    /// Register a handler that is called with every emitted event of type `E`
    pub fn subscribe_to_event<E: ModelEvent>(
        &mut self,
        handler: impl Fn(&mut Context, E) + 'static,
    ) {
        let handlers = self
            .event_handlers
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<Rc<EventHandler<E>>>::new()) as Box<dyn Any>);
        let handlers: &mut Vec<Rc<EventHandler<E>>> = handlers.downcast_mut().unwrap();
        handlers.push(Rc::new(handler));
    }

    /// Emit an event to every subscribed handler
    ///
    /// Handlers are queued as callbacks, so they run after the current plan or
    /// callback returns and before the next plan.
    pub fn emit_event<E: ModelEvent>(&mut self, event: E) {
        let Context {
            event_handlers,
            callback_queue,
            ..
        } = self;
        if let Some(handlers) = event_handlers.get(&TypeId::of::<E>()) {
            let handlers: &Vec<Rc<EventHandler<E>>> = handlers.downcast_ref().unwrap();
            for handler in handlers {
                let handler = Rc::clone(handler);
                let event = event.clone();
                callback_queue.push_back(Box::new(move |context| handler(context, event)));
            }
        }
    }

    /// Returns the data container for `T`, creating it if this is the first access
    pub fn get_data_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        self.data_plugins
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::create_data_container()) as Box<dyn Any>)
            .downcast_mut::<T::DataContainer>()
            .unwrap()
    }

    /// Returns the data container for `T` if it has been created
    #[must_use]
    pub fn get_data<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|container| container.downcast_ref::<T::DataContainer>())
    }

    #[must_use]
    pub fn get_current_time(&self) -> f64 {
        self.current_time
    }

    /// Stop executing plans once the current plan and its callbacks complete
    pub fn shutdown(&mut self) {
        trace!("shutdown requested at t={}", self.current_time);
        self.shutdown_requested = true;
    }

    pub fn execute(&mut self) {
        loop {
            if self.shutdown_requested {
                break;
            }

            // If there is a callback, run it.
            if let Some(callback) = self.callback_queue.pop_front() {
                callback(self);
                continue;
            }

            // There aren't any callbacks, so look at the first plan.
            if let Some(plan) = self.plan_queue.get_next_plan() {
                self.current_time = plan.time;
                (plan.data)(self);
            } else {
                // OK, there aren't any plans, so we're done.
                break;
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
