use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::trace;

use crate::answer::Answer;

pub const NAMESPACE: &str = "formplayer";
pub const ANSWER: &str = "formplayer.answer";
pub const NEW_REPEAT: &str = "formplayer.new-repeat";
pub const DELETE_REPEAT: &str = "formplayer.delete-repeat";

/// Payload of a `formplayer.answer` notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerEvent {
    pub ix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<String>,
    pub answer: Answer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Answer(AnswerEvent),
    NewRepeat { ix: String },
    DeleteRepeat { ix: String },
}

impl Notification {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Answer(_) => ANSWER,
            Self::NewRepeat { .. } => NEW_REPEAT,
            Self::DeleteRepeat { .. } => DELETE_REPEAT,
        }
    }
}

pub type Handler = Arc<dyn Fn(&Notification) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    namespace: String,
    handler: Handler,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// Publish/subscribe hub shared by the questions of a form and the session
/// playing it. A subscription to `formplayer` receives every
/// `formplayer.*` topic; a subscription to a full topic receives only that one.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusState>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, namespace: impl Into<String>, handler: Handler) -> SubscriptionId {
        let mut state = self.state();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        state.subscribers.push(Subscriber {
            id,
            namespace: namespace.into(),
            handler,
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state();
        let before = state.subscribers.len();
        state.subscribers.retain(|subscriber| subscriber.id != id);
        state.subscribers.len() != before
    }

    /// Drops every subscription registered under `namespace`.
    pub fn unsubscribe_namespace(&self, namespace: &str) -> usize {
        let mut state = self.state();
        let before = state.subscribers.len();
        state
            .subscribers
            .retain(|subscriber| subscriber.namespace != namespace);
        before - state.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    /// Delivers `notification` to matching subscribers and returns how many
    /// were called. Handlers run after the bus lock is released.
    pub fn publish(&self, notification: &Notification) -> usize {
        let topic = notification.topic();
        let handlers: Vec<Handler> = self
            .state()
            .subscribers
            .iter()
            .filter(|subscriber| matches_topic(&subscriber.namespace, topic))
            .map(|subscriber| Arc::clone(&subscriber.handler))
            .collect();
        trace!(topic, subscribers = handlers.len(), "publishing notification");
        for handler in &handlers {
            handler(notification);
        }
        handlers.len()
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn matches_topic(namespace: &str, topic: &str) -> bool {
    topic == namespace
        || topic
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with('.'))
}
