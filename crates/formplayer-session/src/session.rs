//! Form lifecycle against a formplayer server.
//!
//! A [`FormSession`] turns question notifications into server requests,
//! queues them through a [`TaskQueue`] so that at most one is in flight, and
//! tracks a [`BlockingStatus`] that rises with each outstanding request and
//! falls once the matching response has been handled.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use anyhow::anyhow;
use formplayer_entry::bus::NAMESPACE;
use formplayer_entry::{
    Answer, AnswerOutcome, EventBus, Form, Notification, RawAnswer, SubscriptionId,
};
use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::blocking::{Activity, BlockingStatus};
use crate::config::SessionConfig;
use crate::envelope::{Action, Request, Response, answer_task_name};
use crate::error::{SessionError, TransportError};
use crate::errors::{ErrorReport, FailureReport};
use crate::handler::SessionHandler;
use crate::task_queue::{TaskFuture, TaskQueue};
use crate::transport::{Transport, endpoint};

/// Runs once a successful response arrives; an `Err` is reported through
/// [`SessionHandler::on_error`].
pub type ResponseCallback = Box<dyn FnOnce(&FormSession, &Response) -> anyhow::Result<()> + Send>;

struct Inner {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn SessionHandler>,
    queue: TaskQueue,
    bus: EventBus,
    subscription: Mutex<Option<SubscriptionId>>,
    session_id: Mutex<Option<String>>,
    // Never held while the bus publishes or a handler hook runs.
    form: Mutex<Option<Form>>,
    activity: watch::Sender<Activity>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let subscription = self
            .subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = subscription {
            self.bus.unsubscribe(id);
        }
    }
}

/// Handle to a playing form. Clones share the same session.
#[derive(Clone)]
pub struct FormSession {
    inner: Arc<Inner>,
}

impl FormSession {
    /// Session on its own event bus.
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        handler: Arc<dyn SessionHandler>,
    ) -> Self {
        Self::with_bus(config, transport, handler, EventBus::new())
    }

    /// Session listening on `bus`. A bus drives one session at a time: this
    /// session replaces whichever one was attached to `bus` before.
    pub fn with_bus(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        handler: Arc<dyn SessionHandler>,
        bus: EventBus,
    ) -> Self {
        let (activity, _) = watch::channel(Activity::default());
        let session = Self {
            inner: Arc::new(Inner {
                config,
                transport,
                handler,
                queue: TaskQueue::new(),
                bus,
                subscription: Mutex::new(None),
                session_id: Mutex::new(None),
                form: Mutex::new(None),
                activity,
            }),
        };
        session.subscribe();
        session
    }

    fn subscribe(&self) {
        let bus = &self.inner.bus;
        let replaced = bus.unsubscribe_namespace(NAMESPACE);
        if replaced > 0 {
            debug!(replaced, "detached previous session from bus");
        }
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let id = bus.subscribe(
            NAMESPACE,
            Arc::new(move |notification: &Notification| {
                if let Some(inner) = weak.upgrade() {
                    FormSession { inner }.on_notification(notification);
                }
            }),
        );
        *lock(&self.inner.subscription) = Some(id);
    }

    fn on_notification(&self, notification: &Notification) {
        match notification {
            Notification::Answer(event) => {
                self.answer(&event.ix, &event.answer);
            }
            Notification::NewRepeat { ix } => {
                self.new_repeat(ix);
            }
            Notification::DeleteRepeat { ix } => {
                self.delete_repeat(ix);
            }
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn task_queue(&self) -> &TaskQueue {
        &self.inner.queue
    }

    pub fn session_id(&self) -> Option<String> {
        lock(&self.inner.session_id).clone()
    }

    pub fn blocking_status(&self) -> BlockingStatus {
        self.inner.activity.borrow().status()
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.activity.borrow().pending()
    }

    pub fn watch_activity(&self) -> watch::Receiver<Activity> {
        self.inner.activity.subscribe()
    }

    /// Resolves once no request is outstanding.
    pub async fn idle(&self) {
        let mut activity = self.inner.activity.subscribe();
        // the sender lives as long as `self`, so this cannot fail
        let _ = activity.wait_for(Activity::is_idle).await;
    }

    pub fn has_form(&self) -> bool {
        lock(&self.inner.form).is_some()
    }

    /// Runs `f` against the loaded form. Answer through
    /// [`FormSession::answer_question`] rather than `Form::answer` inside `f`,
    /// so the answer is published once the form is unlocked.
    pub fn with_form<R>(&self, f: impl FnOnce(&mut Form) -> R) -> Option<R> {
        lock(&self.inner.form).as_mut().map(f)
    }

    /// Sets a question's raw value. A changed answer is published on the bus,
    /// after the form is unlocked, and sent to the server from there.
    pub fn answer_question(
        &self,
        ix: &str,
        raw: impl Into<RawAnswer>,
    ) -> Result<AnswerOutcome, SessionError> {
        let raw = raw.into();
        let (outcome, notification) = self
            .with_form(|form| form.stage_answer(ix, raw))
            .ok_or(SessionError::NoForm)??;
        if let Some(notification) = notification {
            self.inner.bus.publish(&notification);
        }
        Ok(outcome)
    }

    /// Queues `action`. Returns `false` when the request is refused because
    /// a blocking request is outstanding.
    pub fn server_request(
        &self,
        action: Action,
        callback: Option<ResponseCallback>,
        blocking: BlockingStatus,
    ) -> bool {
        let accepted = self.transition(|activity| {
            if activity.status() == BlockingStatus::All {
                return false;
            }
            activity.register(blocking);
            true
        });
        if !accepted {
            debug!(
                action = action.name(),
                "request suppressed while input is blocked"
            );
            return false;
        }

        let ticket = RequestTicket {
            session: Arc::downgrade(&self.inner),
            level: blocking,
        };
        let weak = Arc::downgrade(&self.inner);
        self.inner.queue.add_task(action.task_name(), move || -> TaskFuture {
            let Some(inner) = weak.upgrade() else {
                return async { Ok(()) }.boxed();
            };
            let session = FormSession { inner };
            let name = action.name();
            let request = session.envelope(action);
            let url = endpoint(&session.inner.config.xform_url, name);
            let transport = Arc::clone(&session.inner.transport);
            async move {
                let result = match url {
                    Ok(url) => transport.post(&url, &request).await,
                    Err(err) => Err(err),
                };
                match result {
                    Ok(response) => session.handle_success(&response, name, callback),
                    Err(err) => session.handle_failure(&err, name),
                }
                drop(ticket);
                Ok(())
            }
            .boxed()
        });
        true
    }

    fn envelope(&self, action: Action) -> Request {
        let config = &self.inner.config;
        Request {
            action,
            session_id: self.session_id(),
            domain: config.domain.clone(),
            username: config.username.clone(),
            restore_as: config.restore_as.clone(),
        }
    }

    pub fn load_form(&self) -> bool {
        let config = &self.inner.config;
        let action = Action::NewForm {
            form_url: config.form_url.clone(),
            session_data: config.session_data.clone(),
            lang: config.lang.clone(),
        };
        self.server_request(
            action,
            Some(Box::new(|session: &FormSession, response: &Response| {
                let bus = session.inner.bus.clone();
                let tree = response.tree.as_deref().unwrap_or_default();
                let form = Form::from_tree(tree, bus)?.with_title(response.title.clone());
                *lock(&session.inner.form) = Some(form);
                session.inner.handler.on_load(response);
                Ok(())
            })),
            BlockingStatus::All,
        )
    }

    /// Sends the answer of question `ix`. An answer for the same question
    /// that is still waiting in the queue is dropped in favour of this one.
    pub fn answer(&self, ix: &str, answer: &Answer) -> bool {
        if self.blocking_status() == BlockingStatus::All {
            debug!(ix, "answer suppressed while input is blocked");
            return false;
        }
        let superseded = self.inner.queue.clear_tasks(Some(&answer_task_name(ix)));
        if superseded > 0 {
            debug!(ix, superseded, "replaced queued answer");
        }
        let question = ix.to_string();
        self.server_request(
            Action::Answer {
                ix: ix.to_string(),
                answer: answer.clone(),
            },
            Some(Box::new(move |session: &FormSession, response: &Response| {
                if response.is_validation_error() {
                    let message = response.validation_error().message();
                    return session.set_server_error(&question, message);
                }
                session.apply_tree(response)?;
                session.apply_errors(response)
            })),
            BlockingStatus::Submit,
        )
    }

    pub fn new_repeat(&self, ix: &str) -> bool {
        self.structural(Action::NewRepeat { ix: ix.to_string() })
    }

    pub fn delete_repeat(&self, ix: &str) -> bool {
        self.structural(Action::DeleteRepeat { ix: ix.to_string() })
    }

    pub fn change_lang(&self, lang: &str) -> bool {
        self.structural(Action::ChangeLang {
            lang: lang.to_string(),
        })
    }

    fn structural(&self, action: Action) -> bool {
        self.server_request(
            action,
            Some(Box::new(|session: &FormSession, response: &Response| {
                session.apply_tree(response)
            })),
            BlockingStatus::All,
        )
    }

    /// Submits every answered question. A newer validation report replaces
    /// the questions' server errors.
    pub fn submit_form(&self) -> bool {
        let (answers, prevalidated) = self
            .with_form(|form| (form.answers(), form.errors().is_empty()))
            .unwrap_or_default();
        self.server_request(
            Action::SubmitAll {
                answers,
                prevalidated,
            },
            Some(Box::new(|session: &FormSession, response: &Response| {
                if response.is_validation_error() {
                    return session.apply_errors(response);
                }
                session.inner.handler.on_submit(response);
                Ok(())
            })),
            BlockingStatus::All,
        )
    }

    pub fn evaluate_xpath(&self, xpath: &str, callback: ResponseCallback) -> bool {
        self.server_request(
            Action::EvaluateXpath {
                xpath: xpath.to_string(),
            },
            Some(callback),
            BlockingStatus::None,
        )
    }

    /// Interprets a response that arrived.
    pub fn handle_success(
        &self,
        response: &Response,
        action: &str,
        callback: Option<ResponseCallback>,
    ) {
        if response.is_error() {
            debug!(action, "server reported an error");
            self.inner
                .handler
                .on_error(&ErrorReport::from_response(response));
            return;
        }
        self.adopt_session_id(response, action);
        let Some(callback) = callback else {
            return;
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| callback(self, response)))
            .unwrap_or_else(|payload| Err(anyhow!("panicked: {}", panic_message(&*payload))));
        if let Err(err) = result {
            warn!(action, error = %err, "response callback failed");
            self.inner.handler.on_error(&ErrorReport::from_callback(&err));
        }
    }

    /// Interprets a request that produced no usable response.
    pub fn handle_failure(&self, error: &TransportError, action: &str) {
        warn!(action, %error, "request failed");
        let report = ErrorReport::from_failure(error);
        self.report_failure(action, &report);
        self.inner.handler.on_error(&report);
    }

    fn report_failure(&self, action: &str, report: &ErrorReport) {
        let Some(url) = self.inner.config.error_report_url.clone() else {
            return;
        };
        let failure = FailureReport {
            action: action.to_string(),
            session_id: self.session_id(),
            message: report.human_readable_message.clone(),
        };
        let transport = Arc::clone(&self.inner.transport);
        tokio::spawn(async move {
            if let Err(err) = transport.report_error(&url, &failure).await {
                warn!(error = %err, "could not report failed request");
            }
        });
    }

    fn adopt_session_id(&self, response: &Response, action: &str) {
        let Some(id) = response.session_id.as_ref() else {
            return;
        };
        let mut current = lock(&self.inner.session_id);
        if current.is_none() || action == "new-form" {
            debug!(session_id = %id, "adopted session id");
            *current = Some(id.clone());
        }
    }

    fn apply_tree(&self, response: &Response) -> anyhow::Result<()> {
        let Some(tree) = response.tree.as_deref() else {
            return Ok(());
        };
        if let Some(result) = self.with_form(|form| form.reconcile(tree)) {
            result?;
        }
        Ok(())
    }

    fn apply_errors(&self, response: &Response) -> anyhow::Result<()> {
        let Some(errors) = response.errors.as_ref() else {
            return Ok(());
        };
        for (ix, error) in errors {
            self.set_server_error(ix, error.message())?;
        }
        Ok(())
    }

    fn set_server_error(&self, ix: &str, message: String) -> anyhow::Result<()> {
        if let Some(result) = self.with_form(|form| form.set_server_error(ix, Some(message))) {
            result?;
        }
        Ok(())
    }

    /// Applies `change` to the activity counters and fires the handler hooks
    /// for whatever moved.
    fn transition(&self, change: impl FnOnce(&mut Activity) -> bool) -> bool {
        transition(&self.inner, change)
    }
}

fn transition(inner: &Inner, change: impl FnOnce(&mut Activity) -> bool) -> bool {
    let mut before = Activity::default();
    let mut after = Activity::default();
    let modified = inner.activity.send_if_modified(|activity| {
        before = *activity;
        let modified = change(activity);
        after = *activity;
        modified
    });
    if !modified {
        return false;
    }
    let handler = &inner.handler;
    if before.is_idle() && !after.is_idle() {
        handler.on_loading();
    }
    if before.status() != after.status() {
        debug!(from = %before.status(), to = %after.status(), "blocking status changed");
        handler.on_blocking_changed(after.status());
    }
    if !before.is_idle() && after.is_idle() {
        handler.on_loading_complete();
    }
    true
}

/// One outstanding request. Releasing it, by handling the response or by
/// the queued task being cleared, lowers the blocking status.
struct RequestTicket {
    session: Weak<Inner>,
    level: BlockingStatus,
}

impl Drop for RequestTicket {
    fn drop(&mut self) {
        if let Some(inner) = self.session.upgrade() {
            let level = self.level;
            transition(&inner, |activity| {
                activity.release(level);
                true
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for FormSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSession")
            .field("session_id", &self.session_id())
            .field("activity", &*self.inner.activity.borrow())
            .field("queue", &self.inner.queue)
            .finish()
    }
}
