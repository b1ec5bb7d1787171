use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Semaphore;
use url::Url;

use formplayer_entry::{Answer, AnswerEvent, AnswerOutcome, EventBus, Notification};
use formplayer_session::{
    Action, BLOCK_ALL, BLOCK_NONE, BLOCK_SUBMIT, BlockingStatus, CALLBACK_ERROR, ErrorReport,
    FailureReport, FormSession, Request, Response, ResponseCallback, SessionConfig,
    SessionHandler, Status, TIMEOUT_ERROR, Transport, TransportError,
};

/// Transport whose responses are released one at a time by `respond`.
struct FakeTransport {
    gate: Semaphore,
    requests: Mutex<Vec<(Url, Value)>>,
    script: Mutex<VecDeque<Result<Response, TransportError>>>,
    reports: Mutex<Vec<FailureReport>>,
}

impl FakeTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            requests: Mutex::default(),
            script: Mutex::default(),
            reports: Mutex::default(),
        })
    }

    fn respond(&self, count: usize) {
        self.gate.add_permits(count);
    }

    fn script(&self, outcome: Result<Response, TransportError>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    fn requests(&self) -> Vec<(Url, Value)> {
        self.requests.lock().unwrap().clone()
    }

    fn bodies(&self) -> Vec<Value> {
        self.requests().into_iter().map(|(_, body)| body).collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn post(&self, url: &Url, request: &Request) -> Result<Response, TransportError> {
        let body = serde_json::to_value(request).expect("request serializes");
        self.requests.lock().unwrap().push((url.clone(), body));
        self.gate
            .acquire()
            .await
            .expect("gate stays open")
            .forget();
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(response(json!({ "status": "success", "session_id": "my-session" })))
        })
    }

    async fn report_error(&self, _url: &Url, report: &FailureReport) -> Result<(), TransportError> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingHandler {
    errors: Mutex<Vec<ErrorReport>>,
    statuses: Mutex<Vec<BlockingStatus>>,
    loads: AtomicUsize,
    submits: AtomicUsize,
    loading: AtomicUsize,
    loading_complete: AtomicUsize,
}

impl RecordingHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn errors(&self) -> Vec<ErrorReport> {
        self.errors.lock().unwrap().clone()
    }

    fn statuses(&self) -> Vec<BlockingStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

impl SessionHandler for RecordingHandler {
    fn on_load(&self, _response: &Response) {
        self.loads.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, report: &ErrorReport) {
        self.errors.lock().unwrap().push(report.clone());
    }

    fn on_submit(&self, _response: &Response) {
        self.submits.fetch_add(1, Ordering::SeqCst);
    }

    fn on_loading(&self) {
        self.loading.fetch_add(1, Ordering::SeqCst);
    }

    fn on_loading_complete(&self) {
        self.loading_complete.fetch_add(1, Ordering::SeqCst);
    }

    fn on_blocking_changed(&self, status: BlockingStatus) {
        self.statuses.lock().unwrap().push(status);
    }
}

fn response(value: Value) -> Response {
    serde_json::from_value(value).expect("response json parses")
}

fn config() -> SessionConfig {
    let mut config = SessionConfig::new(
        Url::parse("http://xform.url/").unwrap(),
        "http://example.org/forms/registration.xml",
    );
    config.domain = Some("demo".into());
    config
}

fn callback(
    f: impl FnOnce(&FormSession, &Response) -> anyhow::Result<()> + Send + 'static,
) -> Option<ResponseCallback> {
    Some(Box::new(f))
}

fn text_question(ix: &str, answer: Value) -> Value {
    json!({
        "caption": "name",
        "binding": "/data/name",
        "type": "question",
        "ix": ix,
        "datatype": "str",
        "required": 1,
        "relevant": 1,
        "style": null,
        "answer": answer
    })
}

async fn settle(session: &FormSession) {
    tokio::time::timeout(Duration::from_secs(2), session.idle())
        .await
        .expect("session did not settle");
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition was not reached in time");
}

fn answer_event(ix: &str, answer: Answer) -> Notification {
    Notification::Answer(AnswerEvent {
        ix: ix.into(),
        binding: None,
        answer,
    })
}

#[tokio::test]
async fn queues_requests_until_the_response_arrives() {
    let transport = FakeTransport::new();
    let handler = RecordingHandler::new();
    let session = FormSession::new(config(), transport.clone(), handler.clone());

    let action = Action::EvaluateXpath {
        xpath: "/data/name".into(),
    };
    assert!(session.server_request(action, None, BLOCK_NONE));
    assert_eq!(session.blocking_status(), BLOCK_NONE);
    assert!(session.task_queue().is_busy());
    assert_eq!(session.pending_requests(), 1);

    transport.respond(1);
    settle(&session).await;
    eventually(|| !session.task_queue().is_busy()).await;

    assert_eq!(session.blocking_status(), BLOCK_NONE);
    assert!(handler.statuses().is_empty());
    assert_eq!(handler.loading.load(Ordering::SeqCst), 1);
    assert_eq!(handler.loading_complete.load(Ordering::SeqCst), 1);
    assert_eq!(
        transport.requests()[0].0.as_str(),
        "http://xform.url/evaluate-xpath"
    );
}

#[tokio::test]
async fn only_the_newest_session_on_a_bus_reacts() {
    let bus = EventBus::new();
    let first_transport = FakeTransport::new();
    let second_transport = FakeTransport::new();
    let first = FormSession::with_bus(
        config(),
        first_transport.clone(),
        RecordingHandler::new(),
        bus.clone(),
    );
    let second = FormSession::with_bus(
        config(),
        second_transport.clone(),
        RecordingHandler::new(),
        bus.clone(),
    );

    assert_eq!(bus.publish(&Notification::NewRepeat { ix: "0J".into() }), 1);
    assert_eq!(first.pending_requests(), 0);
    assert_eq!(second.pending_requests(), 1);

    second_transport.respond(1);
    settle(&second).await;
    assert!(first_transport.requests().is_empty());
    assert_eq!(second_transport.requests().len(), 1);
    assert_eq!(bus.subscriber_count(), 1);
}

#[tokio::test]
async fn sessions_on_separate_buses_react_independently() {
    let left_bus = EventBus::new();
    let right_bus = EventBus::new();
    let left = FormSession::with_bus(
        config(),
        FakeTransport::new(),
        RecordingHandler::new(),
        left_bus.clone(),
    );
    let right = FormSession::with_bus(
        config(),
        FakeTransport::new(),
        RecordingHandler::new(),
        right_bus.clone(),
    );

    left_bus.publish(&Notification::NewRepeat { ix: "0J".into() });
    assert_eq!(left.blocking_status(), BLOCK_ALL);
    assert_eq!(right.blocking_status(), BLOCK_NONE);

    right_bus.publish(&answer_event("1", Answer::Int(4)));
    assert_eq!(right.blocking_status(), BLOCK_SUBMIT);
}

#[tokio::test]
async fn dropping_a_session_unsubscribes_it() {
    let bus = EventBus::new();
    let session = FormSession::with_bus(
        config(),
        FakeTransport::new(),
        RecordingHandler::new(),
        bus.clone(),
    );
    assert_eq!(bus.subscriber_count(), 1);
    drop(session);
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn blocks_requests_while_a_repeat_is_added() {
    let bus = EventBus::new();
    let transport = FakeTransport::new();
    let handler = RecordingHandler::new();
    let session = FormSession::with_bus(config(), transport.clone(), handler.clone(), bus.clone());

    bus.publish(&Notification::NewRepeat { ix: "0J".into() });
    assert_eq!(session.blocking_status(), BLOCK_ALL);

    // a second structural change is refused, as is anything else
    bus.publish(&Notification::NewRepeat { ix: "0J".into() });
    assert!(!session.new_repeat("0J"));
    assert!(!session.answer("1", &Answer::Int(3)));

    transport.respond(1);
    settle(&session).await;

    assert_eq!(session.blocking_status(), BLOCK_NONE);
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(transport.bodies()[0]["action"], "new-repeat");
    assert_eq!(handler.statuses(), vec![BLOCK_ALL, BLOCK_NONE]);
}

#[tokio::test]
async fn answers_do_not_block_further_answers() {
    let bus = EventBus::new();
    let transport = FakeTransport::new();
    let handler = RecordingHandler::new();
    let session = FormSession::with_bus(config(), transport.clone(), handler.clone(), bus.clone());

    bus.publish(&answer_event("3", Answer::Int(1)));
    assert_eq!(session.blocking_status(), BLOCK_SUBMIT);

    bus.publish(&answer_event("3", Answer::Int(2)));
    assert_eq!(session.pending_requests(), 2);

    transport.respond(2);
    settle(&session).await;

    assert_eq!(session.blocking_status(), BLOCK_NONE);
    let bodies = transport.bodies();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["answer"], 1);
    assert_eq!(bodies[1]["answer"], 2);
    assert_eq!(handler.statuses(), vec![BLOCK_SUBMIT, BLOCK_NONE]);
}

#[tokio::test]
async fn queued_answer_is_replaced_by_a_newer_one() {
    let transport = FakeTransport::new();
    let session = FormSession::new(config(), transport.clone(), RecordingHandler::new());

    let busy = Action::EvaluateXpath {
        xpath: "today()".into(),
    };
    session.server_request(busy, None, BLOCK_NONE);
    session.answer("0", &Answer::Int(1));
    session.answer("0", &Answer::Int(2));
    assert_eq!(session.task_queue().len(), 1);
    assert_eq!(session.pending_requests(), 2);

    transport.respond(2);
    settle(&session).await;

    let bodies = transport.bodies();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[1]["action"], "answer");
    assert_eq!(bodies[1]["answer"], 2);
}

#[tokio::test]
async fn clearing_a_queued_request_releases_its_block() {
    let transport = FakeTransport::new();
    let session = FormSession::new(config(), transport.clone(), RecordingHandler::new());

    let busy = Action::EvaluateXpath {
        xpath: "today()".into(),
    };
    session.server_request(busy, None, BLOCK_NONE);
    session.answer("1", &Answer::Int(1));
    assert_eq!(session.blocking_status(), BLOCK_SUBMIT);

    assert_eq!(session.task_queue().clear_tasks(None), 1);
    assert_eq!(session.blocking_status(), BLOCK_NONE);
    assert_eq!(session.pending_requests(), 1);

    transport.respond(1);
    settle(&session).await;
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn callback_failure_is_reported_as_an_error() {
    let handler = RecordingHandler::new();
    let session = FormSession::new(config(), FakeTransport::new(), handler.clone());

    session.handle_success(
        &Response::default(),
        "action",
        callback(|_, _| Err(anyhow!("boom"))),
    );

    let errors = handler.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].human_readable_message.starts_with(CALLBACK_ERROR));
    assert!(!errors[0].is_html);
}

#[tokio::test]
async fn error_response_skips_the_callback() {
    let handler = RecordingHandler::new();
    let session = FormSession::new(config(), FakeTransport::new(), handler.clone());
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);

    let failed = response(json!({
        "status": "error",
        "human_readable_message": "<b>Form is broken</b>",
        "is_html": true
    }));
    session.handle_success(
        &failed,
        "action",
        callback(move |_, _| {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }),
    );

    assert!(!called.load(Ordering::SeqCst));
    assert_eq!(
        handler.errors(),
        vec![ErrorReport {
            human_readable_message: "<b>Form is broken</b>".into(),
            is_html: true,
        }]
    );
}

#[tokio::test]
async fn failed_request_uses_the_body_message() {
    let handler = RecordingHandler::new();
    let session = FormSession::new(config(), FakeTransport::new(), handler.clone());

    let error = TransportError::Http {
        status: 500,
        body: Some(json!({ "message": "error" })),
    };
    session.handle_failure(&error, "action");

    assert_eq!(handler.errors(), vec![ErrorReport::text("error")]);
}

#[tokio::test]
async fn failed_request_without_body_gets_generic_message() {
    let handler = RecordingHandler::new();
    let session = FormSession::new(config(), FakeTransport::new(), handler.clone());

    session.handle_failure(&TransportError::Network("connection refused".into()), "answer");

    let errors = handler.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].human_readable_message.contains("connection refused"));
}

#[tokio::test]
async fn timeout_reports_the_timeout_message_once() {
    let handler = RecordingHandler::new();
    let session = FormSession::new(config(), FakeTransport::new(), handler.clone());

    session.handle_failure(&TransportError::Timeout, "action");

    assert_eq!(
        handler.errors(),
        vec![ErrorReport {
            human_readable_message: TIMEOUT_ERROR.into(),
            is_html: false,
        }]
    );
}

#[tokio::test]
async fn transport_failure_unblocks_and_advances_the_queue() {
    let transport = FakeTransport::new();
    let handler = RecordingHandler::new();
    let session = FormSession::new(config(), transport.clone(), handler.clone());
    transport.script(Err(TransportError::Timeout));

    session.new_repeat("0J");
    transport.respond(1);
    settle(&session).await;

    assert_eq!(session.blocking_status(), BLOCK_NONE);
    assert_eq!(handler.errors(), vec![ErrorReport::timeout()]);

    assert!(session.new_repeat("0J"));
    transport.respond(1);
    settle(&session).await;
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn failures_are_reported_when_configured() {
    let transport = FakeTransport::new();
    let mut config = config();
    config.error_report_url = Some(Url::parse("http://xform.url/report").unwrap());
    let session = FormSession::new(config, transport.clone(), RecordingHandler::new());

    session.handle_failure(&TransportError::Timeout, "submit-all");

    eventually(|| !transport.reports.lock().unwrap().is_empty()).await;
    let reports = transport.reports.lock().unwrap().clone();
    assert_eq!(reports[0].action, "submit-all");
    assert_eq!(reports[0].message, TIMEOUT_ERROR);
}

#[tokio::test]
async fn session_id_is_set_once_the_form_loads() {
    let transport = FakeTransport::new();
    let handler = RecordingHandler::new();
    let session = FormSession::new(config(), transport.clone(), handler.clone());

    assert!(session.load_form());
    assert_eq!(session.session_id(), None);
    assert_eq!(session.blocking_status(), BLOCK_ALL);

    transport.respond(1);
    settle(&session).await;

    assert_eq!(session.session_id().as_deref(), Some("my-session"));
    assert_eq!(handler.loads.load(Ordering::SeqCst), 1);
    assert!(session.has_form());

    let body = &transport.bodies()[0];
    assert_eq!(body["action"], "new-form");
    assert_eq!(body["form-url"], "http://example.org/forms/registration.xml");
    assert_eq!(body["domain"], "demo");
    assert!(body.get("session-id").is_none());
}

#[tokio::test]
async fn only_new_form_replaces_an_adopted_session_id() {
    let session = FormSession::new(config(), FakeTransport::new(), RecordingHandler::new());
    let with_id = |id: &str| response(json!({ "status": "success", "session_id": id }));

    session.handle_success(&with_id("first"), "answer", None);
    session.handle_success(&with_id("second"), "answer", None);
    assert_eq!(session.session_id().as_deref(), Some("first"));

    session.handle_success(&with_id("third"), "new-form", None);
    assert_eq!(session.session_id().as_deref(), Some("third"));
}

#[tokio::test]
async fn answering_a_loaded_form_round_trips_through_the_server() {
    let transport = FakeTransport::new();
    let session = FormSession::new(config(), transport.clone(), RecordingHandler::new());
    transport.script(Ok(response(json!({
        "status": "success",
        "session_id": "abc",
        "title": "Registration",
        "tree": [text_question("0", Value::Null)]
    }))));
    transport.script(Ok(response(json!({
        "status": "validation-error",
        "type": "constraint",
        "reason": "Too short"
    }))));

    session.load_form();
    transport.respond(1);
    settle(&session).await;
    assert_eq!(
        session.with_form(|form| form.title().map(str::to_string)),
        Some(Some("Registration".to_string()))
    );

    let outcome = session.answer_question("0", "Al").unwrap();
    assert_eq!(outcome, AnswerOutcome::Changed);
    assert_eq!(session.blocking_status(), BLOCK_SUBMIT);

    transport.respond(1);
    settle(&session).await;

    assert_eq!(
        transport.bodies()[1],
        json!({
            "action": "answer",
            "ix": "0",
            "answer": "Al",
            "session-id": "abc",
            "domain": "demo"
        })
    );
    let server_error = session.with_form(|form| {
        form.question("0")
            .and_then(|question| question.server_error().map(str::to_string))
    });
    assert_eq!(server_error, Some(Some("Too short".to_string())));
}

#[tokio::test]
async fn submit_sends_answers_and_applies_validation_errors() {
    let transport = FakeTransport::new();
    let handler = RecordingHandler::new();
    let session = FormSession::new(config(), transport.clone(), handler.clone());
    transport.script(Ok(response(json!({
        "status": "success",
        "session_id": "abc",
        "tree": [text_question("0", json!("Ada")), text_question("1", Value::Null)]
    }))));
    transport.script(Ok(response(json!({
        "status": "validation-error",
        "errors": { "1": { "type": "required" } }
    }))));
    transport.script(Ok(response(json!({ "status": "success" }))));

    session.load_form();
    transport.respond(1);
    settle(&session).await;

    assert!(session.submit_form());
    transport.respond(1);
    settle(&session).await;

    let body = &transport.bodies()[1];
    assert_eq!(body["action"], "submit-all");
    assert_eq!(body["answers"], json!({ "0": "Ada" }));
    assert_eq!(handler.submits.load(Ordering::SeqCst), 0);
    assert_eq!(
        session.with_form(|form| form.errors()),
        Some(vec![("1".to_string(), "An answer is required".to_string())])
    );

    assert!(session.submit_form());
    transport.respond(1);
    settle(&session).await;
    assert_eq!(handler.submits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn answering_without_a_form_is_an_error() {
    let session = FormSession::new(config(), FakeTransport::new(), RecordingHandler::new());
    assert!(session.answer_question("0", "x").is_err());
}

#[tokio::test]
async fn evaluate_xpath_hands_the_output_to_the_callback() {
    let transport = FakeTransport::new();
    let session = FormSession::new(config(), transport.clone(), RecordingHandler::new());
    transport.script(Ok(response(json!({ "status": "accepted", "output": "2026-10-14" }))));
    let output = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&output);

    let queued = session.evaluate_xpath(
        "today()",
        Box::new(move |_: &FormSession, response: &Response| {
            assert_eq!(response.status, Some(Status::Accepted));
            *sink.lock().unwrap() = response.output.clone();
            Ok(())
        }),
    );
    assert!(queued);
    transport.respond(1);
    settle(&session).await;

    assert_eq!(*output.lock().unwrap(), Some(json!("2026-10-14")));
    assert_eq!(transport.bodies()[0]["xpath"], "today()");
}

#[tokio::test]
async fn structural_changes_rebuild_the_tree() {
    let transport = FakeTransport::new();
    let handler = RecordingHandler::new();
    let session = FormSession::new(config(), transport.clone(), handler.clone());
    transport.script(Ok(response(json!({
        "status": "success",
        "session_id": "abc",
        "tree": [text_question("0", Value::Null), text_question("1", Value::Null)]
    }))));
    transport.script(Ok(response(json!({
        "status": "success",
        "tree": [text_question("0", json!("Al"))]
    }))));
    transport.script(Ok(response(json!({
        "status": "success",
        "tree": [text_question("0", json!("Al")), text_question("2", Value::Null)]
    }))));

    session.load_form();
    transport.respond(1);
    settle(&session).await;
    assert_eq!(handler.loads.load(Ordering::SeqCst), 1);

    assert!(session.delete_repeat("1"));
    assert_eq!(session.blocking_status(), BLOCK_ALL);
    transport.respond(1);
    settle(&session).await;
    let ixs = session.with_form(|form| {
        form.questions()
            .iter()
            .map(|question| question.ix().to_string())
            .collect::<Vec<_>>()
    });
    assert_eq!(ixs, Some(vec!["0".to_string()]));

    assert!(session.change_lang("fra"));
    transport.respond(1);
    settle(&session).await;

    let bodies = transport.bodies();
    assert_eq!(bodies[1]["action"], "delete-repeat");
    assert_eq!(bodies[1]["ix"], "1");
    assert_eq!(bodies[2]["action"], "change-lang");
    assert_eq!(bodies[2]["lang"], "fra");
    assert_eq!(bodies[2]["session-id"], "abc");
    assert_eq!(
        session.with_form(|form| form.questions().len()),
        Some(2)
    );
    assert_eq!(session.blocking_status(), BLOCK_NONE);
}

#[tokio::test]
async fn refused_answer_keeps_the_queued_one() {
    let transport = FakeTransport::new();
    let session = FormSession::new(config(), transport.clone(), RecordingHandler::new());

    let busy = Action::EvaluateXpath {
        xpath: "today()".into(),
    };
    session.server_request(busy, None, BLOCK_NONE);
    assert!(session.answer("0", &Answer::Int(1)));
    assert!(session.new_repeat("0J"));
    assert!(!session.answer("0", &Answer::Int(2)));
    assert_eq!(
        session.task_queue().pending_names(),
        vec!["answer:0".to_string(), "new-repeat".to_string()]
    );

    transport.respond(3);
    settle(&session).await;

    let bodies = transport.bodies();
    assert_eq!(bodies.len(), 3);
    assert_eq!(bodies[1]["answer"], 1);
    assert_eq!(bodies[2]["action"], "new-repeat");
}

fn int_question(ix: &str, answer: Value) -> Value {
    json!({
        "caption": "age",
        "binding": "/data/age",
        "type": "question",
        "ix": ix,
        "datatype": "int",
        "required": 1,
        "relevant": 1,
        "style": null,
        "answer": answer
    })
}

/// Loads a form with a text question `0` and an int question `1`.
async fn loaded(transport: &Arc<FakeTransport>, handler: Arc<RecordingHandler>) -> FormSession {
    let session = FormSession::new(config(), transport.clone(), handler);
    transport.script(Ok(response(json!({
        "status": "success",
        "session_id": "abc",
        "tree": [text_question("0", Value::Null), int_question("1", Value::Null)]
    }))));
    session.load_form();
    transport.respond(1);
    settle(&session).await;
    session
}

fn question_error(session: &FormSession, ix: &str) -> Option<String> {
    session
        .with_form(|form| form.question(ix).and_then(|q| q.error().map(str::to_string)))
        .flatten()
}

#[tokio::test]
async fn answer_response_keeps_local_errors_on_other_questions() {
    let transport = FakeTransport::new();
    let session = loaded(&transport, RecordingHandler::new()).await;
    transport.script(Ok(response(json!({
        "status": "success",
        "tree": [text_question("0", json!("Al")), int_question("1", Value::Null)]
    }))));

    session.answer_question("0", "Al").unwrap();
    let outcome = session.answer_question("1", "abc").unwrap();
    assert!(matches!(outcome, AnswerOutcome::Invalid(_)));
    assert_eq!(
        question_error(&session, "1").as_deref(),
        Some("Not a valid whole number")
    );

    transport.respond(1);
    settle(&session).await;

    assert_eq!(
        question_error(&session, "1").as_deref(),
        Some("Not a valid whole number")
    );
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn server_validation_error_survives_later_answers() {
    let transport = FakeTransport::new();
    let session = loaded(&transport, RecordingHandler::new()).await;
    transport.script(Ok(response(json!({
        "status": "validation-error",
        "type": "constraint",
        "reason": "Too short"
    }))));
    transport.script(Ok(response(json!({
        "status": "success",
        "tree": [text_question("0", Value::Null), int_question("1", json!(5))]
    }))));

    session.answer_question("0", "Al").unwrap();
    transport.respond(1);
    settle(&session).await;

    session.answer_question("1", "5").unwrap();
    transport.respond(1);
    settle(&session).await;

    assert_eq!(
        session.with_form(|form| form.errors()),
        Some(vec![("0".to_string(), "Too short".to_string())])
    );

    assert!(session.submit_form());
    transport.respond(1);
    settle(&session).await;
    assert_eq!(transport.bodies()[3]["prevalidated"], false);
}

/// Reads the form from every blocking change, the way a UI gating its
/// submit control would.
#[derive(Default)]
struct FormReadingHandler {
    session: Mutex<Option<FormSession>>,
    seen: Mutex<Vec<(BlockingStatus, Option<usize>)>>,
}

impl SessionHandler for FormReadingHandler {
    fn on_blocking_changed(&self, status: BlockingStatus) {
        let session = self.session.lock().unwrap().clone();
        if let Some(session) = session {
            let errors = session.with_form(|form| form.errors().len());
            self.seen.lock().unwrap().push((status, errors));
        }
    }
}

#[tokio::test]
async fn handler_hooks_may_read_the_form() {
    let transport = FakeTransport::new();
    let handler = Arc::new(FormReadingHandler::default());
    let session = FormSession::new(config(), transport.clone(), handler.clone());
    *handler.session.lock().unwrap() = Some(session.clone());
    transport.script(Ok(response(json!({
        "status": "success",
        "session_id": "abc",
        "tree": [text_question("0", Value::Null)]
    }))));

    session.load_form();
    transport.respond(1);
    settle(&session).await;

    let outcome = session.answer_question("0", "Al").unwrap();
    assert_eq!(outcome, AnswerOutcome::Changed);
    transport.respond(1);
    settle(&session).await;

    assert_eq!(
        *handler.seen.lock().unwrap(),
        vec![
            (BLOCK_ALL, None),
            (BLOCK_NONE, Some(0)),
            (BLOCK_SUBMIT, Some(0)),
            (BLOCK_NONE, Some(0)),
        ]
    );
    // break the handler -> session cycle
    handler.session.lock().unwrap().take();
}

fn exploding(message: &'static str) -> ResponseCallback {
    Box::new(move |_: &FormSession, _: &Response| -> anyhow::Result<()> { panic!("{message}") })
}

#[tokio::test]
async fn panicking_callback_is_reported_as_an_error() {
    let handler = RecordingHandler::new();
    let session = FormSession::new(config(), FakeTransport::new(), handler.clone());

    session.handle_success(
        &Response::success(),
        "action",
        Some(exploding("callback blew up")),
    );

    let errors = handler.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].human_readable_message.starts_with(CALLBACK_ERROR));
    assert!(errors[0].human_readable_message.contains("callback blew up"));
}

#[tokio::test]
async fn panicking_request_callback_unblocks_the_session() {
    let transport = FakeTransport::new();
    let handler = RecordingHandler::new();
    let session = FormSession::new(config(), transport.clone(), handler.clone());

    session.evaluate_xpath("today()", exploding("bad output"));
    transport.respond(1);
    settle(&session).await;

    assert_eq!(session.blocking_status(), BLOCK_NONE);
    assert_eq!(handler.errors().len(), 1);
    assert!(session.new_repeat("0J"));
}
