use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use clap::Args;
use formplayer_entry::{AnswerOutcome, Question};
use formplayer_session::{
    ErrorReport, FormSession, HttpTransport, Response, SessionConfig, SessionHandler,
};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use super::raw_for;
use crate::config::{FileConfig, Overrides};

#[derive(Args, Debug, Clone, Default)]
pub struct PlayArgs {
    /// Formplayer server base URL
    #[arg(long = "xform-url", value_name = "URL")]
    pub xform_url: Option<String>,
    /// Form to load
    #[arg(long = "form-url", value_name = "URL")]
    pub form_url: Option<String>,
    /// Form language
    #[arg(long, value_name = "LANG")]
    pub lang: Option<String>,
}

impl PlayArgs {
    fn overrides(self) -> Overrides {
        Overrides {
            xform_url: self.xform_url,
            form_url: self.form_url,
            lang: self.lang,
        }
    }
}

/// Prints server errors and remembers whether the form went through.
#[derive(Debug, Default)]
struct ConsoleHandler {
    submitted: AtomicBool,
}

impl SessionHandler for ConsoleHandler {
    fn on_load(&self, response: &Response) {
        if let Some(title) = &response.title {
            println!("== {title} ==");
        }
    }

    fn on_error(&self, report: &ErrorReport) {
        eprintln!("error: {}", report.human_readable_message);
    }

    fn on_submit(&self, _response: &Response) {
        self.submitted.store(true, Ordering::SeqCst);
        println!("Form submitted.");
    }
}

pub fn run(args: PlayArgs, config_path: Option<&Path>) -> Result<()> {
    let config = FileConfig::load(config_path)?
        .with_env(|key| std::env::var(key).ok())
        .with_overrides(args.overrides())
        .resolve()?;
    let runtime = Runtime::new().context("failed to start async runtime")?;
    // requests are spawned from the prompt loop below
    let _guard = runtime.enter();
    play(&runtime, config)
}

fn play(runtime: &Runtime, config: SessionConfig) -> Result<()> {
    info!(server = %config.xform_url, form = %config.form_url, "loading form");
    let transport = Arc::new(HttpTransport::new(config.timeout())?);
    let handler = Arc::new(ConsoleHandler::default());
    let session = FormSession::new(config, transport, handler.clone());

    session.load_form();
    runtime.block_on(session.idle());
    if !session.has_form() {
        bail!("the server did not return a form");
    }
    println!("Commands: :skip, :repeat <ix>, :submit, :quit");

    loop {
        let Some(ixs) = session.with_form(|form| {
            form.questions()
                .into_iter()
                .filter(|question| question.relevant())
                .filter(|question| !question.entry().kind().is_read_only())
                .filter(|question| needs_input(question))
                .map(|question| question.ix().to_string())
                .collect::<Vec<_>>()
        }) else {
            bail!("form was unloaded");
        };

        match prompt_questions(runtime, &session, &ixs)? {
            Step::Quit => return Ok(()),
            Step::Reload => continue,
            Step::Submit => {
                session.submit_form();
                runtime.block_on(session.idle());
                if handler.submitted.load(Ordering::SeqCst) {
                    return Ok(());
                }
                if print_errors(&session) == 0
                    && prompt_line("Retry submit? (enter, :quit)")?.trim() == ":quit"
                {
                    return Ok(());
                }
            }
        }
    }
}

enum Step {
    Quit,
    Submit,
    /// The tree changed shape (a repeat was added).
    Reload,
}

fn prompt_questions(runtime: &Runtime, session: &FormSession, ixs: &[String]) -> Result<Step> {
    for ix in ixs {
        loop {
            let Some(label) = session.with_form(|form| form.question(ix).map(describe)).flatten()
            else {
                // question dropped out of the refreshed tree
                break;
            };
            let input = prompt_line(&label)?;
            let trimmed = input.trim();
            match trimmed {
                ":quit" => return Ok(Step::Quit),
                ":submit" => return Ok(Step::Submit),
                ":skip" => break,
                _ => {}
            }
            if let Some(repeat) = trimmed.strip_prefix(":repeat ") {
                session.new_repeat(repeat.trim());
                runtime.block_on(session.idle());
                return Ok(Step::Reload);
            }

            let raw = session
                .with_form(|form| form.question(ix).map(|q| raw_for(q.entry().kind(), trimmed)))
                .flatten()
                .unwrap_or_default();
            match session.answer_question(ix, raw)? {
                AnswerOutcome::Invalid(err) => {
                    println!("{err}");
                    continue;
                }
                outcome => debug!(ix = %ix, ?outcome, "answered"),
            }
            runtime.block_on(session.idle());
            let server_error = session
                .with_form(|form| {
                    form.question(ix)
                        .and_then(|q| q.server_error().map(str::to_string))
                })
                .flatten();
            match server_error {
                Some(message) => println!("{message}"),
                None => break,
            }
        }
    }
    Ok(Step::Submit)
}

fn needs_input(question: &Question) -> bool {
    !question.is_answered() || question.error().is_some() || question.server_error().is_some()
}

fn describe(question: &Question) -> String {
    let mut label = question.caption().unwrap_or(question.ix()).to_string();
    if question.required() {
        label.push_str(" *");
    }
    for option in question.entry().options() {
        label.push_str(&format!("\n  {}) {}", option.idx, option.text));
    }
    if question.is_answered() {
        label.push_str(&format!("\n[{}]", question.answer().to_value()));
    }
    label
}

fn print_errors(session: &FormSession) -> usize {
    let errors = session.with_form(|form| form.errors()).unwrap_or_default();
    for (ix, message) in &errors {
        println!("{ix}: {message}");
    }
    errors.len()
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input)?;
    if read == 0 {
        bail!("stdin closed");
    }
    Ok(input)
}
