use anyhow::{Result, bail};
use clap::Args;
use formplayer_entry::{AnswerOutcome, Question};
use serde_json::json;

use super::raw_for;

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Question datatype (str, int, longint, float, select, multiselect, date, time, geo, ...)
    #[arg(long, value_name = "DATATYPE")]
    pub datatype: String,
    /// Style hints, space separated (e.g. "minimal", "combobox-fuzzy", "numeric")
    #[arg(long, value_name = "STYLE")]
    pub style: Option<String>,
    /// Choice label; repeat for each choice
    #[arg(long = "choice", value_name = "LABEL")]
    pub choices: Vec<String>,
    /// Raw value as typed
    #[arg(value_name = "RAW")]
    pub raw: String,
}

/// Builds the question offline and prints its canonical answer.
pub fn run(args: &CheckArgs) -> Result<()> {
    let question = question(args)?;
    println!("{}", outcome(question, &args.raw)?);
    Ok(())
}

pub fn question(args: &CheckArgs) -> Result<Question> {
    let style = args.style.as_ref().map(|raw| json!({ "raw": raw }));
    let choices = (!args.choices.is_empty()).then(|| args.choices.clone());
    let question = Question::from_value(&json!({
        "ix": "0",
        "type": "question",
        "datatype": args.datatype,
        "style": style,
        "choices": choices,
        "answer": null
    }))?;
    Ok(question)
}

/// The JSON line printed for an accepted value.
pub fn outcome(mut question: Question, text: &str) -> Result<serde_json::Value> {
    let raw = raw_for(question.entry().kind(), text);
    if let AnswerOutcome::Invalid(err) = question.set_raw_answer(raw) {
        bail!("{err}");
    }
    Ok(json!({
        "entry": question.entry().kind().name(),
        "template": question.entry().template_type(),
        "answer": question.answer(),
    }))
}
