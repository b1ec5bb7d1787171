use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::debug;

use crate::answer::{Answer, RawAnswer};
use crate::bus::{EventBus, Notification};
use crate::error::FormError;
use crate::question::{AnswerOutcome, Question};

/// Group of questions (`sub-group`). Groups inside a repeat carry `repeatable`.
#[derive(Debug, Clone)]
pub struct Group {
    pub ix: String,
    pub caption: Option<String>,
    pub repeatable: bool,
    pub children: Vec<FormNode>,
}

/// Repeat juncture: the point where repeat instances are listed and added.
#[derive(Debug, Clone)]
pub struct Repeat {
    pub ix: String,
    pub caption: Option<String>,
    pub header: Option<String>,
    pub add_choice: Option<String>,
    pub children: Vec<FormNode>,
}

#[derive(Debug, Clone)]
pub enum FormNode {
    Question(Question),
    Group(Group),
    Repeat(Repeat),
}

impl FormNode {
    pub fn parse(value: &Value, bus: &EventBus) -> Result<Self, FormError> {
        let node_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(FormError::MissingField("type"))?;
        match node_type {
            "question" => Ok(Self::Question(
                Question::from_value(value)?.with_bus(bus.clone()),
            )),
            "sub-group" => Ok(Self::Group(Group {
                ix: node_ix(value)?,
                caption: text_field(value, "caption"),
                repeatable: value
                    .get("repeatable")
                    .is_some_and(|flag| flag.as_bool().unwrap_or(flag.as_i64() == Some(1))),
                children: parse_children(value, bus)?,
            })),
            "repeat-juncture" => Ok(Self::Repeat(Repeat {
                ix: node_ix(value)?,
                caption: text_field(value, "caption"),
                header: text_field(value, "header").or_else(|| text_field(value, "main-header")),
                add_choice: text_field(value, "add-choice"),
                children: parse_children(value, bus)?,
            })),
            other => Err(FormError::UnknownNodeType(other.to_string())),
        }
    }

    pub fn ix(&self) -> &str {
        match self {
            Self::Question(question) => question.ix(),
            Self::Group(group) => &group.ix,
            Self::Repeat(repeat) => &repeat.ix,
        }
    }

    fn children(&self) -> &[FormNode] {
        match self {
            Self::Question(_) => &[],
            Self::Group(group) => &group.children,
            Self::Repeat(repeat) => &repeat.children,
        }
    }
}

fn node_ix(value: &Value) -> Result<String, FormError> {
    text_field(value, "ix").ok_or(FormError::MissingField("ix"))
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_children(value: &Value, bus: &EventBus) -> Result<Vec<FormNode>, FormError> {
    value
        .get("children")
        .and_then(Value::as_array)
        .map(|children| parse_nodes(children, bus))
        .transpose()
        .map(Option::unwrap_or_default)
}

fn parse_nodes(tree: &[Value], bus: &EventBus) -> Result<Vec<FormNode>, FormError> {
    tree.iter().map(|node| FormNode::parse(node, bus)).collect()
}

/// Question tree of a loaded form, rebuilt whenever the server sends a new tree.
#[derive(Debug, Clone, Default)]
pub struct Form {
    title: Option<String>,
    nodes: Vec<FormNode>,
    bus: EventBus,
}

impl Form {
    pub fn new(bus: EventBus) -> Self {
        Self {
            title: None,
            nodes: Vec::new(),
            bus,
        }
    }

    pub fn from_tree(tree: &[Value], bus: EventBus) -> Result<Self, FormError> {
        let nodes = parse_nodes(tree, &bus)?;
        Ok(Self {
            title: None,
            nodes,
            bus,
        })
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn nodes(&self) -> &[FormNode] {
        &self.nodes
    }

    /// Questions in depth-first document order.
    pub fn questions(&self) -> Vec<&Question> {
        let mut out = Vec::new();
        collect_questions(&self.nodes, &mut out);
        out
    }

    pub fn repeats(&self) -> Vec<&Repeat> {
        let mut out = Vec::new();
        collect_repeats(&self.nodes, &mut out);
        out
    }

    pub fn question(&self, ix: &str) -> Option<&Question> {
        self.questions().into_iter().find(|question| question.ix() == ix)
    }

    pub fn question_mut(&mut self, ix: &str) -> Option<&mut Question> {
        find_question_mut(&mut self.nodes, ix)
    }

    pub fn answer(
        &mut self,
        ix: &str,
        raw: impl Into<RawAnswer>,
    ) -> Result<AnswerOutcome, FormError> {
        let question = self
            .question_mut(ix)
            .ok_or_else(|| FormError::UnknownQuestion(ix.to_string()))?;
        Ok(question.set_raw_answer(raw))
    }

    /// Sets a question's raw value without publishing; the returned
    /// notification, if any, is the caller's to publish.
    pub fn stage_answer(
        &mut self,
        ix: &str,
        raw: impl Into<RawAnswer>,
    ) -> Result<(AnswerOutcome, Option<Notification>), FormError> {
        let question = self
            .question_mut(ix)
            .ok_or_else(|| FormError::UnknownQuestion(ix.to_string()))?;
        Ok(question.stage_raw_answer(raw))
    }

    pub fn set_server_error(&mut self, ix: &str, message: Option<String>) -> Result<(), FormError> {
        let question = self
            .question_mut(ix)
            .ok_or_else(|| FormError::UnknownQuestion(ix.to_string()))?;
        question.set_server_error(message);
        Ok(())
    }

    /// Replaces every node with the ones in `tree`. A question that is still
    /// there keeps its server error, and keeps its typed value and local
    /// error while the server leaves its answer unchanged.
    pub fn reconcile(&mut self, tree: &[Value]) -> Result<(), FormError> {
        let mut nodes = parse_nodes(tree, &self.bus)?;
        let previous: HashMap<&str, &Question> = self
            .questions()
            .into_iter()
            .map(|question| (question.ix(), question))
            .collect();
        let mut carried = 0;
        visit_questions_mut(&mut nodes, &mut |question: &mut Question| {
            if previous
                .get(question.ix())
                .is_some_and(|old| question.carry_over(old))
            {
                carried += 1;
            }
        });
        debug!(nodes = nodes.len(), carried, "rebuilt form tree");
        self.nodes = nodes;
        Ok(())
    }

    /// Non-empty answers keyed by question index, as submitted to the server.
    pub fn answers(&self) -> BTreeMap<String, Answer> {
        self.questions()
            .into_iter()
            .filter(|question| question.is_answered())
            .map(|question| (question.ix().to_string(), question.answer().clone()))
            .collect()
    }

    /// Outstanding local and server errors, `(ix, message)`.
    pub fn errors(&self) -> Vec<(String, String)> {
        self.questions()
            .into_iter()
            .filter_map(|question| {
                question
                    .error()
                    .or(question.server_error())
                    .map(|message| (question.ix().to_string(), message.to_string()))
            })
            .collect()
    }

    pub fn request_new_repeat(&self, ix: &str) -> usize {
        self.bus.publish(&Notification::NewRepeat { ix: ix.to_string() })
    }

    pub fn request_delete_repeat(&self, ix: &str) -> usize {
        self.bus
            .publish(&Notification::DeleteRepeat { ix: ix.to_string() })
    }
}

fn collect_questions<'a>(nodes: &'a [FormNode], out: &mut Vec<&'a Question>) {
    for node in nodes {
        if let FormNode::Question(question) = node {
            out.push(question);
        }
        collect_questions(node.children(), out);
    }
}

fn collect_repeats<'a>(nodes: &'a [FormNode], out: &mut Vec<&'a Repeat>) {
    for node in nodes {
        if let FormNode::Repeat(repeat) = node {
            out.push(repeat);
        }
        collect_repeats(node.children(), out);
    }
}

fn visit_questions_mut(nodes: &mut [FormNode], visit: &mut impl FnMut(&mut Question)) {
    for node in nodes {
        match node {
            FormNode::Question(question) => visit(question),
            FormNode::Group(group) => visit_questions_mut(&mut group.children, visit),
            FormNode::Repeat(repeat) => visit_questions_mut(&mut repeat.children, visit),
        }
    }
}

fn find_question_mut<'a>(nodes: &'a mut [FormNode], ix: &str) -> Option<&'a mut Question> {
    for node in nodes {
        let found = match node {
            FormNode::Question(question) if question.ix() == ix => return Some(question),
            FormNode::Question(_) => None,
            FormNode::Group(group) => find_question_mut(&mut group.children, ix),
            FormNode::Repeat(repeat) => find_question_mut(&mut repeat.children, ix),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}
