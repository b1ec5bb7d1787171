//! Question model and answer entries for formplayer form playback.

pub mod answer;
pub mod bus;
pub mod datatype;
pub mod entry;
pub mod error;
pub mod form;
pub mod question;

pub use answer::{Answer, NO_ANSWER, RawAnswer};
pub use bus::{AnswerEvent, EventBus, Handler, Notification, SubscriptionId};
pub use datatype::{Datatype, Style};
pub use entry::{
    ChoiceOption, Entry, EntryKind, MatchMode, TemplateType, Transition, filter as combobox_filter,
};
pub use error::{EntryError, FormError};
pub use form::{Form, FormNode, Group, Repeat};
pub use question::{AnswerOutcome, Question, QuestionJson};
