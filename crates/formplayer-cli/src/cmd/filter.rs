use anyhow::Result;
use clap::{Args, ValueEnum};
use formplayer_entry::{ChoiceOption, Entry, EntryKind, MatchMode};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FilterMode {
    #[default]
    Standard,
    Multiword,
    Fuzzy,
}

impl From<FilterMode> for MatchMode {
    fn from(mode: FilterMode) -> Self {
        match mode {
            FilterMode::Standard => MatchMode::Standard,
            FilterMode::Multiword => MatchMode::Multiword,
            FilterMode::Fuzzy => MatchMode::Fuzzy,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    #[arg(long, value_enum, default_value = "standard")]
    pub mode: FilterMode,
    /// Text typed into the combobox
    #[arg(value_name = "QUERY")]
    pub query: String,
    /// Choice labels to filter
    #[arg(value_name = "CHOICE", required = true)]
    pub choices: Vec<String>,
}

pub fn run(args: &FilterArgs) -> Result<()> {
    for option in matching(args) {
        println!("{} {}", option.idx, option.text);
    }
    Ok(())
}

pub fn matching(args: &FilterArgs) -> Vec<ChoiceOption> {
    let entry = Entry::new(EntryKind::Combobox(args.mode.into()), args.choices.clone());
    entry.matching_options(&args.query)
}
