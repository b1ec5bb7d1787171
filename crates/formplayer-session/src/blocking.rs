use std::fmt;

use serde::{Deserialize, Serialize};

/// How much user input is held back while requests are outstanding.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum BlockingStatus {
    /// Nothing is held back.
    #[default]
    None,
    /// Form submission waits for outstanding answers.
    Submit,
    /// Every request is refused until the structural change lands.
    All,
}

pub const BLOCK_NONE: BlockingStatus = BlockingStatus::None;
pub const BLOCK_SUBMIT: BlockingStatus = BlockingStatus::Submit;
pub const BLOCK_ALL: BlockingStatus = BlockingStatus::All;

impl BlockingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "block-none",
            Self::Submit => "block-submit",
            Self::All => "block-all",
        }
    }

    /// Submitting the form is only allowed when nothing blocks.
    pub fn allows_submit(&self) -> bool {
        *self == Self::None
    }

    fn slot(self) -> usize {
        match self {
            Self::None => 0,
            Self::Submit => 1,
            Self::All => 2,
        }
    }
}

impl fmt::Display for BlockingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outstanding requests per blocking level. The blocking status is the
/// highest level that still has a request outstanding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Activity {
    pending: [usize; 3],
}

impl Activity {
    pub fn status(&self) -> BlockingStatus {
        if self.pending[BlockingStatus::All.slot()] > 0 {
            BlockingStatus::All
        } else if self.pending[BlockingStatus::Submit.slot()] > 0 {
            BlockingStatus::Submit
        } else {
            BlockingStatus::None
        }
    }

    /// Total outstanding requests, at any level.
    pub fn pending(&self) -> usize {
        self.pending.iter().sum()
    }

    pub fn pending_at(&self, level: BlockingStatus) -> usize {
        self.pending[level.slot()]
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    pub(crate) fn register(&mut self, level: BlockingStatus) {
        self.pending[level.slot()] += 1;
    }

    pub(crate) fn release(&mut self, level: BlockingStatus) {
        let slot = &mut self.pending[level.slot()];
        *slot = slot.saturating_sub(1);
    }
}
