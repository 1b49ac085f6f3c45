//! Kinds of per-book data

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which annotation list a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataKind {
    #[serde(rename = "highlights")]
    Highlights,
    #[serde(rename = "notes")]
    Notes,
    #[serde(rename = "askAnswers")]
    AskAnswers,
}

impl DataKind {
    pub const ALL: [DataKind; 3] = [DataKind::Highlights, DataKind::Notes, DataKind::AskAnswers];

    /// Storage key for this kind
    pub fn key(&self) -> &'static str {
        match self {
            DataKind::Highlights => "highlights",
            DataKind::Notes => "notes",
            DataKind::AskAnswers => "askAnswers",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
