use serde::{Deserialize, Serialize};

pub use crate::entities::keypair::Model as Keypair;
pub use crate::entities::operator::Model as Operator;

// ─── Notices ───

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// User-facing message shown once on the next list view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

// ─── Request/Response types ───

#[derive(Debug, Serialize, Deserialize)]
pub struct KeypairsPage {
    pub keypairs: Vec<Keypair>,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Deserialize)]
pub struct NewKeypairForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pin: String,
    #[serde(default)]
    pub rfid_uid: String,
}

/// Single-field edit: `kid` names the keypair, `value` is the new content.
#[derive(Debug, Deserialize)]
pub struct EditFieldForm {
    pub kid: i32,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct KeypairIdForm {
    pub kid: i32,
}
