use crate::store::JsonDraftStore;
use controller::{
    EMPLOYEE_DRAFT_KEY, FIELD_REGISTERED_ON_ML, FIELD_RESTORE, FIELD_VIDEO_RECORDED,
    RESTORE_DRAFT_KEY, SubjectIdentity,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Driver,
    Supervisor,
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Driver => "Driver",
            Role::Supervisor => "Supervisor",
            Role::Other => "Other",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "driver" => Ok(Role::Driver),
            "supervisor" => Ok(Role::Supervisor),
            "other" => Ok(Role::Other),
            _ => Err(DraftError::UnknownRole(s.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("Please fill Name, Employee ID, and Role (missing {0})")]
    MissingField(&'static str),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Unknown role '{0}' (expected Driver, Supervisor or Other)")]
    UnknownRole(String),
}

/// The add-employee form as it is kept between screens. Capture outcome
/// flags live in the same record and are written by the capture controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmployeeDraft {
    pub full_name: String,
    pub employee_id: String,
    pub role: Role,
    pub phone: String,
    pub email: String,
    pub notes: String,
    pub photo_paths: Vec<PathBuf>,
    pub video_recorded: bool,
    #[serde(rename = "registeredOnML")]
    pub registered_on_ml: bool,
}

/// `\S+@\S+\.\S+`
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some(at) = email.find('@').filter(|&at| at > 0) else {
        return false;
    };
    let domain = &email[at + 1..];
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

impl EmployeeDraft {
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.full_name.trim().is_empty() {
            return Err(DraftError::MissingField("name"));
        }
        if self.employee_id.trim().is_empty() {
            return Err(DraftError::MissingField("employee ID"));
        }
        let email = self.email.trim();
        if !email.is_empty() && !looks_like_email(email) {
            return Err(DraftError::InvalidEmail(email.to_string()));
        }
        Ok(())
    }

    pub fn subject(&self) -> Option<SubjectIdentity> {
        SubjectIdentity::new(&self.employee_id, &self.full_name)
    }

    /// Saves the form fields. The capture outcome flags already in the store
    /// are left as they are.
    pub async fn save(&self, store: &JsonDraftStore) -> anyhow::Result<()> {
        let Value::Object(mut fields) = serde_json::to_value(self)? else {
            anyhow::bail!("draft did not serialize to an object");
        };
        fields.remove(FIELD_VIDEO_RECORDED);
        fields.remove(FIELD_REGISTERED_ON_ML);
        store.merge_fields(EMPLOYEE_DRAFT_KEY, fields).await
    }

    pub async fn load(store: &JsonDraftStore) -> anyhow::Result<Option<Self>> {
        match store.read_record(EMPLOYEE_DRAFT_KEY).await? {
            Some(record) => Ok(Some(serde_json::from_value(Value::Object(record))?)),
            None => Ok(None),
        }
    }

    /// Draft to show when the form regains focus: the saved one if the
    /// capture screen asked for a restore, otherwise `None`. The restore
    /// request is consumed.
    pub async fn restore(store: &JsonDraftStore) -> anyhow::Result<Option<Self>> {
        if !store.flag(RESTORE_DRAFT_KEY, FIELD_RESTORE).await? {
            return Ok(None);
        }
        store.remove_record(RESTORE_DRAFT_KEY).await?;
        Self::load(store).await
    }
}
