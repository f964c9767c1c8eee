use clap::Parser;
use drafts::{EmployeeDraft, Role};
use std::path::PathBuf;

/// Enroll an employee: fill the draft, capture guided face stills and
/// register them with the recognition service.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    #[arg(long)]
    pub employee_id: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
    /// Driver, Supervisor or Other.
    #[arg(long)]
    pub role: Option<Role>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    /// Profile photos to attach to the draft (repeatable).
    #[arg(long = "photo")]
    pub photos: Vec<PathBuf>,
    /// Fill missing fields from the saved draft if the last capture asked
    /// for a restore.
    #[arg(long, default_value_t = false)]
    pub resume: bool,
    /// Render generated frames instead of opening a camera.
    #[arg(long, default_value_t = false)]
    pub synthetic: bool,
    /// Overrides UPLOAD_URL.
    #[arg(long)]
    pub upload_url: Option<String>,
}

impl Args {
    /// Flags win over the saved draft, field by field.
    pub fn into_draft(self, saved: EmployeeDraft) -> EmployeeDraft {
        EmployeeDraft {
            full_name: self.name.unwrap_or(saved.full_name),
            employee_id: self.employee_id.unwrap_or(saved.employee_id),
            role: self.role.unwrap_or(saved.role),
            phone: self.phone.unwrap_or(saved.phone),
            email: self.email.unwrap_or(saved.email),
            notes: self.notes.unwrap_or(saved.notes),
            photo_paths: if self.photos.is_empty() {
                saved.photo_paths
            } else {
                self.photos
            },
            ..saved
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_saved_draft() {
        let args = Args::try_parse_from([
            "enroll",
            "--employee-id",
            "E-2001",
            "--role",
            "supervisor",
            "--synthetic",
        ])
        .unwrap();
        assert!(args.synthetic);

        let saved = EmployeeDraft {
            full_name: "Meera Iyer".into(),
            employee_id: "E-1999".into(),
            video_recorded: true,
            ..EmployeeDraft::default()
        };
        let draft = args.into_draft(saved);
        assert_eq!(draft.full_name, "Meera Iyer");
        assert_eq!(draft.employee_id, "E-2001");
        assert_eq!(draft.role, Role::Supervisor);
        assert!(draft.video_recorded);
    }

    #[test]
    fn rejects_unknown_role() {
        assert!(Args::try_parse_from(["enroll", "--role", "manager"]).is_err());
    }
}
