pub mod form;
pub mod store;

pub use form::{DraftError, EmployeeDraft, Role};
pub use store::JsonDraftStore;
