pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod format;
pub mod playbook;
pub mod ports;
pub mod profile;
pub mod questions;
pub mod text;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::assist::{
    InfoIntent, IntentResult, QuestionChoice, RerankCandidate, RerankOutcome, SearchPlan,
};
pub use domain::contact::{Contact, ContactId};
pub use domain::line::LineKey;
pub use domain::product::{CatalogRecord, ProductId, ProductSummary, StockStatus};
pub use domain::session::{
    Channel, IdleAction, IdleActionKind, IdlePolicy, PendingMode, SessionState,
};
pub use errors::{ApplicationError, CollaboratorError, InterfaceError};
pub use format::format_cop;
