pub mod admission;
pub mod capacity;
pub mod error;
pub mod merge;
pub mod rollback;
pub mod rotation;
pub mod selection;

pub use admission::{appeal_kind_for, admission_allowed, AppealKind};
pub use capacity::{draw_extra_validators, has_capacity, validator_draw, ValidatorDraw};
pub use error::AppealError;
pub use merge::merge_validator_receipts;
pub use rollback::AppealCoordinator;
pub use rotation::rotate_leader;
pub use selection::{classify_reentry, past_leaders, select_validators, ReentryKind};
