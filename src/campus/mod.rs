pub mod event;
pub mod review;
pub mod store;
pub mod user;

pub use event::{CampusEvent, EventDraft, EventStatus, Schedule, BROADCAST_INSTITUTE, INSTITUTES};
pub use review::{Comment, EventReview, ReviewedEvent};
pub use store::{Bearer, CampusApi, HttpStore};
pub use user::{Role, User};
