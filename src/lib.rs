pub mod app;
pub mod calendar;
pub mod campus;
pub mod config;
pub mod error;
pub mod form;
pub mod notify;
pub mod poll;
pub mod reaction;
pub mod session;
pub mod visibility;

pub use app::App;
pub use config::Config;
pub use error::{Error, Result};
pub use session::{Session, SessionStore};
