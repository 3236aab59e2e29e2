//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod meeting;
mod quiz;
mod site;

pub use ask::run_ask;
pub use chat::run_doc;
pub use config::run_config;
pub use doctor::run_doctor;
pub use meeting::run_meeting;
pub use quiz::run_quiz;
pub use site::run_site;
