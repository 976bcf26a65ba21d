// Domain entities
pub mod analytics;
pub mod config;
pub mod event;
pub mod order;
pub mod track_request;

pub use analytics::*;
pub use config::*;
pub use event::*;
pub use order::*;
pub use track_request::*;
