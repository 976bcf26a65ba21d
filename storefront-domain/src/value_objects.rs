// Domain value objects
pub mod event_kind;
pub mod order_status;

pub use event_kind::*;
pub use order_status::*;
