// Domain services
pub mod order_number;
pub mod schema;
pub mod user_agent;

pub use order_number::*;
pub use schema::*;
pub use user_agent::*;
