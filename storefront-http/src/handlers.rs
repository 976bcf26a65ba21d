pub mod analytics_handlers;
pub mod ops_handlers;
pub mod order_handlers;
pub mod track_handlers;

pub use analytics_handlers::*;
pub use ops_handlers::*;
pub use order_handlers::*;
pub use track_handlers::*;
