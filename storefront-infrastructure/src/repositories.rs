pub mod clickhouse_events;
pub mod postgres_events;
pub mod postgres_orders;
pub mod postgres_pool;

pub use clickhouse_events::*;
pub use postgres_events::*;
pub use postgres_orders::*;
pub use postgres_pool::*;
