pub mod dashboard_queries;
pub mod health_queries;
pub mod interaction_queries;
pub mod order_queries;
pub mod page_visit_queries;
mod secondary_reads;
