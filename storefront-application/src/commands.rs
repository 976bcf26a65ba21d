pub mod order_commands;
pub mod track_commands;
