pub mod backup_exchange;
pub mod core;
pub mod records;
