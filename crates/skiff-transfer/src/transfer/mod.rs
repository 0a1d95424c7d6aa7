pub mod manager;
pub mod types;
pub mod worker;
