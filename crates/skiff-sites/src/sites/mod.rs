pub mod manager;
pub mod settings;
