pub mod backend;
pub mod keychain;
pub mod vault;
