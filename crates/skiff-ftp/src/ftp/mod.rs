pub mod client;
pub mod codec;
pub mod connection;
pub mod data;
pub mod ftps;
pub mod parser;
pub mod tls;
