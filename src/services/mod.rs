pub mod converter;
pub mod forwarder;
pub mod pipeline;
pub mod receiver;
