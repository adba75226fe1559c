pub mod message;
pub mod network;
pub mod notification;
pub mod request;
pub mod wallet;
