pub mod channel;
pub mod handlers;
pub mod payload;
pub mod router;
