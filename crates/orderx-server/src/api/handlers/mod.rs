pub mod dev;
pub mod health;
pub mod sync;
pub mod tokens;
pub mod webhooks;
