pub mod replay;
pub mod signature;

pub use replay::ReplayGuard;
pub use signature::{SecretSlot, WebhookSecrets};
