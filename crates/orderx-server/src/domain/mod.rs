mod availability;
mod credential;
pub(crate) mod menu;
mod order;
mod platform;
mod sync;

pub use availability::*;
pub use credential::*;
pub use menu::*;
pub use order::*;
pub use platform::*;
pub use sync::*;
