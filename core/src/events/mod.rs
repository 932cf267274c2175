pub mod bus;
pub mod signal;

pub use bus::{EventBus, SubscriptionHandle};
pub use signal::{GameEvent, PlayerClass};
