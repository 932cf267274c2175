pub mod backup;
pub mod bindings;
pub mod cache;


pub use backup::SessionBackup;
pub use bindings::{BindingError, CommandBindings};
pub use cache::{PollRate, Retention, StateCache};
