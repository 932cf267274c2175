//! Effect admission and arbitration.
//!
//! Requests come in from the protocol adapter, pass the admission rules
//! (known id → not already running → no mutex conflict → selectable), and
//! either start an effect or produce exactly one rejection report. Running
//! effects are driven by two periodic passes (ordinary and fast/animated)
//! and their listing state is pushed out as deltas.

mod dispatcher;
mod request;
mod responder;


pub use dispatcher::EffectDispatcher;
pub use request::DispatchRequest;
pub use responder::{EffectReport, Responder};
