// State machine module for request orchestration
//
// One RouteStateMachine per idempotency key drives a request through
// validation, computation and, for downstream side effects, compensation.

pub mod events;
pub mod registry;
pub mod route_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use events::RequestEvent;
pub use registry::{Registration, SharedStateMachine, StateMachineRegistry};
pub use route_state_machine::{RouteStateMachine, TransitionRecord};
pub use states::RequestState;
