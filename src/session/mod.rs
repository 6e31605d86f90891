//! Practice session lifecycle.
//!
//! [`Session`] is the pure state machine; [`SessionOrchestrator`] runs the
//! side effects and publishes each new session into [`SharedSession`] for
//! the UI to render.

pub mod runner;
pub mod state;

pub use runner::{SessionCommand, SessionOrchestrator, Services};
pub use state::{
    lock_session, new_shared_session, Notice, Phase, Session, SessionEvent, SharedSession,
    StartError, StopCause,
};
