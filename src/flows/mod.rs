//! Registration and sign-in flows
//!
//! Each flow is an explicit state machine owned by one caller. Operations called
//! out of order return [`FlowError::OutOfOrder`](crate::types::FlowError) and
//! leave the flow untouched.

pub mod registration;
pub mod sign_in;

pub use registration::{RegistrationFlow, RegistrationPolicy, RegistrationStep};
pub use sign_in::{SignInFlow, SignInPolicy, SignInStep, VerificationMode};
