//! Service prompt form.
//!
//! Collects the seven service requirement fields, exchanges the signed-in
//! user's ID token for temporary credentials through a Cognito identity pool,
//! invokes the prompt function with them and shows the function's markdown
//! reply under the form.
//!
//! ## Modules
//!
//! - [`form`]: field state and the required-field rule
//! - [`page`]: HTML for the form, inline errors and the reply
//! - [`session`]: where the ID token comes from
//! - [`credentials`]: token to credentials, optionally cached
//! - [`invoke`]: payload encoding and the function call
//! - [`render`]: markdown reply to HTML
//! - [`flow`]: one submission end to end, and what each browser sees
//! - [`server`]: routes and shutdown
pub mod config;
pub mod credentials;
pub mod error;
pub mod flow;
pub mod form;
pub mod invoke;
pub mod page;
pub mod render;
pub mod server;
pub mod session;
