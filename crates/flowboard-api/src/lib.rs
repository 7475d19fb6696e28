pub mod app;
pub mod auth;
pub mod email;
pub mod error;
pub mod extract;
pub mod requests;
pub mod session;
pub mod state;
