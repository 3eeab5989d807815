//! Security primitives for the session domain

pub mod access_token;

pub use access_token::AccessToken;
