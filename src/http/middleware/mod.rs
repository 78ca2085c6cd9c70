//! Request middleware.

pub mod endpoint_redirect;

pub use endpoint_redirect::{EndpointRedirect, EndpointRedirectLayer, DEFAULT_NAME};
