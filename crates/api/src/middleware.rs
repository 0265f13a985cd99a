//! Request middleware.
//!
//! Each capability is a single explicit layer; routers compose them in a
//! fixed order (auth guard, then rate limit, then cache) so the control
//! flow per request is visible where the routes are declared.

pub mod auth;
pub mod cache;
pub mod rate_limit;
