/// Middleware modules for the API server
///
/// Session loading and the admin check live in `ctvpay_shared::auth`; this
/// module holds HTTP-only concerns.

pub mod security;
