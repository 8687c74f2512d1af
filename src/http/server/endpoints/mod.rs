pub mod interaction;
pub mod metadata;
pub mod oauth;
pub mod session;

/// Cookie binding the OP's own notion of the authenticated end-user. Dev
/// interactions set it; `prompt=login` ignores it.
pub const OP_SESSION_COOKIE: &str = "torii_op_session";
