/// Router Module Index
///
/// Splits routing by access level so the authentication layer is applied once per
/// module instead of per handler.

/// Routes reachable without an identity: health and the user/token endpoints.
pub mod public;

/// Routes wrapped in the `AuthUser` middleware. Per-classroom authorization happens
/// inside the gateway, not here.
pub mod authenticated;
