/// Router Module Index
///
/// Splits the portal's routes by who may reach them. Access control is applied at the
/// module level (via Axum layers), so a page cannot be exposed by accident.

/// Pages and endpoints reachable by anyone, logged in or not.
pub mod public;

/// Pages that need a Current User. Wrapped in the `CurrentUser` guard layer.
pub mod authenticated;

/// JSON API under `/api`: query cache inspection and session management.
pub mod api;
