/// Router Module Index
///
/// Server-side routes only. Site pages are static files served by the fallback in
/// `create_router`; which of them need a signed-in user is decided by the access
/// gate's route table, not by router placement.

/// Endpoints answered by the site itself (health and backend status).
pub mod public;

/// The `/api` prefix, relayed verbatim to the external backend.
pub mod api;
