pub mod handlers;
pub mod middleware;
pub mod provision;
pub mod routes;
pub mod status;
pub mod swap;

pub use routes::create_router;
