pub mod events;
pub mod handlers;
pub mod middleware;
pub mod processing;
pub mod routes;

pub use routes::create_router;
