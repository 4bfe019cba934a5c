//! HTTP API handlers for shelf-ingest

pub mod books;
pub mod health;
pub mod reconcile;

pub use books::book_routes;
pub use health::health_routes;
pub use reconcile::reconcile_routes;
