pub mod frontend;
pub mod handler;
pub mod middleware;
pub mod schema;
pub mod server;
