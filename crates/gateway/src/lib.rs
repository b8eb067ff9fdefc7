//! Gateway: HTTP tool host exposing the tool registry.
//!
//! Routes:
//! - `GET /health`: liveness plus version and tool count
//! - `GET /tools`: tool names, descriptions and parameter schemas
//! - `POST /tools/{name}`: invoke a tool with a JSON parameter body

pub mod server;
pub mod tools_routes;
