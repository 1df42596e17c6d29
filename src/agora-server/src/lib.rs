//! Agora HTTP server: session lifecycle API with SSE round streaming.

pub mod routes;
pub mod state;
