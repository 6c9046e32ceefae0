//! HTTP/1.1 protocol implementation.
//!
//! Just enough of HTTP/1.1 to serve the feedback API over keep-alive
//! connections.
//!
//! - **`connection`**: per-connection request/response state machine
//! - **`parser`**: parses requests out of a byte buffer
//! - **`request`**: request representation and accessors
//! - **`response`**: response representation with builder and JSON helper
//! - **`writer`**: serializes and writes responses
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request received
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Router dispatch
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
