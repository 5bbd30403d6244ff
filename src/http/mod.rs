//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1, one request per connection, Axum router)
//!     → dispatcher.rs (snapshot rules, match, persist, delay)
//!     → request.rs (body read, content-type → extension, timestamped files)
//!     → response.rs (status, headers, CORS, drop marker)
//!     → Send to client, or close without a response
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{Outcome, RequestDispatcher, RequestError};
pub use response::{DropConnection, ResponseBody};
pub use server::StubServer;
