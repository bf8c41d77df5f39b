//! Endpoint surface of the service
//!
//! Handlers are framework-agnostic: each takes an already-parsed form and
//! returns an [`ApiResponse`] (status code plus JSON body), so any HTTP layer
//! can mount them and the in-process upload service can call them directly.

pub mod handlers;
pub mod responses;

pub use handlers::{ApiHandlers, RemovalTestForm, UploadForm};
pub use responses::{
    interpret_upload_response, ApiResponse, ErrorBody, RemovalTestBody, UploadSuccess,
};
