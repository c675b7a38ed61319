//! Session-authenticated clients for the image service and the
//! object-store gateway.

pub mod error;
mod image;
mod object_store;
mod session;

pub use error::ClientError;
pub use image::ImageClient;
pub use object_store::ObjectStoreClient;
pub use session::{AUTH_TOKEN_HEADER, Credentials, Session};
