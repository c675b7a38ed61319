//! In-process simulated deployment of the image service: the image API, an
//! object-store gateway backend, and the control plane the harness drives.
//!
//! The validation suite boots this by default; the standalone
//! `imgcheck-testbed` binary serves the same routers for manual runs.

pub mod control;
pub mod error;
pub mod image_api;
pub mod object_api;
pub mod options;
pub mod server;
pub mod state;

pub use error::TestbedError;
pub use options::TestbedOptions;
pub use server::{AppState, build_router, create_state, serve, start_server};
pub use state::{
    DEFAULT_DISK_FORMATS, DeploymentState, GATEWAY_CONTAINER, IMAGE_API_CONF, IMAGE_API_SERVICE,
    IMAGE_REGISTRY_SERVICE,
};
