//! Shared setup for the deployment validation suite.
//!
//! Each test method owns a [`TestDeployment`]: by default it boots the
//! in-process testbed on an ephemeral port; when `IMGCHECK_CONTROL_URL` is
//! set it targets that external control plane instead (credentials from
//! `IMGCHECK_AUTH_NAME`/`IMGCHECK_AUTH_SECRET`).

use imgcheck_client::{Credentials, ImageClient, ObjectStoreClient, Session};
use imgcheck_harness::HarnessClient;
use imgcheck_testbed::{TestbedOptions, create_state, serve};
use log::{error, info};
use std::env;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct TestDeployment {
    pub session: Session,
    pub images: ImageClient,
    pub objects: ObjectStoreClient,
    pub harness: HarnessClient,
    pub control_url: String,
    server: Option<JoinHandle<()>>,
}

impl TestDeployment {
    /// Start against the default testbed options (or the external
    /// deployment, when configured via the environment).
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_with(TestbedOptions::default()).await
    }

    pub async fn start_with(options: TestbedOptions) -> Result<Self, Box<dyn std::error::Error>> {
        if let Ok(control_url) = env::var("IMGCHECK_CONTROL_URL") {
            info!("targeting external deployment at {control_url}");
            let credentials = Credentials::new(
                env::var("IMGCHECK_AUTH_NAME").unwrap_or_else(|_| options.auth_name.clone()),
                env::var("IMGCHECK_AUTH_SECRET").unwrap_or_else(|_| options.auth_secret.clone()),
            );
            return Self::attach(control_url, credentials, None).await;
        }

        let credentials = Credentials::new(&options.auth_name, &options.auth_secret);
        let state = create_state(&options)?;
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            if let Err(e) = serve(listener, state).await {
                error!("testbed server exited: {e}");
            }
        });
        Self::attach(format!("http://{addr}"), credentials, Some(server)).await
    }

    async fn attach(
        control_url: String,
        credentials: Credentials,
        server: Option<JoinHandle<()>>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = Session::authenticate(&control_url, &credentials).await?;
        Ok(Self {
            images: ImageClient::new(&session),
            objects: ObjectStoreClient::new(&session),
            harness: HarnessClient::new(&session),
            session,
            control_url,
            server,
        })
    }
}

impl Drop for TestDeployment {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}
