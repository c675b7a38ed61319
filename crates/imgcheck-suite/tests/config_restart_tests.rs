use imgcheck::Release;
use imgcheck_harness::HarnessError;
use imgcheck_suite::TestDeployment;
use imgcheck_testbed::{
    IMAGE_API_CONF, IMAGE_API_SERVICE, IMAGE_REGISTRY_SERVICE, TestbedOptions,
};
use std::collections::BTreeMap;

fn expected_services(release: Release) -> Vec<String> {
    // Before bionic_stein a separate registry service also watches the API
    // config file; from stein on it is gone.
    let mut services = vec![IMAGE_API_SERVICE.to_string()];
    if release < Release::BionicStein {
        services.push(IMAGE_REGISTRY_SERVICE.to_string());
    }
    services
}

#[tokio::test]
async fn debug_toggle_restarts_release_appropriate_services() {
    let deployment = TestDeployment::start()
        .await
        .expect("Failed to start test deployment");

    let release = deployment
        .harness
        .current_release()
        .await
        .expect("release query failed");
    let mut services_by_file = BTreeMap::new();
    services_by_file.insert(IMAGE_API_CONF.to_string(), expected_services(release));

    deployment
        .harness
        .restart_on_changed_debug(&services_by_file)
        .await
        .expect("restart on debug change failed");
}

#[tokio::test]
async fn debug_toggle_before_stein_restarts_registry_too() {
    let options = TestbedOptions {
        release: Release::BionicQueens,
        ..TestbedOptions::default()
    };
    let deployment = TestDeployment::start_with(options)
        .await
        .expect("Failed to start test deployment");

    let release = deployment
        .harness
        .current_release()
        .await
        .expect("release query failed");
    if release >= Release::BionicStein {
        // External deployment on a newer release; nothing to check here.
        return;
    }

    deployment
        .harness
        .service_status(IMAGE_REGISTRY_SERVICE)
        .await
        .expect("registry service missing on a pre-stein release");

    let mut services_by_file = BTreeMap::new();
    services_by_file.insert(
        IMAGE_API_CONF.to_string(),
        vec![
            IMAGE_API_SERVICE.to_string(),
            IMAGE_REGISTRY_SERVICE.to_string(),
        ],
    );
    deployment
        .harness
        .restart_on_changed_debug(&services_by_file)
        .await
        .expect("restart on debug change failed");
}

#[tokio::test]
async fn debug_toggle_at_stein_omits_registry() {
    let options = TestbedOptions {
        release: Release::BionicStein,
        ..TestbedOptions::default()
    };
    let deployment = TestDeployment::start_with(options)
        .await
        .expect("Failed to start test deployment");

    let release = deployment
        .harness
        .current_release()
        .await
        .expect("release query failed");
    if release < Release::BionicStein {
        return;
    }

    let err = deployment
        .harness
        .service_status(IMAGE_REGISTRY_SERVICE)
        .await
        .expect_err("registry service present at/after stein");
    assert!(matches!(err, HarnessError::ServiceNotFound { .. }));

    let mut services_by_file = BTreeMap::new();
    services_by_file.insert(
        IMAGE_API_CONF.to_string(),
        vec![IMAGE_API_SERVICE.to_string()],
    );
    deployment
        .harness
        .restart_on_changed_debug(&services_by_file)
        .await
        .expect("restart on debug change failed");
}
