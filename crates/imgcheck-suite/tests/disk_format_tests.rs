use imgcheck::api::CreateImageRequest;
use imgcheck::{ConfigDelta, ConfigSections, DiskFormat};
use imgcheck_client::ClientError;
use imgcheck_suite::TestDeployment;
use imgcheck_testbed::{DEFAULT_DISK_FORMATS, IMAGE_API_CONF, IMAGE_API_SERVICE};

#[tokio::test]
async fn disk_format_change_propagates_and_restarts_image_api() {
    let deployment = TestDeployment::start()
        .await
        .expect("Failed to start test deployment");

    // Expected default and alternate values
    let set_default = ConfigDelta::new().with("disk-formats", DEFAULT_DISK_FORMATS);
    let set_alternate = ConfigDelta::new().with("disk-formats", "qcow2");

    // The rendered file carries each option as a single line, so the default
    // expectation is the whole comma-separated list as one entry.
    let expected_default =
        ConfigSections::new().with_option("image_format", "disk_formats", DEFAULT_DISK_FORMATS);
    let expected_alternate =
        ConfigSections::new().with_option("image_format", "disk_formats", "qcow2");

    deployment
        .harness
        .restart_on_changed(
            IMAGE_API_CONF,
            &set_default,
            &set_alternate,
            &expected_default,
            &expected_alternate,
            &[IMAGE_API_SERVICE],
        )
        .await
        .expect("restart on disk-format change failed");
}

#[tokio::test]
async fn restricted_disk_formats_reject_other_registrations() {
    let deployment = TestDeployment::start()
        .await
        .expect("Failed to start test deployment");

    // Restrict the service to qcow2 and wait for the restart to land.
    let marks = deployment
        .harness
        .restart_marks(&[IMAGE_API_SERVICE])
        .await
        .expect("restart marks failed");
    deployment
        .harness
        .set_config(&ConfigDelta::new().with("disk-formats", "qcow2"))
        .await
        .expect("config change failed");
    deployment
        .harness
        .wait_for_restart(&marks)
        .await
        .expect("image-api did not restart");

    // A raw image must now be refused at registration time.
    let err = deployment
        .images
        .create(&CreateImageRequest {
            name: "raw-image".to_string(),
            disk_format: DiskFormat::Raw,
            container_format: "bare".to_string(),
            backend: None,
        })
        .await
        .expect_err("raw image was accepted despite the qcow2-only config");
    assert!(matches!(
        err,
        ClientError::UnexpectedStatus { status: 400, .. }
    ));

    // qcow2 itself still works.
    let image = deployment
        .images
        .create(&CreateImageRequest {
            name: "qcow2-image".to_string(),
            disk_format: DiskFormat::Qcow2,
            container_format: "bare".to_string(),
            backend: None,
        })
        .await
        .expect("qcow2 image registration failed");
    deployment
        .images
        .delete(image.id)
        .await
        .expect("cleanup failed");
}
