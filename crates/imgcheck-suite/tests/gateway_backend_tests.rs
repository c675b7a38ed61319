use imgcheck::{DiskFormat, StoreBackend};
use imgcheck_suite::TestDeployment;

#[tokio::test]
async fn gateway_backed_image_reconciles_byte_counts() {
    let _ = env_logger::builder().is_test(true).try_init();
    let deployment = TestDeployment::start()
        .await
        .expect("Failed to start test deployment");
    let image_name = "gateway-image";
    let image_url = deployment.session.reference_image_url().to_string();

    // Action
    deployment
        .images
        .create_from_url(
            image_name,
            &image_url,
            DiskFormat::Qcow2,
            Some(StoreBackend::Swift),
        )
        .await
        .expect("gateway-backed image creation failed");

    // Expectation: exactly one container on the account, exactly one image
    // under the test name, and the chunk bytes under the image's identifier
    // prefix add up to the image's reported size.
    let containers = deployment
        .objects
        .get_account()
        .await
        .expect("account listing failed");
    assert_eq!(containers.len(), 1);
    let container_name = containers[0].name.clone();

    let objects = deployment
        .objects
        .get_container(&container_name)
        .await
        .expect("container listing failed");

    let images = deployment
        .images
        .list_by_name(image_name)
        .await
        .expect("image listing failed");
    assert_eq!(images.len(), 1);
    let image = &images[0];

    let prefix = format!("{}-", image.id);
    let chunks: Vec<_> = objects
        .iter()
        .filter(|object| object.name.starts_with(&prefix))
        .collect();
    assert!(
        chunks.len() > 1,
        "expected the gateway to chunk the image data"
    );
    let total_bytes: u64 = chunks.iter().map(|object| object.bytes).sum();
    log::info!(
        "checking image size {:?} matches gateway byte count {total_bytes}",
        image.size
    );
    assert_eq!(image.size, Some(total_bytes));

    // Cleanup removes the chunks along with the image.
    deployment
        .images
        .delete(image.id)
        .await
        .expect("image deletion failed");
    let objects = deployment
        .objects
        .get_container(&container_name)
        .await
        .expect("container listing failed");
    assert!(
        objects
            .iter()
            .all(|object| !object.name.starts_with(&prefix) && object.name != image.id.to_string())
    );
}
