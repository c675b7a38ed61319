//! Shared state of the simulated deployment: the service supervisor, the
//! configuration store with its rendered files, the image registry, and the
//! object-store gateway backend.

use crate::error::TestbedError;
use crate::options::TestbedOptions;
use chrono::Utc;
use dashmap::DashMap;
use imgcheck::api::{CreateImageRequest, ServiceStatus};
use imgcheck::{
    ConfigDelta, ConfigSections, ContainerSummary, DiskFormat, Image, ImageStatus, Release,
    ServiceState, StoreBackend, StoredObject, debug, info,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

pub const IMAGE_API_SERVICE: &str = "image-api";
pub const IMAGE_REGISTRY_SERVICE: &str = "image-registry";
pub const IMAGE_API_CONF: &str = "/etc/image-api/image-api.conf";

/// Container the gateway backend writes image chunks into.
pub const GATEWAY_CONTAINER: &str = "images";
pub const GATEWAY_CHUNK_SIZE: usize = 64 * 1024;

pub const DEFAULT_DISK_FORMATS: &str = "ami,ari,aki,vhd,vmdk,raw,qcow2,vdi,iso,root-tar";

/// Size of the fixture image served as the reference image source. Not a
/// multiple of the chunk size, so gateway uploads produce a short tail chunk.
pub const REFERENCE_IMAGE_SIZE: usize = 150_000;

struct OptionSpec {
    name: &'static str,
    file: &'static str,
    section: &'static str,
    key: &'static str,
    default: &'static str,
}

const OPTION_SPECS: [OptionSpec; 2] = [
    OptionSpec {
        name: "disk-formats",
        file: IMAGE_API_CONF,
        section: "image_format",
        key: "disk_formats",
        default: DEFAULT_DISK_FORMATS,
    },
    OptionSpec {
        name: "debug",
        file: IMAGE_API_CONF,
        section: "DEFAULT",
        key: "debug",
        default: "false",
    },
];

fn spec_for(name: &str) -> Option<&'static OptionSpec> {
    OPTION_SPECS.iter().find(|spec| spec.name == name)
}

#[derive(Debug, Clone)]
struct ServiceEntry {
    state: ServiceState,
    restart_count: u64,
    last_restart: Option<String>,
    watches: Vec<&'static str>,
}

impl ServiceEntry {
    fn new(watches: &[&'static str]) -> Self {
        Self {
            state: ServiceState::Running,
            restart_count: 0,
            last_restart: None,
            watches: watches.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
struct ObjectEntry {
    data: Vec<u8>,
    last_modified: String,
}

pub struct DeploymentState {
    release: Release,
    auth_name: String,
    auth_secret: String,
    account: String,
    tokens: DashMap<String, String>,
    services: RwLock<BTreeMap<String, ServiceEntry>>,
    options: RwLock<BTreeMap<String, String>>,
    // Parsed view of the rendered files, reloaded when a service restarts.
    effective: RwLock<BTreeMap<String, ConfigSections>>,
    images: DashMap<Uuid, Image>,
    image_data: DashMap<Uuid, Vec<u8>>,
    containers: RwLock<BTreeMap<String, BTreeMap<String, ObjectEntry>>>,
    conf_dir: TempDir,
}

impl DeploymentState {
    pub fn new(options: &TestbedOptions) -> Result<Self, TestbedError> {
        let conf_dir = tempfile::tempdir()
            .map_err(|e| TestbedError::from_io("creating rendered-config dir", e))?;

        let mut services = BTreeMap::new();
        services.insert(
            IMAGE_API_SERVICE.to_string(),
            ServiceEntry::new(&[IMAGE_API_CONF]),
        );
        // The registry service only exists on releases before bionic_stein;
        // it watches the same config file as the API service.
        if options.release < Release::BionicStein {
            services.insert(
                IMAGE_REGISTRY_SERVICE.to_string(),
                ServiceEntry::new(&[IMAGE_API_CONF]),
            );
        }
        let service_names: Vec<String> = services.keys().cloned().collect();

        let defaults = OPTION_SPECS
            .iter()
            .map(|spec| (spec.name.to_string(), spec.default.to_string()))
            .collect();

        let state = Self {
            release: options.release,
            auth_name: options.auth_name.clone(),
            auth_secret: options.auth_secret.clone(),
            account: options.account.clone(),
            tokens: DashMap::new(),
            services: RwLock::new(services),
            options: RwLock::new(defaults),
            effective: RwLock::new(BTreeMap::new()),
            images: DashMap::new(),
            image_data: DashMap::new(),
            containers: RwLock::new(BTreeMap::new()),
            conf_dir,
        };

        let files: BTreeSet<&'static str> = OPTION_SPECS.iter().map(|spec| spec.file).collect();
        for file in files {
            state.render_file(file)?;
        }
        for name in service_names {
            state.load_effective(&name)?;
        }
        Ok(state)
    }

    pub fn release(&self) -> Release {
        self.release
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// The deterministic fixture blob served as the reference image source.
    pub fn reference_image() -> Vec<u8> {
        (0..REFERENCE_IMAGE_SIZE).map(|i| (i % 251) as u8).collect()
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    pub fn issue_token(&self, name: &str, secret: &str) -> Option<String> {
        if name != self.auth_name || secret != self.auth_secret {
            return None;
        }
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(token.clone(), name.to_string());
        Some(token)
    }

    pub fn token_valid(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    // =========================================================================
    // SERVICES
    // =========================================================================

    pub fn service_statuses(&self) -> Vec<ServiceStatus> {
        self.services
            .read()
            .iter()
            .map(|(name, entry)| ServiceStatus {
                name: name.clone(),
                state: entry.state,
                restart_count: entry.restart_count,
                last_restart: entry.last_restart.clone(),
            })
            .collect()
    }

    pub fn service_status(&self, name: &str) -> Option<ServiceStatus> {
        self.services.read().get(name).map(|entry| ServiceStatus {
            name: name.to_string(),
            state: entry.state,
            restart_count: entry.restart_count,
            last_restart: entry.last_restart.clone(),
        })
    }

    pub fn service_running(&self, name: &str) -> bool {
        self.services
            .read()
            .get(name)
            .map(|entry| entry.state == ServiceState::Running)
            .unwrap_or(false)
    }

    pub fn pause_service(&self, name: &str) -> Result<ServiceStatus, TestbedError> {
        {
            let mut services = self.services.write();
            let entry = services
                .get_mut(name)
                .ok_or_else(|| TestbedError::UnknownService {
                    name: name.to_string(),
                })?;
            entry.state = ServiceState::Stopped;
        }
        Ok(self.service_status(name).expect("service just updated"))
    }

    pub fn resume_service(&self, name: &str) -> Result<ServiceStatus, TestbedError> {
        self.restart_service(name)?;
        Ok(self.service_status(name).expect("service just updated"))
    }

    /// (Re)start a service: bump its restart counter and reload its
    /// effective configuration from the rendered files it watches.
    fn restart_service(&self, name: &str) -> Result<(), TestbedError> {
        {
            let mut services = self.services.write();
            let entry = services
                .get_mut(name)
                .ok_or_else(|| TestbedError::UnknownService {
                    name: name.to_string(),
                })?;
            entry.state = ServiceState::Running;
            entry.restart_count += 1;
            entry.last_restart = Some(Utc::now().to_rfc3339());
            info!("restarted service '{name}' (count {})", entry.restart_count);
        }
        self.load_effective(name)
    }

    fn load_effective(&self, name: &str) -> Result<(), TestbedError> {
        let watches = {
            let services = self.services.read();
            services
                .get(name)
                .ok_or_else(|| TestbedError::UnknownService {
                    name: name.to_string(),
                })?
                .watches
                .clone()
        };
        let mut merged = ConfigSections::new();
        for file in watches {
            let content = self.read_rendered(file)?;
            let sections =
                ConfigSections::parse(&content).map_err(|e| TestbedError::MalformedRender {
                    file: file.to_string(),
                    message: e.to_string(),
                })?;
            merged.merge(sections);
        }
        self.effective.write().insert(name.to_string(), merged);
        Ok(())
    }

    // =========================================================================
    // CONFIGURATION
    // =========================================================================

    pub fn config_options(&self) -> ConfigDelta {
        let options = self.options.read();
        let mut delta = ConfigDelta::new();
        for (name, value) in options.iter() {
            delta = delta.with(name, value);
        }
        delta
    }

    /// Apply an option delta: update values, re-render the owning files, and
    /// restart every service watching one of them. An unknown option rejects
    /// the whole delta without side effects.
    pub fn apply_config(&self, delta: &ConfigDelta) -> Result<(), TestbedError> {
        let mut specs = Vec::new();
        for (name, value) in delta.iter() {
            let spec = spec_for(name).ok_or_else(|| TestbedError::UnknownOption {
                name: name.to_string(),
            })?;
            specs.push((spec, value.to_string()));
        }

        {
            let mut options = self.options.write();
            for (spec, value) in &specs {
                options.insert(spec.name.to_string(), value.clone());
            }
        }

        let files: BTreeSet<&'static str> = specs.iter().map(|(spec, _)| spec.file).collect();
        for file in &files {
            self.render_file(file)?;
        }

        let watchers: Vec<String> = {
            let services = self.services.read();
            services
                .iter()
                .filter(|(_, entry)| entry.watches.iter().any(|watch| files.contains(watch)))
                .map(|(name, _)| name.clone())
                .collect()
        };
        for name in watchers {
            self.restart_service(&name)?;
        }
        Ok(())
    }

    /// The rendered text of a config file, if it exists.
    pub fn rendered_file(&self, file: &str) -> Option<String> {
        fs::read_to_string(self.disk_path(file)).ok()
    }

    fn read_rendered(&self, file: &str) -> Result<String, TestbedError> {
        fs::read_to_string(self.disk_path(file))
            .map_err(|e| TestbedError::from_io(&format!("reading rendered '{file}'"), e))
    }

    fn render_file(&self, file: &str) -> Result<(), TestbedError> {
        let sections = {
            let options = self.options.read();
            let mut sections = ConfigSections::new();
            for spec in OPTION_SPECS.iter().filter(|spec| spec.file == file) {
                let value = options
                    .get(spec.name)
                    .cloned()
                    .unwrap_or_else(|| spec.default.to_string());
                sections = sections.with_option(spec.section, spec.key, &value);
            }
            sections
        };
        let path = self.disk_path(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| TestbedError::from_io(&format!("creating parent of '{file}'"), e))?;
        }
        debug!("rendering '{file}' to {}", path.display());
        fs::write(&path, sections.render())
            .map_err(|e| TestbedError::from_io(&format!("writing rendered '{file}'"), e))
    }

    fn disk_path(&self, file: &str) -> PathBuf {
        self.conf_dir.path().join(file.trim_start_matches('/'))
    }

    /// Disk formats the image API currently accepts, per its effective
    /// (restart-loaded) configuration.
    pub fn allowed_disk_formats(&self) -> Vec<DiskFormat> {
        let effective = self.effective.read();
        effective
            .get(IMAGE_API_SERVICE)
            .and_then(|sections| sections.get("image_format", "disk_formats"))
            .and_then(|values| values.first())
            .and_then(|value| DiskFormat::parse_list(value).ok())
            .unwrap_or_else(|| DiskFormat::ALL.to_vec())
    }

    // =========================================================================
    // IMAGES
    // =========================================================================

    pub fn register_image(&self, request: &CreateImageRequest) -> Result<Image, TestbedError> {
        let allowed = self.allowed_disk_formats();
        if !allowed.contains(&request.disk_format) {
            return Err(TestbedError::DiskFormatDisabled {
                format: request.disk_format,
            });
        }
        let image = Image::new(
            request.name.clone(),
            request.disk_format,
            request.container_format.clone(),
            request.backend,
        );
        self.images.insert(image.id, image.clone());
        Ok(image)
    }

    pub fn image(&self, id: Uuid) -> Option<Image> {
        self.images.get(&id).map(|entry| entry.value().clone())
    }

    pub fn images_by_name(&self, name: Option<&str>) -> Vec<Image> {
        let mut images: Vec<Image> = self
            .images
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|image| name.is_none_or(|name| image.name == name))
            .collect();
        images.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        images
    }

    pub fn upload_image_data(&self, id: Uuid, data: Vec<u8>) -> Result<Image, TestbedError> {
        let mut entry = self
            .images
            .get_mut(&id)
            .ok_or(TestbedError::ImageNotFound { id })?;
        if entry.status != ImageStatus::Queued {
            return Err(TestbedError::ImageNotQueued {
                id,
                status: entry.status,
            });
        }
        let size = data.len() as u64;
        match entry.backend.unwrap_or(StoreBackend::File) {
            StoreBackend::File => {
                self.image_data.insert(id, data);
            }
            StoreBackend::Swift => self.gateway_store(id, &data),
        }
        entry.size = Some(size);
        entry.status = ImageStatus::Active;
        Ok(entry.value().clone())
    }

    pub fn remove_image(&self, id: Uuid) -> Result<(), TestbedError> {
        let (_, image) = self
            .images
            .remove(&id)
            .ok_or(TestbedError::ImageNotFound { id })?;
        self.image_data.remove(&id);
        if image.backend == Some(StoreBackend::Swift) {
            self.gateway_delete(id);
        }
        Ok(())
    }

    // =========================================================================
    // OBJECT-STORE GATEWAY
    // =========================================================================

    /// Store image data the way the gateway backend lays it out: a zero-byte
    /// manifest object named after the image plus fixed-size data chunks
    /// suffixed `-00001`, `-00002`, ...
    fn gateway_store(&self, id: Uuid, data: &[u8]) {
        let now = Utc::now().to_rfc3339();
        let mut containers = self.containers.write();
        let container = containers.entry(GATEWAY_CONTAINER.to_string()).or_default();
        container.insert(
            id.to_string(),
            ObjectEntry {
                data: Vec::new(),
                last_modified: now.clone(),
            },
        );
        for (index, chunk) in data.chunks(GATEWAY_CHUNK_SIZE).enumerate() {
            container.insert(
                format!("{id}-{:05}", index + 1),
                ObjectEntry {
                    data: chunk.to_vec(),
                    last_modified: now.clone(),
                },
            );
        }
    }

    fn gateway_delete(&self, id: Uuid) {
        let manifest = id.to_string();
        let prefix = format!("{id}-");
        let mut containers = self.containers.write();
        if let Some(container) = containers.get_mut(GATEWAY_CONTAINER) {
            container.retain(|name, _| name != &manifest && !name.starts_with(&prefix));
        }
    }

    pub fn container_summaries(&self) -> Vec<ContainerSummary> {
        self.containers
            .read()
            .iter()
            .map(|(name, objects)| ContainerSummary {
                name: name.clone(),
                count: objects.len() as u64,
                bytes: objects.values().map(|object| object.data.len() as u64).sum(),
            })
            .collect()
    }

    pub fn container_objects(&self, name: &str) -> Option<Vec<StoredObject>> {
        self.containers.read().get(name).map(|objects| {
            objects
                .iter()
                .map(|(name, object)| StoredObject {
                    name: name.clone(),
                    bytes: object.data.len() as u64,
                    last_modified: object.last_modified.clone(),
                })
                .collect()
        })
    }

    /// Returns false when the container already existed.
    pub fn create_container(&self, name: &str) -> bool {
        let mut containers = self.containers.write();
        if containers.contains_key(name) {
            return false;
        }
        containers.insert(name.to_string(), BTreeMap::new());
        true
    }

    pub fn put_object(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
    ) -> Result<(), TestbedError> {
        let mut containers = self.containers.write();
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| TestbedError::ContainerNotFound {
                name: container.to_string(),
            })?;
        objects.insert(
            name.to_string(),
            ObjectEntry {
                data,
                last_modified: Utc::now().to_rfc3339(),
            },
        );
        Ok(())
    }

    pub fn delete_object(&self, container: &str, name: &str) -> Result<(), TestbedError> {
        let mut containers = self.containers.write();
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| TestbedError::ContainerNotFound {
                name: container.to_string(),
            })?;
        objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| TestbedError::ObjectNotFound {
                container: container.to_string(),
                name: name.to_string(),
            })
    }

    pub fn delete_container(&self, name: &str) -> Result<(), TestbedError> {
        let mut containers = self.containers.write();
        let objects = containers
            .get(name)
            .ok_or_else(|| TestbedError::ContainerNotFound {
                name: name.to_string(),
            })?;
        if !objects.is_empty() {
            return Err(TestbedError::ContainerNotEmpty {
                name: name.to_string(),
            });
        }
        containers.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DeploymentState {
        DeploymentState::new(&TestbedOptions::default()).unwrap()
    }

    fn state_with_release(release: Release) -> DeploymentState {
        let options = TestbedOptions {
            release,
            ..TestbedOptions::default()
        };
        DeploymentState::new(&options).unwrap()
    }

    #[test]
    fn registry_service_exists_only_before_stein() {
        let old = state_with_release(Release::BionicQueens);
        assert!(old.service_status(IMAGE_REGISTRY_SERVICE).is_some());

        let new = state_with_release(Release::BionicStein);
        assert!(new.service_status(IMAGE_REGISTRY_SERVICE).is_none());
        assert!(new.service_status(IMAGE_API_SERVICE).is_some());
    }

    #[test_log::test]
    fn apply_config_renders_file_and_restarts_watchers() {
        let state = state();
        let before = state.service_status(IMAGE_API_SERVICE).unwrap();

        let delta = ConfigDelta::new().with("disk-formats", "qcow2");
        state.apply_config(&delta).unwrap();

        let after = state.service_status(IMAGE_API_SERVICE).unwrap();
        assert!(after.restart_count > before.restart_count);
        assert!(after.last_restart.is_some());

        let rendered = state.rendered_file(IMAGE_API_CONF).unwrap();
        let sections = ConfigSections::parse(&rendered).unwrap();
        assert_eq!(
            sections.get("image_format", "disk_formats"),
            Some(&["qcow2".to_string()][..])
        );
        assert_eq!(state.allowed_disk_formats(), vec![DiskFormat::Qcow2]);
    }

    #[test]
    fn unknown_option_rejects_delta_without_side_effects() {
        let state = state();
        let before = state.service_status(IMAGE_API_SERVICE).unwrap();

        let delta = ConfigDelta::new()
            .with("disk-formats", "qcow2")
            .with("flavor", "keystone");
        let err = state.apply_config(&delta).unwrap_err();
        assert_eq!(
            err,
            TestbedError::UnknownOption {
                name: "flavor".to_string()
            }
        );

        let after = state.service_status(IMAGE_API_SERVICE).unwrap();
        assert_eq!(after.restart_count, before.restart_count);
        assert_eq!(state.config_options().get("disk-formats"), Some(DEFAULT_DISK_FORMATS));
    }

    #[test]
    fn restricted_formats_reject_registration_until_reverted() {
        let state = state();
        state
            .apply_config(&ConfigDelta::new().with("disk-formats", "qcow2"))
            .unwrap();

        let request = CreateImageRequest {
            name: "machine-image".to_string(),
            disk_format: DiskFormat::Raw,
            container_format: "bare".to_string(),
            backend: None,
        };
        let err = state.register_image(&request).unwrap_err();
        assert_eq!(
            err,
            TestbedError::DiskFormatDisabled {
                format: DiskFormat::Raw
            }
        );

        state
            .apply_config(&ConfigDelta::new().with("disk-formats", DEFAULT_DISK_FORMATS))
            .unwrap();
        assert!(state.register_image(&request).is_ok());
    }

    #[test_log::test]
    fn gateway_upload_chunks_and_reconciles_byte_counts() {
        let state = state();
        let data = DeploymentState::reference_image();
        let request = CreateImageRequest {
            name: "gateway-image".to_string(),
            disk_format: DiskFormat::Qcow2,
            container_format: "bare".to_string(),
            backend: Some(StoreBackend::Swift),
        };
        let image = state.register_image(&request).unwrap();
        let image = state.upload_image_data(image.id, data.clone()).unwrap();

        assert_eq!(image.status, ImageStatus::Active);
        assert_eq!(image.size, Some(data.len() as u64));

        let containers = state.container_summaries();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, GATEWAY_CONTAINER);

        let objects = state.container_objects(GATEWAY_CONTAINER).unwrap();
        let prefix = format!("{}-", image.id);
        let chunks: Vec<_> = objects
            .iter()
            .filter(|object| object.name.starts_with(&prefix))
            .collect();
        assert_eq!(chunks.len(), data.len().div_ceil(GATEWAY_CHUNK_SIZE));
        let total: u64 = chunks.iter().map(|object| object.bytes).sum();
        assert_eq!(Some(total), image.size);

        // The manifest object itself is empty.
        let manifest = objects
            .iter()
            .find(|object| object.name == image.id.to_string())
            .unwrap();
        assert_eq!(manifest.bytes, 0);

        state.remove_image(image.id).unwrap();
        let objects = state.container_objects(GATEWAY_CONTAINER).unwrap();
        assert!(objects.is_empty());
    }

    #[test]
    fn upload_is_rejected_once_an_image_is_active() {
        let state = state();
        let request = CreateImageRequest {
            name: "machine-image".to_string(),
            disk_format: DiskFormat::Qcow2,
            container_format: "bare".to_string(),
            backend: None,
        };
        let image = state.register_image(&request).unwrap();
        state.upload_image_data(image.id, vec![1, 2, 3]).unwrap();

        let err = state.upload_image_data(image.id, vec![4, 5, 6]).unwrap_err();
        assert_eq!(
            err,
            TestbedError::ImageNotQueued {
                id: image.id,
                status: ImageStatus::Active,
            }
        );
    }

    #[test]
    fn pause_and_resume_drive_service_state() {
        let state = state();
        assert!(state.service_running(IMAGE_API_SERVICE));

        let paused = state.pause_service(IMAGE_API_SERVICE).unwrap();
        assert_eq!(paused.state, ServiceState::Stopped);
        assert!(!state.service_running(IMAGE_API_SERVICE));

        let resumed = state.resume_service(IMAGE_API_SERVICE).unwrap();
        assert_eq!(resumed.state, ServiceState::Running);
        assert!(resumed.restart_count > paused.restart_count);
    }

    #[test]
    fn tokens_are_only_issued_for_matching_credentials() {
        let state = state();
        assert!(state.issue_token("imgcheck", "wrong").is_none());

        let token = state.issue_token("imgcheck", "imgcheck-secret").unwrap();
        assert!(state.token_valid(&token));
        assert!(!state.token_valid("forged"));
    }
}
