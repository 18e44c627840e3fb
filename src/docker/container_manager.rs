// ABOUTME: Docker Engine API client using Bollard, implementing the container engine interface

use super::engine::{
    ContainerEngine, ContainerHandle, CreatedContainer, EngineError, ImageRecord, RuntimeProfile,
};
use crate::config::EngineConfig;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogOutput, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::{CreateImageOptions, ListImagesOptions};
use bollard::Docker;
use futures_util::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ContainerManager {
    docker: Docker,
}

impl ContainerManager {
    /// Connect using the transport selected in `config`.
    ///
    /// A Unix socket path wins over a TCP address; with neither set the local
    /// defaults (`DOCKER_HOST` or the platform socket) are used.
    pub fn connect(config: &EngineConfig) -> Result<Self, EngineError> {
        let docker = Self::connect_to_docker(config)?;
        Ok(Self { docker })
    }

    /// Check the engine answers before any session work starts.
    pub async fn ping(&self) -> Result<(), EngineError> {
        self.docker.ping().await?;
        debug!("Docker engine reachable");
        Ok(())
    }

    fn connect_to_docker(config: &EngineConfig) -> Result<Docker, EngineError> {
        if let Some(socket_path) = &config.unix_socket {
            let path = socket_path.to_string_lossy();
            info!("Using Docker socket: {}", path);
            return Docker::connect_with_unix(&path, config.timeout, bollard::API_DEFAULT_VERSION)
                .map_err(EngineError::Connection);
        }

        if let Some(address) = &config.tcp_address {
            info!("Using Docker TCP address: {}", address);
            return Docker::connect_with_http(address, config.timeout, bollard::API_DEFAULT_VERSION)
                .map_err(EngineError::Connection);
        }

        warn!("No Docker address configured, trying default connection");
        Docker::connect_with_local_defaults().map_err(EngineError::Connection)
    }
}

#[async_trait]
impl ContainerEngine for ContainerManager {
    async fn find_image(&self, reference: &str) -> Result<Vec<ImageRecord>, EngineError> {
        let images = self
            .docker
            .list_images(Some(ListImagesOptions::<String> {
                filters: {
                    let mut filters = HashMap::new();
                    filters.insert("reference".to_string(), vec![reference.to_string()]);
                    filters
                },
                ..Default::default()
            }))
            .await?;

        debug!("Found {} local image(s) for {}", images.len(), reference);

        Ok(images
            .into_iter()
            .map(|image| ImageRecord {
                id: image.id,
                repo_tags: image.repo_tags,
            })
            .collect())
    }

    fn pull_image(&self, reference: &str) -> BoxStream<'static, Result<String, EngineError>> {
        info!("Pulling image {}", reference);

        let docker = self.docker.clone();
        let create_image_options = CreateImageOptions {
            from_image: reference.to_string(),
            ..Default::default()
        };

        async_stream::stream! {
            let mut stream = docker.create_image(Some(create_image_options), None, None);

            while let Some(result) = stream.next().await {
                match result {
                    Ok(info) => {
                        if let Some(message) = info.error {
                            yield Err(EngineError::Stream(message));
                            break;
                        }
                        if let Some(status) = info.status {
                            yield Ok(status);
                        }
                    }
                    Err(e) => {
                        yield Err(EngineError::from(e));
                        break;
                    }
                }
            }
        }
        .boxed()
    }

    async fn create_container(
        &self,
        image: &str,
        profile: &RuntimeProfile,
    ) -> Result<CreatedContainer, EngineError> {
        let container_config = Config {
            image: Some(image.to_string()),
            tty: Some(profile.tty),
            attach_stdin: Some(profile.attach_stdin),
            attach_stdout: Some(profile.attach_stdout),
            open_stdin: Some(profile.attach_stdin),
            entrypoint: Some(profile.entrypoint.clone()),
            ..Default::default()
        };

        let create_response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, container_config)
            .await?;

        info!("Created container with ID {}", create_response.id);

        Ok(CreatedContainer {
            handle: ContainerHandle::new(create_response.id),
            warnings: create_response.warnings,
        })
    }

    async fn start_container(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
        info!("Starting container {}", handle);

        self.docker
            .start_container(handle.id(), None::<StartContainerOptions<String>>)
            .await?;

        Ok(())
    }

    async fn is_running(&self, handle: &ContainerHandle) -> Result<bool, EngineError> {
        let container = self
            .docker
            .inspect_container(handle.id(), None::<InspectContainerOptions>)
            .await?;

        let running = container.state.and_then(|state| state.running).unwrap_or(false);
        debug!("Container {} running: {}", handle, running);
        Ok(running)
    }

    async fn create_exec(
        &self,
        handle: &ContainerHandle,
        command: &[String],
    ) -> Result<String, EngineError> {
        debug!("Creating exec in container {}: {:?}", handle, command);

        let exec_options = CreateExecOptions {
            cmd: Some(command.to_vec()),
            attach_stdout: Some(true),
            tty: Some(true),
            ..Default::default()
        };

        let exec = self.docker.create_exec(handle.id(), exec_options).await?;
        Ok(exec.id)
    }

    async fn start_exec(&self, exec_id: &str) -> Result<String, EngineError> {
        let mut result_output = Vec::new();

        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(exec_id, None).await?
        {
            while let Some(msg) = output.next().await {
                match msg? {
                    LogOutput::StdOut { message }
                    | LogOutput::StdErr { message }
                    | LogOutput::Console { message } => {
                        result_output.extend_from_slice(&message);
                    }
                    LogOutput::StdIn { .. } => {}
                }
            }
        }

        Ok(String::from_utf8_lossy(&result_output).into_owned())
    }

    async fn stop_container(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
        info!("Stopping container {}", handle);

        let stop_options = StopContainerOptions { t: 10 }; // 10 second grace period

        match self.docker.stop_container(handle.id(), Some(stop_options)).await {
            Ok(()) => {
                info!("Successfully stopped container {}", handle);
                Ok(())
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                debug!("Container {} was already stopped", handle);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_container(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
        info!("Removing container {}", handle);

        let remove_options = RemoveContainerOptions {
            v: true, // Remove associated volumes
            ..Default::default()
        };

        self.docker
            .remove_container(handle.id(), Some(remove_options))
            .await?;

        info!("Successfully removed container {}", handle);
        Ok(())
    }
}
