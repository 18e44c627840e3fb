// ABOUTME: Docker integration: engine interface, Bollard client, image resolution and container lifecycle

pub mod container_manager;
pub mod engine;
pub mod image_resolver;
pub mod lifecycle;

pub use container_manager::ContainerManager;
pub use engine::{
    ContainerEngine, ContainerHandle, CreatedContainer, EngineError, ImageRecord, RuntimeProfile,
};
pub use image_resolver::{ImageReference, ImageResolver, ResolvedImage};
pub use lifecycle::{ContainerLifecycle, PollPolicy, TeardownReport};
