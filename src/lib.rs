pub mod body;
pub mod c_api;
pub mod collision;
pub mod config;
pub mod error;
pub mod integrator;
pub mod possession;
pub mod sandbox;
pub mod scene;
pub mod spawn;
pub mod store;

pub use body::{Body, BodyId, BodyKind, BodySnapshot};
pub use config::{SandboxConfig, Status};
pub use error::{Result, SandboxError};
pub use sandbox::{Sandbox, SpawnRequest};
pub use ultraviolet::DVec2;
