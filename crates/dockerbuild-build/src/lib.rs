//! dockerbuild のビルドランタイム
//!
//! Docker Engine / buildx / レジストリとのやり取りと、
//! Image / Index リソースのライフサイクル（create, read, update, delete, diff）を提供します。

pub mod auth;
pub mod builder;
pub mod buildx;
pub mod client;
pub mod context;
pub mod error;
pub mod host;
pub mod progress;
pub mod registry;
pub mod resource;

pub use auth::{AuthConfig, AuthMap, RegistryAuth};
pub use builder::DaemonBuilder;
pub use buildx::{BuilderInfo, Buildx};
pub use client::{Client, DockerClient, IMAGE_DIGEST_KEY, SolveResponse};
pub use context::ContextBuilder;
pub use error::{BuildError, BuildResult};
pub use host::Host;
pub use progress::BuildProgress;
pub use registry::{Descriptor, RegistryClient};
pub use resource::{Image, Index, ReadResponse};
