//! リソースのスキーマ
//!
//! Image / Index リソースの引数・状態と、それらを構成するキャッシュ・エクスポート等の型。

mod builder;
mod cache;
mod compression;
mod context;
mod dockerfile;
mod enums;
mod export;
mod image;
mod index;
mod registry;
mod ssh;

pub use builder::*;
pub use cache::*;
pub use compression::*;
pub use context::*;
pub use dockerfile::*;
pub use enums::*;
pub use export::*;
pub use image::*;
pub use index::*;
pub use registry::*;
pub use ssh::*;
