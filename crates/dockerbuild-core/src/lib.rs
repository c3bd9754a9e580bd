//! dockerbuild core
//!
//! Image / Index リソースのスキーマ、デフォルト値、buildx CLI形式へのエンコード、
//! 入力検証、プレビュー時の正規化、イメージ参照のパース、Dockerfileの構文チェック、
//! ビルドコンテキストのハッシュ計算、差分計算を提供します。

pub mod check;
pub mod defaults;
pub mod diff;
pub mod encoding;
pub mod entry;
pub mod error;
pub mod hash;
pub mod ignore;
pub mod model;
pub mod options;
pub mod path;
pub mod preview;
pub mod reference;
pub mod syntax;

pub use defaults::WithDefaults;
pub use diff::{DiffKind, DiffResponse};
pub use encoding::Encode;
pub use entry::{CacheEntry, ExportEntry, parse_cache, parse_export};
pub use error::{CheckFailure, CheckFailures, CoreError, Result};
pub use hash::hash_build_context;
pub use model::*;
pub use options::{Build, BuildOptions};
pub use reference::{Reference, add_digest, registry_host};
pub use syntax::check_dockerfile;
