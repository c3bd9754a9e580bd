use super::CompressionType;
use crate::defaults::WithDefaults;
use crate::encoding::{Encode, join, kv_bool};
use serde::{Deserialize, Serialize};

/// zstdの最大圧縮レベル
pub const MAX_COMPRESSION_LEVEL: u32 = 22;

/// レイヤー圧縮のオプション（キャッシュとエクスポートで共通）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compression {
    /// 圧縮形式（デフォルト: gzip）
    #[serde(default)]
    pub compression: Option<CompressionType>,
    /// 圧縮レベル（デフォルト: 0、22を上限に丸める）
    #[serde(default)]
    pub compression_level: Option<u32>,
    /// 既存レイヤーも再圧縮する
    #[serde(default)]
    pub force_compression: Option<bool>,
}

impl WithDefaults for Compression {
    fn with_defaults(mut self) -> Self {
        self.compression.get_or_insert(CompressionType::Gzip);
        self.compression_level.get_or_insert(0);
        self.force_compression.get_or_insert(false);
        self
    }
}

impl Encode for Compression {
    fn encode(&self) -> String {
        let level = self.compression_level.unwrap_or(0);
        if level == 0 {
            return String::new();
        }
        join([
            format!(
                "compression={}",
                self.compression.unwrap_or_default().as_str()
            ),
            format!("compression-level={}", level.min(MAX_COMPRESSION_LEVEL)),
            kv_bool("force-compression", self.force_compression),
        ])
    }
}
