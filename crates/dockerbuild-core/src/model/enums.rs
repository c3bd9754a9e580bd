//! スキーマの列挙型

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// キャッシュのエクスポートモード
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// 最終イメージのレイヤーのみ（デフォルト）
    #[default]
    Min,
    /// 中間レイヤーも含める
    Max,
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// レイヤーの圧縮形式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    #[default]
    Gzip,
    Estargz,
    Zstd,
}

impl CompressionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Estargz => "estargz",
            Self::Zstd => "zstd",
        }
    }
}

/// RUN命令のネットワークモード
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// デフォルトのネットワーク
    #[default]
    Default,
    /// ホストのネットワークを使う
    Host,
    /// ネットワークなし
    None,
}

impl NetworkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Host => "host",
            Self::None => "none",
        }
    }
}

macro_rules! impl_display {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

impl_display!(CacheMode, CompressionType, NetworkMode);

macro_rules! platforms {
    ($($variant:ident => $value:literal),* $(,)?) => {
        /// ビルド対象のプラットフォーム (`os/arch`)
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum Platform {
            $($variant,)*
        }

        impl Platform {
            pub const ALL: &'static [Platform] = &[$(Platform::$variant,)*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value,)*
                }
            }

            /// 文字列からパース
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($value => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

platforms! {
    Darwin386 => "darwin/386",
    DarwinAmd64 => "darwin/amd64",
    DarwinArm => "darwin/arm",
    DarwinArm64 => "darwin/arm64",
    DragonflyAmd64 => "dragonfly/amd64",
    Freebsd386 => "freebsd/386",
    FreebsdAmd64 => "freebsd/amd64",
    FreebsdArm => "freebsd/arm",
    Linux386 => "linux/386",
    LinuxAmd64 => "linux/amd64",
    LinuxArm => "linux/arm",
    LinuxArm64 => "linux/arm64",
    LinuxMips64 => "linux/mips64",
    LinuxMips64le => "linux/mips64le",
    LinuxPpc64le => "linux/ppc64le",
    LinuxRiscv64 => "linux/riscv64",
    LinuxS390x => "linux/s390x",
    Netbsd386 => "netbsd/386",
    NetbsdAmd64 => "netbsd/amd64",
    NetbsdArm => "netbsd/arm",
    Openbsd386 => "openbsd/386",
    OpenbsdAmd64 => "openbsd/amd64",
    OpenbsdArm => "openbsd/arm",
    Plan9386 => "plan9/386",
    Plan9Amd64 => "plan9/amd64",
    SolarisAmd64 => "solaris/amd64",
    Windows386 => "windows/386",
    WindowsAmd64 => "windows/amd64",
}

impl_display!(Platform);

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown platform {s:?}"))
    }
}

impl TryFrom<String> for Platform {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.as_str().to_string()
    }
}
