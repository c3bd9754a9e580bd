//! Image / Index リソースのライフサイクル
//!
//! どちらも [`Client`](crate::client::Client) を通してのみ外部と通信する。

pub mod image;
pub mod index;

#[cfg(test)]
pub(crate) mod fake;

pub use image::Image;
pub use index::Index;

/// read の結果。`id` が空ならリソースはもう存在しない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse<A, S> {
    pub id: String,
    pub inputs: A,
    pub state: S,
}

impl<A, S> ReadResponse<A, S> {
    pub fn exists(&self) -> bool {
        !self.id.is_empty()
    }
}
