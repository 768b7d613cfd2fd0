#[cfg(feature = "codec")]
mod codec;
mod helpers;
mod ir;
mod schedule;

#[cfg(feature = "codec")]
pub use codec::UartLineCodec;
pub use ir::*;
pub use schedule::*;
