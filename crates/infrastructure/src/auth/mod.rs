//! Authorization code flow adapters

mod browser;
mod loopback;

pub use browser::SystemBrowser;
pub use loopback::LoopbackListener;
