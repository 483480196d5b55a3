pub mod client;
pub mod event;
pub mod urn;

pub use client::GigClient;
pub use event::RemoteEvent;
pub use urn::Urn;
