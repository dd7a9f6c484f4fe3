//! depthlink-signaling
//!
//! Talks to the relay running on the phone and drives the offer/answer
//! exchange. The peer connection is abstracted by [`PeerSession`].

pub mod client;
pub mod negotiate;

pub use client::{SessionDescription, SignalingClient};
pub use negotiate::{acquire_stream, wait_for_ice, PeerSession};
