//! Connection layer: the public handle to a running camera-sync channel.

pub mod remote;


pub use remote::RemoteConnection;
