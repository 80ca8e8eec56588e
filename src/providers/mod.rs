//! Telemetry sources: the UDP telemetry channel and the demo simulator.

pub mod demo;
pub mod udp;

pub use demo::DemoSimulator;
pub use udp::UdpTelemetry;
