/*!
# CESI DevKit - Stubs and helpers for testing the control plane

- Scripted node client (no supervisor daemons needed)
- In-memory configuration source and YAML fixture builder
- In-memory credential store
- A harness wiring a real topology store to a temporary config file
*/

pub mod config_fixtures;
pub mod memory_credentials;
pub mod node_stub;
pub mod test_utils;

pub use config_fixtures::{ConfigBuilder, MemorySource};
pub use memory_credentials::MemoryCredentialStore;
pub use node_stub::StubNodeClient;
pub use test_utils::{init_test_logging, TestHarness};
