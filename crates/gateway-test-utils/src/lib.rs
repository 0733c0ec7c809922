//! # Gateway Test Utilities
//!
//! Shared test utilities for the owner gateway.
//!
//! This crate provides:
//! - Server test harness (`TestGatewayServer` for E2E tests)
//! - Store fixtures (`fixtures` - a seeded `MemoryStore` and record builders)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;
//!     let client = reqwest::Client::new();
//!
//!     let response = client
//!         .get(format!("{}/mcp/health", server.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use server_harness::*;
