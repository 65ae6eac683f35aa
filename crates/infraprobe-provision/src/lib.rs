//! infraprobe provisioning boundary
//!
//! The lifecycle engine talks to infrastructure through exactly two
//! operations, `apply` and `destroy`, exposed by the [`Provisioner`] trait.
//! How resources are represented is entirely up to the adapter.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │      infraprobe-core         │
//! │   (lifecycle, retry, ...)    │
//! └──────────────┬───────────────┘
//!                │ trait Provisioner { apply, destroy }
//!        ┌───────┴────────┐
//! ┌──────▼──────┐  ┌──────▼──────────────┐
//! │  Terraform  │  │ ScriptedProvisioner │
//! │ (CLI, tofu) │  │      (tests)        │
//! └─────────────┘  └─────────────────────┘
//! ```

pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fakes;
pub mod outputs;
pub mod provider;
pub mod terraform;

// Re-exports
pub use error::{ProvisionError, Result};
pub use outputs::{OutputValue, ProvisioningResult};
pub use provider::{ConfigRef, ProvisionOptions, Provisioner};
pub use terraform::Terraform;
