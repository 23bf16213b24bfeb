//! # DPoS Common Crate
//!
//! Utilitas bersama untuk seluruh workspace.
//!
//! ## Modules
//! - `config`: konfigurasi chain (TOML) + validasi
//! - `crypto`: SHA-256, double SHA-256, Base58Check
//!
//! ## Usage
//! ```rust,ignore
//! let cfg = dpos_common::config::load_from_file("chain.toml")?;
//! let addr = dpos_common::crypto::base58check_encode(&raw);
//! ```

pub mod config;
pub mod crypto;

pub use config::{ChainConfig, ConfigError, DAY_MS, ONE_UNIT};
pub use crypto::{base58check_decode, base58check_encode, double_sha256, CryptoError};
