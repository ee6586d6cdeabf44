//! # SchemaPin - Rust Implementation
//!
//! Cryptographic integrity and authenticity verification for AI tool schemas
//! and skill directories. Tool publishers sign a schema (or a whole skill
//! directory) with an ECDSA P-256 key; callers discover the publisher's
//! public key over `.well-known/schemapin.json`, pin it the first time
//! they see it (trust-on-first-use), and re-verify the signature on every
//! later use. A key change after the first pin is rejected unless a
//! revocation document explains it or an interactive pinning policy
//! approves it.
//!
//! ## Features
//!
//! - **ECDSA P-256 signing/verification** ([`crypto`]) with SHA-256 over a
//!   canonical JSON encoding ([`canonicalize`]) or a skill directory's
//!   sorted file manifest ([`skill`])
//! - **Discovery** ([`discovery`], [`resolver`]) of a domain's publisher key
//!   via `.well-known/schemapin.json`, a local trust bundle, or a
//!   caller-supplied chain of resolvers
//! - **Revocation** ([`revocation`]) via an inline revoked-key list and/or a
//!   standalone revocation document
//! - **TOFU key pinning** ([`pinning`]) with an optional interactive policy
//!   layer ([`policy`]) for operator-approved key rotation
//! - **Deterministic verification** ([`verification`]) combining discovery,
//!   revocation, pinning, and signature checks into one structured result
//!
//! ## Quick Start
//!
//! ```rust
//! use schemapin::crypto::{generate_key_pair, sign_data, verify_signature, calculate_key_id};
//!
//! // Generate a new key pair
//! let key_pair = generate_key_pair().unwrap();
//!
//! // Sign some data
//! let data = b"Hello, World!";
//! let signature = sign_data(&key_pair.private_key_pem, data).unwrap();
//!
//! // Verify the signature
//! let is_valid = verify_signature(&key_pair.public_key_pem, data, &signature).unwrap();
//! assert!(is_valid);
//!
//! // Calculate key ID
//! let key_id = calculate_key_id(&key_pair.public_key_pem).unwrap();
//! println!("Key ID: {}", key_id);
//! ```
//!
//! ## Security
//!
//! This implementation uses:
//! - ECDSA with P-256 curve (secp256r1) for signatures
//! - SHA-256 for hashing and signature algorithms
//! - Secure random number generation
//! - Constant-time operations where possible
//!
//! ## Error Handling
//!
//! Cryptographic primitives in [`crypto`] return [`crypto::Error`]; every
//! higher-level module returns [`error::Error`], which [`crypto::Error`]
//! converts into. Verification entry points never return `Result` — they
//! return a [`verification::VerificationResult`] so that a signature
//! failure, a revoked key, and a pin mismatch are all ordinary data rather
//! than an error path a caller might forget to handle.

pub mod cancellation;
pub mod canonicalize;
pub mod crypto;
pub mod discovery;
pub mod error;
pub mod pinning;
pub mod policy;
pub mod resolver;
pub mod revocation;
pub mod skill;
pub mod types;
pub mod verification;
