//! Model, constraint checker and KLV codec for professional audio metadata (PMD).
//!
//! ## Technical Overview
//!
//! PMD describes the audio of a broadcast programme: channel beds, positional
//! objects, the presentations that combine them for one listening
//! configuration, plus loudness, identity/timing and delivery records.
//!
//! ### Document Organization
//!
//! **Model**: one [`model::PmdModel`] owns every entity table, an identifier
//! map per table, and the presentation name registry. Tables are
//! capacity-capped by a [`model::profile::Profile`] constraint set.
//!
//! **Wire form**: a KLV local set, one local tag byte and a BER length per
//! payload, bit-packed fields inside each payload, most significant bit
//! first.
//!
//! ## Quick Start
//!
//! 1. Build a model under a profile with [`model::PmdModel::with_profile`]
//! 2. Populate it through the `add_*` operations
//! 3. Serialize with [`klv::write_payloads`], parse with
//!    [`klv::read_payloads`]
//!
//! ```rust
//! use pmdbits::model::PmdModel;
//! use pmdbits::model::profile::Profile;
//! use pmdbits::klv;
//!
//! let mut model = PmdModel::with_profile(Profile::new(1, 1)?);
//! model.add_signal(1)?;
//! model.add_object(42, Default::default())?;
//!
//! let mut buf = [0u8; 256];
//! let len = klv::write_payloads(&mut model, &mut buf)?;
//!
//! let mut decoded = PmdModel::default();
//! klv::read_payloads(&mut decoded, &buf[..len])?;
//! # Ok::<(), anyhow::Error>(())
//! ```

/// In-memory metadata document.
///
/// - **Root aggregate** ([`model::PmdModel`]): entity tables and frame cycle
/// - **Profiles** ([`model::profile`]): capacity constraints and validation
/// - **Elements** ([`model::element`]): channel beds and positional objects
/// - **Presentations** ([`model::presentation`]): element selections
/// - **Name registry** ([`model::names`]): generation-counted name pool
pub mod model;

/// KLV local-set serialization.
///
/// - **Writer** ([`klv::writer`]): space-gated payload emission
/// - **Reader** ([`klv::reader`]): tag dispatch and field validation
/// - One codec module per payload ([`klv::abd`], [`klv::aod`] and siblings)
pub mod klv;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): bit-level reading/writing
/// - **Numeric codecs** ([`utils::codecs`]): physical unit <-> wire code
/// - **Error Handling** ([`utils::errors`]): error types
pub mod utils;
