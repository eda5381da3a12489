//! # assetgen
//!
//! Generates the image derivatives an iOS project needs from a handful of
//! hand-made sources: the full app-icon set, launch images, retina siblings
//! (`@2x`/`@3x`) and downscaled previews. A watch mode keeps retina or
//! preview siblings in step while sources are edited.
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────────┐
//! source ──► │ BatchDriver  │ ──► codec decode ──► strategy ──► codec encode ──► files
//!            └──────▲───────┘
//!                   │ regenerate(source)
//!            ┌──────┴───────────┐
//! notify ──► │ WatchCoordinator │ ◄── Namer::is_own_derivative drops self-raised events
//!            └──────────────────┘
//! ```
//!
//! Geometry is data: a [`catalog::Catalog`] is a list of named output sizes,
//! each tagged with the [`catalog::StrategyId`] that produces it. The batch
//! driver decodes a source once and runs every entry through
//! [`imaging::apply`]; per-entry failures land in the report and never stop
//! the batch.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | Derivative filename conventions: retina suffixes, preview markers, anti-loop check |
//! | [`catalog`] | Static geometry tables for app icons and launch images |
//! | [`imaging`] | Codec seam plus the pure transform strategies |
//! | [`batch`] | Batch driver: catalogs, retina derivation, previews, per-entry reporting |
//! | [`cache`] | Per-output cache manifest so unchanged catalog entries are skipped |
//! | [`watch`] | Filesystem subscription, event filtering, regeneration dispatch |
//! | [`appiconset`] | `Contents.json` written next to the generated icons |
//! | [`config`] | Layered `assetgen.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting for batch and watch runs |
//!
//! # Design Decisions
//!
//! ## One Event Consumer
//!
//! The watch loop handles events one at a time from a single channel. A
//! regeneration writes files inside the watched tree, which raises more
//! events; those are recognised by name and dropped, so the loop never
//! feeds itself.
//!
//! ## Integer Geometry
//!
//! Retina derivation uses `w * to / from` integer arithmetic, so a 2x source
//! yields an exact half-size 1x. Launch-image padding keeps its historical
//! rounding so regenerated assets match previously shipped ones pixel for
//! pixel.

pub mod appiconset;
pub mod batch;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
