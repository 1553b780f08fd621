//! roseingrave-core library.
//!
//! Reconciles volunteer transcription data into canonical per-piece
//! records. The core works on parsed JSON documents and sheet grids; file
//! and spreadsheet I/O belongs to callers (see [`store`] for the file side).
//!
//! # Conventions
//!
//! - **Errors**: each module has its own `thiserror` enum with a `code()`;
//!   reconcilable problems are [`diagnostics::Warning`]s returned in a
//!   [`diagnostics::Checked`].
//! - **Logging**: `tracing` macros only (`info!` for stages, `warn!` for
//!   every recorded warning, `debug!` for combination notices).

pub mod aggregate;
pub mod definitions;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod model;
pub mod piece_data;
pub mod settings;
pub mod shape;
pub mod sheet;
pub mod store;
pub mod summary;
pub mod template;

pub use definitions::{PieceDefinitions, VolunteerDefinitions};
pub use diagnostics::{Checked, Location, StrictError, Warning, WarningKind, Warnings};
pub use error::ErrorCode;
pub use model::{Combine, Piece, Source, Volunteer};
pub use piece_data::PieceData;
pub use shape::{Assign, Diagnostics, Leaf, Shape, reconcile};
pub use template::{Template, load_template};
