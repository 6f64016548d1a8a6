//! # bitsnap
//!
//! Bit-packed snapshots of small typed objects, for shipping frequently
//! updated state over narrow channels.
//!
//! Declare a per-type [schema::Schema]: packed fields laid out in
//! registration order with explicit bit widths, external fields carried
//! out-of-band, and a canonical dump of the logically relevant state.
//! Packing writes the fields into the smallest buffer whose base64 text
//! needs no padding and appends a hash fragment derived from the dump.
//! Unpacking rejects payloads whose length or hash does not match, so stale
//! or foreign snapshots surface as an absent result instead of a corrupt
//! instance. A [tracker::Tracked] wrapper re-packs after every mutation and
//! pushes the result to a callback.
//!
//! ## Example
//!
//! ```
//! use bitsnap::schema::Schema;
//!
//! #[derive(Default)]
//! struct Door {
//!     open: bool,
//!     angle: u64,
//! }
//!
//! let schema = Schema::builder()
//!     .flag("open", |d: &Door| d.open, |d, v| d.open = v)
//!     .integer("angle", 359, |d: &Door| d.angle as i64, |d, v| d.angle = v)
//!     .dump_with(|d| serde_json::json!({ "open": d.open, "angle": d.angle }))
//!     .build()
//!     .unwrap();
//!
//! let packed = schema.pack(&Door { open: true, angle: 90 }).unwrap();
//! let door = schema.unpack(Some(&packed.text), &packed.external).unwrap();
//! assert!(door.open);
//! assert_eq!(door.angle, 90);
//! ```
//!
//! Schemas are read-only once built; build them before the first instance
//! is packed, e.g. in a `LazyLock` static per type.

pub mod bits;
pub mod errors;
pub mod field;
pub mod layout;
pub mod packed;
pub mod schema;
pub mod tracker;
