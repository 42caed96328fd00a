#![forbid(unsafe_code)]

//! Support code for the `linkstore` command-line tool.
//!
//! A fixture is a JSON document describing tables, their value and link columns, and
//! their rows. Loading one yields a populated [`crate::storage::Group`].

mod fixture;

/// Fixture loading.
///
/// Link cells name target rows by their ordinal in the fixture, so fixtures are
/// independent of the row keys the group assigns.
pub use fixture::{
    build_fixture, load_fixture, ColumnDef, Fixture, FixtureError, LoadedFixture, PrimaryKeyDef,
    TableDef,
};
