//! Chess opening book and lookup.
//!
//! Openings are stored as UCI lines and indexed by every position they pass
//! through, so a game can be matched to its opening from its FEN alone. A
//! built-in catalogue of common lines is included and custom books can be
//! loaded from JSON.

pub mod book;
pub mod builtin;
pub mod opening;

pub use book::{shared_book, BookError, OpeningBook, OpeningMatcher};
pub use builtin::{builtin_book, builtin_openings};
pub use opening::Opening;
