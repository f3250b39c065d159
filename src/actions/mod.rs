//! File actions module.
//!
//! Currently a single action: removing resolved duplicates, either
//! permanently or by moving them to the system trash.
//!
//! ```no_run
//! use mediadedupe::actions::{remove_file, DeletionMode};
//! use std::path::Path;
//!
//! let outcome = remove_file(Path::new("/downloads/copy.png"), DeletionMode::Trash);
//! ```

pub mod delete;

pub use delete::{remove_file, same_file, DeleteError, DeletionMode, RemoveOutcome};
