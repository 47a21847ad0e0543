//! File actions module.
//!
//! Deletion of duplicates after a scan:
//! - Move to system trash (default, recoverable)
//! - Permanent deletion (explicit opt-in)
//! - Confirmation before anything is touched
//! - Refused while a scan is in flight
//!
//! ```no_run
//! use dupsearch::actions::delete::{delete_file, DeleteConfig};
//! use std::path::Path;
//!
//! let result = delete_file(Path::new("/path/to/duplicate.txt"), &DeleteConfig::trash());
//! ```

pub mod delete;

pub use delete::{
    delete_batch, delete_file, delete_selected, select_duplicates, select_for_deletion,
    BatchDeleteResult, DeleteConfig, DeleteConfirmation, DeleteError, DeleteResult,
    StdinConfirmation,
};
