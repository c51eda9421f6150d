//! File actions module.
//!
//! This module provides functionality for:
//! - Replacing a duplicate with a symbolic link to its canonical copy
//! - Atomic rename-over or delete-then-link strategies
//! - Re-verifying a canonical's content before linking (paranoid mode)
//!
//! ```no_run
//! use dupelink::actions::{replace_with_symlink, LinkStrategy};
//! use std::path::Path;
//!
//! let result = replace_with_symlink(
//!     Path::new("/data/copy.txt"),
//!     Path::new("/data/original.txt"),
//!     LinkStrategy::default(),
//! );
//! ```

pub mod link;

pub use link::{
    check_link_preconditions, replace_with_symlink, verify_canonical, LinkError, LinkStrategy,
};
