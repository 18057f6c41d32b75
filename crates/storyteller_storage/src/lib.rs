//! On-disk representation of generated stories.
//!
//! Every run gets its own folder under the output directory:
//!
//! ```text
//! output/
//! └── The_Brave_Turtle_20250101_120000/
//!     ├── The_Brave_Turtle.md
//!     ├── image_01.png
//!     ├── image_02.png
//!     └── performance/
//!         ├── operation_history.json
//!         ├── operation_stats.json
//!         └── resource_usage.json
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use storyteller_storage::DocumentAssembler;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let assembler = DocumentAssembler::new("output");
//! let folder = assembler.create_story_folder("# The Brave Turtle").await?;
//! let path = assembler
//!     .save_story_markdown("# The Brave Turtle\n\nOnce upon a time...", &folder)
//!     .await?;
//! assert!(path.ends_with("The_Brave_Turtle.md"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod assembler;
mod listing;
mod sanitize;

pub use assembler::{DocumentAssembler, insert_image_references};
pub use listing::{StorySummary, list_stories};
pub use sanitize::{FALLBACK_FOLDER_TITLE, MAX_TITLE_CHARS, sanitize_title};
pub use storyteller_error::{StorageError, StorageErrorKind};
