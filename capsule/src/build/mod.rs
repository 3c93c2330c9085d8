//! Image builder.
//!
//! Turns a build context (recipe, application files, dependency manifest)
//! into one immutable image, or fails without touching the image store.
//!
//! ```text
//! 1. Base ─→ 2. Workdir ─→ 3. Context ─→ 4. Dependencies ─→ 5. Entrypoint ─→ commit
//! ```

pub mod context;
mod pipeline;
pub mod recipe;
mod stages;
mod types;

pub use context::BuildContext;
pub use pipeline::ImageBuilder;
pub use recipe::BuildRecipe;
pub use types::BuildOutcome;
