//! Pipeline stages for law-to-EPUB conversion.
//!
//! Each submodule implements exactly one transformation step, so the
//! orchestrator in [`crate::convert`] only sequences them and owns the
//! status bookkeeping.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ extract ──▶ transform
//! (e-Gov)    (base64)    (EPUB builder)
//! ```
//!
//! 1. [`source`]: fetch `law_data` for an ID; the only stage talking to
//!    the law API
//! 2. [`extract`]: pull `law_full_text`, base64-decode it, drop the
//!    `<TmpRootTag>` wrapper
//! 3. [`transform`]: hand the XML (and revision context, if any) to the
//!    EPUB builder

pub mod extract;
pub mod source;
pub mod transform;
