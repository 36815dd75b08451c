//! Pipeline stages for image-to-LaTeX conversion.
//!
//! Each submodule implements exactly one step, so each can be tested alone
//! and the two external collaborators can be swapped behind their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ staging ──▶ inference ──▶ (cleanup on drop)
//! (validate) (disk/URL)  (VLM call)
//! ```
//!
//! 1. [`input`]    : the uploaded image and its presence/type checks; no I/O
//! 2. [`staging`]  : persist the bytes somewhere the provider can read them;
//!    the returned [`staging::StagedImage`] deletes its local artifact on drop
//! 3. [`encode`]   : turn a staged reference into `ImageData` (URL or base64)
//! 4. [`inference`]: one chat-completion call that returns the markup
//!
//! Orchestration (ordering, deadline, error classification) lives in
//! [`crate::convert`].

pub mod encode;
pub mod inference;
pub mod input;
pub mod staging;
