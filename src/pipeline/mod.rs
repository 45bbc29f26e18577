//! Building blocks of the two pipeline stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ ocr ──▶ clean ──▶ output.json ──▶ llm ──▶ normalized_output.json
//! (folder)  (tesseract) (rules)                (LLM)
//! ```
//!
//! 1. [`input`] — list `.png` / `.jpg` / `.jpeg` files in filename order
//! 2. [`ocr`]   — decode each image and run tesseract; blocking, so it runs
//!    in `spawn_blocking`
//! 3. [`clean`] — ordered rule table that rejects or rewrites each OCR line,
//!    then per-file deduplication
//! 4. [`llm`]   — optional LLM pass per file with fallback to the local lines;
//!    the only stage with network I/O

pub mod clean;
pub mod input;
pub mod llm;
pub mod ocr;
