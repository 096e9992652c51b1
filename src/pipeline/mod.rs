//! Pipeline stages for PDF-to-rows extraction.
//!
//! Each submodule implements one transformation step so it can be tested
//! on its own. The driver in [`crate::extract`] strings them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ document ──▶ acquire ──▶ chunk ──▶ llm ──▶ parse ──▶ normalize
//! (URL/path) (pdfium)   (tables/     (bounded  (model  (JSON     (annotate,
//!                        text/OCR)    pieces)   call)   rows)     dedup)
//! ```
//!
//! 1. [`input`]    — canonicalise the user-supplied path or URL to a local file
//! 2. [`document`] — open the PDF once; page text, tables and rendering
//!    ([`tables`] rebuilds tables from positioned characters)
//! 3. [`acquire`]  — best text per page: tables, then native text, then
//!    [`ocr`] when the text layer is too thin
//! 4. [`chunk`]    — split page text into model-sized chunks
//! 5. [`llm`]      — one model call per chunk; the only stage with network I/O
//! 6. [`parse`]    — recover row objects from the free-form reply
//! 7. [`normalize`] — fill document defaults, flatten lists, drop duplicates

pub mod acquire;
pub mod chunk;
pub mod document;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod ocr;
pub mod parse;
pub mod tables;
