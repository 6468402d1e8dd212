//! # Prompt Template Modules
//!
//! Persona templates and the assembler that turns them, together with
//! retrieved context and conversation history, into a completion request.

pub mod assembler;
pub mod persona;

pub use assembler::{assemble, render_history, AssembledPrompt};
pub use persona::{HistoryMode, PersonaConfig};
