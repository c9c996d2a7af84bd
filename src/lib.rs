//! `BioPsy` - voice counseling assistant with retrieval-augmented replies
//!
//! This library provides the core functionality for `BioPsy`:
//! - Corpus ingestion of HOPE and High Quality Counseling transcripts
//! - A persisted vector index of client/therapist exchanges
//! - Retrieval of similar exchanges as style examples
//! - Turn gating (stop intent, filler, crisis safety) and prompt assembly
//! - A keyword mood meter for each user message
//! - Voice capture, transcription and speech via `OpenAI`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │   Voice loop  │  Text chat  │  build-index / search  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Session                           │
//! │   Turn gate  │  Retriever  │  Prompt  │  Chat        │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │       Index (corpus → embeddings → flat index)       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod corpus;
pub mod error;
pub mod gate;
pub mod index;
pub mod mood;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod retriever;
pub mod session;
pub mod voice;

pub use config::Config;
pub use corpus::{CorpusPaths, Dataset, Pair};
pub use error::{Error, Result};
pub use gate::{TurnAction, TurnGate, TurnKind};
pub use index::{IndexBuilder, IndexPaths};
pub use mood::{Mood, MoodZone};
pub use provider::{ChatMessage, ChatProvider, EmbeddingProvider};
pub use retriever::{RetrievalResult, Retriever};
pub use session::{Session, TurnOutcome};
