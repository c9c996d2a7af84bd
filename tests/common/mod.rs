//! Shared test utilities

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use biopsy::corpus::CorpusPaths;
use biopsy::index::{IndexBuilder, IndexPaths};
use biopsy::provider::{ChatMessage, ChatProvider, EmbeddingProvider};
use tempfile::TempDir;

/// Dimension of the hashing embedder
pub const TEST_DIMENSION: usize = 256;

/// Client utterances in the fixture corpus, in build order
pub const CLIENT_UTTERANCES: &[&str] = &[
    "aku merasa sangat cemas soal pekerjaan",
    "atasan selalu mengkritik hasil kerjaku",
    "aku susah tidur setiap malam",
    "aku bertengkar dengan pasangan kemarin",
    "dia tidak mendengarkan aku sama sekali",
];

/// Pairs produced from the HOPE part of the fixture
pub const HOPE_PAIRS: usize = 3;

/// Pairs produced from the HQC part of the fixture
pub const HQC_PAIRS: usize = 2;

/// Deterministic bag-of-words embedder
///
/// Each lowercase word is hashed into one of [`TEST_DIMENSION`] buckets, so
/// identical texts always produce identical vectors.
#[derive(Debug)]
pub struct HashingEmbedder {
    model: String,
    calls: AtomicUsize,
    texts: AtomicUsize,
}

impl HashingEmbedder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_model("hashing-test")
    }

    #[must_use]
    pub fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
        }
    }

    /// Number of `embed` requests served
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of texts embedded across all requests
    pub fn texts(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }
}

fn bucket(word: &str) -> usize {
    // FNV-1a
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in word.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % TEST_DIMENSION as u64) as usize
}

pub fn hash_embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; TEST_DIMENSION];
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        vector[bucket(word)] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[&str]) -> biopsy::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| hash_embed(t)).collect())
    }
}

/// Embedder that succeeds for its first `ok_calls` requests, then fails
#[derive(Debug)]
pub struct FailingEmbedder {
    ok_calls: usize,
    calls: AtomicUsize,
}

impl FailingEmbedder {
    #[must_use]
    pub fn after(ok_calls: usize) -> Self {
        Self {
            ok_calls,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model(&self) -> &str {
        "hashing-test"
    }

    async fn embed(&self, texts: &[&str]) -> biopsy::Result<Vec<Vec<f32>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_calls {
            return Err(biopsy::Error::Embedding("service unavailable".to_string()));
        }
        Ok(texts.iter().map(|t| hash_embed(t)).collect())
    }
}

/// Chat provider returning a fixed reply and recording every prompt
#[derive(Debug)]
pub struct ScriptedChat {
    reply: String,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    #[must_use]
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedChat {
    async fn complete(&self, messages: &[ChatMessage]) -> biopsy::Result<String> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(messages.to_vec());
        Ok(self.reply.clone())
    }
}

/// A corpus and index location inside a temporary directory
pub struct Fixture {
    pub dir: TempDir,
    pub corpus: CorpusPaths,
    pub index_dir: PathBuf,
}

impl Fixture {
    #[must_use]
    pub fn index_paths(&self) -> IndexPaths {
        IndexPaths::new(&self.index_dir)
    }

    #[must_use]
    pub fn builder(&self, embedder: Arc<dyn EmbeddingProvider>) -> IndexBuilder {
        IndexBuilder::new(self.index_paths(), self.corpus.clone(), embedder)
    }

    pub fn hope_dir(&self) -> &Path {
        &self.corpus.hope_dir
    }

    pub fn hqc_dir(&self) -> &Path {
        self.corpus.hqc_dir.as_deref().expect("fixture has HQC dir")
    }
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture dir");
    }
    std::fs::write(path, content).expect("write fixture file");
}

/// Replace the HOPE corpus with one session of `pairs` distinct exchanges
pub fn write_large_hope(fixture: &Fixture, pairs: usize) {
    for name in ["1.csv", "2.csv"] {
        std::fs::remove_file(fixture.hope_dir().join(name)).expect("remove fixture file");
    }

    let mut csv = String::from("ID,Type,Utterance\n");
    for i in 0..pairs {
        csv.push_str(&format!("7_{},P,keluhan nomor {i}\n", 2 * i));
        csv.push_str(&format!("7_{},T,tanggapan nomor {i}\n", 2 * i + 1));
    }
    write_file(&fixture.hope_dir().join("big.csv"), &csv);
}

/// Write the standard two-dataset fixture corpus
#[must_use]
pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("create temp dir");
    let hope = dir.path().join("Dataset").join("HOPE");
    let hqc = dir.path().join("Dataset").join("High Quality Counseling");

    write_file(
        &hope.join("1.csv"),
        "ID,Type,Utterance\n\
         1_0,T,\"Halo, apa kabar hari ini?\"\n\
         1_1,P,aku merasa sangat cemas soal pekerjaan\n\
         1_2,T,Apa yang membuatmu paling cemas?\n\
         1_3,P,atasan selalu mengkritik hasil kerjaku\n\
         1_4,T,Bagaimana perasaanmu saat dikritik?\n",
    );
    write_file(
        &hope.join("2.csv"),
        "ID,Type,Utterance\n\
         2_0,P,aku susah tidur setiap malam\n\
         2_1,T,Sudah berapa lama kamu susah tidur?\n",
    );
    write_file(
        &hqc.join("session_a.txt"),
        "C: aku bertengkar dengan pasangan kemarin\n\
         T: Apa yang terjadi saat pertengkaran itu?\n\
         C: dia tidak mendengarkan aku sama sekali\n\
         T: Kamu merasa tidak didengar.\n",
    );

    Fixture {
        corpus: CorpusPaths {
            hope_dir: hope,
            hqc_dir: Some(hqc),
        },
        index_dir: dir.path().join("indexes"),
        dir,
    }
}
