//! Pipeline orchestrator for Spor.
//!
//! Wires settings, prompts and the external services into the document,
//! site, meeting and quiz pipelines, and owns the on-disk cache layout:
//!
//! ```text
//! <cache>/files/<name>               uploaded documents
//! <cache>/embeddings/<name>/         document vectors
//! <cache>/site_embeddings/<host>/    site vectors
//! <cache>/<video>                    meeting recordings
//! <cache>/chunks/<stem>/             audio segments
//! <cache>/<stem>.txt                 transcripts
//! <cache>/summaries/                 refine checkpoints
//! ```

use crate::cache::FileByteCache;
use crate::chunking::{Chunk, SplitUnit, TextSplitter};
use crate::config::{Prompts, Settings, SplitterSettings};
use crate::embedding::{CachedEmbedder, Embedder, OpenAIEmbedder};
use crate::error::{Result, SporError};
use crate::extract::{DocumentExtractor, FileType, TextExtractor};
use crate::llm::{ChatModel, OpenAIChatModel};
use crate::media;
use crate::quiz::{Quiz, QuizGenerator};
use crate::rag::{ConversationState, GroundedAnswerer, RefineSummarizer, RunningSummary, ScoredAnswer, ScoredMapReduceAnswerer};
use crate::retrieval::{Retriever, RetrieverHandle};
use crate::site::{self, Page, SiteLoader};
use crate::transcription::{transcribe_chunks, Transcriber, WhisperTranscriber};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

/// An indexed corpus ready for questions.
pub struct DocumentIndex {
    name: String,
    retriever: Retriever,
    handle: RetrieverHandle,
}

impl DocumentIndex {
    /// File name or host the index was built from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }

    /// The `top_k` chunks closest to `query`.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Chunk>> {
        self.retriever.retrieve(&self.handle, query, top_k).await
    }
}

/// Transcript of a processed meeting recording.
#[derive(Debug, Clone)]
pub struct MeetingTranscript {
    pub path: PathBuf,
    pub text: String,
}

/// The main orchestrator for the Spor pipelines.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    llm: Arc<dyn ChatModel>,
    embedder: Arc<dyn Embedder>,
    transcriber: Arc<dyn Transcriber>,
    extractor: Arc<dyn TextExtractor>,
    cache_dir: PathBuf,
}

impl Orchestrator {
    /// Create an orchestrator backed by the OpenAI services.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let timeout = settings.llm.timeout();
        let llm = Arc::new(OpenAIChatModel::new(
            &settings.llm.model,
            settings.llm.temperature,
            timeout,
        )?);
        let embedder = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
            timeout,
        )?);
        let transcriber = Arc::new(WhisperTranscriber::with_config(
            &settings.media.transcription_model,
            timeout,
        )?);

        Self::with_components(settings, prompts, llm, embedder, transcriber)
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        llm: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Result<Self> {
        settings.validate()?;
        let cache_dir = settings.cache_dir();
        std::fs::create_dir_all(&cache_dir)?;

        Ok(Self {
            settings,
            prompts,
            llm,
            embedder,
            transcriber,
            extractor: Arc::new(DocumentExtractor),
            cache_dir,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Copy `path` into the cache, extract its text and index it.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn embed_file(&self, path: &Path) -> Result<DocumentIndex> {
        let (name, chunks) = self.load_document(path).await?;
        self.index_chunks(&name, chunks, self.cache_dir.join("embeddings").join(&name))
            .await
    }

    /// Answer `question` about an indexed document, updating `state`.
    pub async fn ask_document(
        &self,
        index: &DocumentIndex,
        question: &str,
        state: &mut ConversationState,
    ) -> Result<String> {
        let context = index.retrieve(question, self.settings.retrieval.top_k).await?;
        self.grounded().answer(&context, question, state).await
    }

    /// Like [`Orchestrator::ask_document`], streaming tokens to `on_token`.
    pub async fn ask_document_streaming(
        &self,
        index: &DocumentIndex,
        question: &str,
        state: &mut ConversationState,
        on_token: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String> {
        let context = index.retrieve(question, self.settings.retrieval.top_k).await?;
        self.grounded()
            .answer_streaming(&context, question, state, on_token)
            .await
    }

    /// Load every page of a sitemap and index it.
    #[instrument(skip(self))]
    pub async fn load_site(&self, sitemap_url: &str) -> Result<DocumentIndex> {
        let url = site::validate_sitemap_url(sitemap_url)?;
        let pages = SiteLoader::new(&self.settings.site)?.load(&url).await?;
        self.index_pages(&site::cache_name(&url), &pages).await
    }

    /// Index already loaded pages under the cache entry for `host`.
    pub async fn index_pages(&self, host: &str, pages: &[Page]) -> Result<DocumentIndex> {
        let splitter = splitter(&self.settings.chunking.site);
        let mut chunks = Vec::new();
        for page in pages {
            chunks.extend(splitter.split(&page.text, &page.url)?);
        }
        info!("Split {} pages into {} chunks", pages.len(), chunks.len());
        self.index_chunks(host, chunks, self.cache_dir.join("site_embeddings").join(host))
            .await
    }

    /// Scored map-reduce answer over the chunks of a site closest to `question`.
    pub async fn ask_site(&self, index: &DocumentIndex, question: &str) -> Result<ScoredAnswer> {
        let context = index.retrieve(question, self.settings.retrieval.top_k).await?;
        ScoredMapReduceAnswerer::new(self.llm.clone())
            .with_prompts(self.prompts.clone())
            .with_concurrency(self.settings.site.map_concurrency)
            .answer_scored(question, &context)
            .await
    }

    /// Transcribe a meeting recording, reusing earlier work in the cache.
    #[instrument(skip(self, on_segment), fields(video = %video.display()))]
    pub async fn process_meeting(
        &self,
        video: &Path,
        on_segment: &mut (dyn FnMut(usize, usize) + Send),
    ) -> Result<MeetingTranscript> {
        let name = file_name(video)?;
        let stem = Path::new(&name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("meeting")
            .to_string();
        let transcript_path = self.cache_dir.join(format!("{}.txt", stem));

        if transcript_path.exists() {
            info!("Using existing transcript {}", transcript_path.display());
            let text = tokio::fs::read_to_string(&transcript_path).await?;
            return Ok(MeetingTranscript {
                path: transcript_path,
                text,
            });
        }

        let cached_video = self.cache_dir.join(&name);
        if cached_video != video {
            tokio::fs::copy(video, &cached_video).await?;
        }

        let audio = media::extract_audio(&cached_video).await?;
        let chunk_dir = self.cache_dir.join("chunks").join(&stem);
        media::split_audio(&audio, self.settings.media.chunk_minutes, &chunk_dir).await?;

        let text = transcribe_chunks(
            self.transcriber.as_ref(),
            &chunk_dir,
            &transcript_path,
            on_segment,
        )
        .await?;

        Ok(MeetingTranscript {
            path: transcript_path,
            text,
        })
    }

    /// Refine summary of a transcript, checkpointed under the cache.
    #[instrument(skip(self, transcript, on_step))]
    pub async fn summarize_transcript(
        &self,
        transcript: &MeetingTranscript,
        on_step: &mut (dyn FnMut(usize, usize) + Send),
    ) -> Result<RunningSummary> {
        let source = transcript.path.display().to_string();
        let chunks = splitter(&self.settings.chunking.transcript).split(&transcript.text, &source)?;
        let checkpoints = Arc::new(FileByteCache::new(self.cache_dir.join("summaries"))?);

        RefineSummarizer::new(self.llm.clone())
            .with_prompts(self.prompts.clone())
            .with_checkpoints(checkpoints)
            .summarize_with_progress(&chunks, on_step)
            .await
    }

    /// Generate a multiple-choice quiz over a document.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn make_quiz(&self, path: &Path) -> Result<Quiz> {
        let (_, chunks) = self.load_document(path).await?;
        QuizGenerator::new(self.llm.clone())
            .with_prompts(self.prompts.clone())
            .generate(&chunks)
            .await
    }

    fn grounded(&self) -> GroundedAnswerer {
        GroundedAnswerer::with_prompts(self.llm.clone(), self.prompts.clone())
            .with_memory(SplitUnit::Word.tokenizer(), self.settings.memory.max_token_limit)
    }

    /// Store `path` under `<cache>/files`, then extract and split it.
    async fn load_document(&self, path: &Path) -> Result<(String, Vec<Chunk>)> {
        let name = file_name(path)?;
        let file_type = FileType::from_path(path)?;
        let bytes = tokio::fs::read(path).await?;

        let files = self.cache_dir.join("files");
        tokio::fs::create_dir_all(&files).await?;
        let stored = files.join(&name);
        if stored != path {
            tokio::fs::write(&stored, &bytes).await?;
        }

        let text = self.extractor.extract(&bytes, file_type)?;
        let chunks = splitter(&self.settings.chunking.document).split(&text, &name)?;
        info!("Loaded {} ({}) into {} chunks", name, file_type, chunks.len());
        Ok((name, chunks))
    }

    async fn index_chunks(&self, name: &str, chunks: Vec<Chunk>, cache_root: PathBuf) -> Result<DocumentIndex> {
        let cache = Arc::new(FileByteCache::new(cache_root)?);
        let embedder = Arc::new(CachedEmbedder::new(self.embedder.clone(), cache));
        let retriever = Retriever::new(embedder).with_metric(self.settings.retrieval.distance);
        let handle = retriever.build(chunks).await?;

        Ok(DocumentIndex {
            name: name.to_string(),
            retriever,
            handle,
        })
    }
}

fn splitter(profile: &SplitterSettings) -> TextSplitter {
    TextSplitter::new(profile.to_config(), profile.unit.tokenizer())
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| SporError::InvalidInput(format!("Not a file: {}", path.display())))
}
