//! Rhyme highlighting Language Server Protocol implementation.
//!
//! Keeps one debounced analysis session per open document and pushes
//! highlight spans plus status counters to the client as they settle.

mod session;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use dashmap::DashMap;
use rhyme_core::{phonetic_ending, DocumentStats, RhymeConfig, RhymeDetector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};

use crate::session::{Outbound, Published, SessionEvent, SessionHandle};

const DEFAULT_CONFIG_FILE: &str = "rhyme-style.yml";

/// `rhyme/highlights` server-to-client notification.
enum RhymeHighlights {}

impl Notification for RhymeHighlights {
    type Params = RhymeHighlightsParams;
    const METHOD: &'static str = "rhyme/highlights";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RhymeHighlightsParams {
    uri: Url,
    version: Option<i32>,
    /// Apply in order; later entries win where ranges overlap.
    highlights: Vec<RhymeHighlight>,
    stats: DocumentStats,
}

/// `rhyme/stats` server-to-client notification, sent after every edit.
enum RhymeStats {}

impl Notification for RhymeStats {
    type Params = RhymeStatsParams;
    const METHOD: &'static str = "rhyme/stats";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RhymeStatsParams {
    uri: Url,
    version: i32,
    stats: DocumentStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RhymeHighlight {
    range: Range,
    palette_index: usize,
    color: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WordsRhymeParams {
    first: String,
    second: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct WordsRhymeResult {
    rhymes: bool,
    first_key: Option<String>,
    second_key: Option<String>,
}

/// Document state cached by the server.
struct DocumentState {
    session: SessionHandle,
    version: i32,
}

/// Rhyme Language Server backend.
struct Backend {
    client: Client,
    detector: RwLock<Arc<RhymeDetector>>,
    documents: DashMap<Url, DocumentState>,
    workspace_root: RwLock<Option<PathBuf>>,
    config_path: RwLock<Option<PathBuf>>,
    highlighting: RwLock<Option<bool>>,
}

impl Backend {
    fn new(client: Client) -> Self {
        Self {
            client,
            detector: RwLock::new(Arc::new(RhymeDetector::default())),
            documents: DashMap::new(),
            workspace_root: RwLock::new(None),
            config_path: RwLock::new(None),
            highlighting: RwLock::new(None),
        }
    }

    fn load_config(path: &Path) -> anyhow::Result<RhymeConfig> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let cfg: RhymeConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid config structure in {}", path.display()))?;
        Ok(cfg)
    }

    async fn reload_detector(&self) -> anyhow::Result<()> {
        let configured = self.config_path.read().await.clone();
        let resolved = match configured {
            Some(path) => path,
            None => match self.workspace_root.read().await.clone() {
                Some(root) => root.join(DEFAULT_CONFIG_FILE),
                None => return Ok(()),
            },
        };

        let cfg = if resolved.exists() {
            Self::load_config(&resolved)?
        } else {
            RhymeConfig::default()
        };

        let detector = Arc::new(RhymeDetector::new(cfg).context("failed to create rhyme detector")?);
        *self.detector.write().await = Arc::clone(&detector);
        *self.config_path.write().await = Some(resolved.clone());

        let highlighting = *self.highlighting.read().await;
        for doc in self.documents.iter() {
            doc.session.send(SessionEvent::Reconfigure {
                detector: Arc::clone(&detector),
                highlighting,
            });
        }

        self.client
            .log_message(
                MessageType::INFO,
                format!("Rhyme config loaded: {}", resolved.display()),
            )
            .await;

        Ok(())
    }

    /// Push the client's highlighting toggle, if it set one, to every open document.
    async fn apply_highlighting_setting(&self) {
        let Some(enabled) = *self.highlighting.read().await else {
            return;
        };
        for doc in self.documents.iter() {
            doc.session.send(SessionEvent::SetHighlighting(enabled));
        }
    }

    async fn reload_and_report(&self) {
        if let Err(err) = self.reload_detector().await {
            log::error!("config reload failed: {err:#}");
            self.client
                .log_message(
                    MessageType::ERROR,
                    format!("Failed to reload config: {err:#}"),
                )
                .await;
        }
    }

    async fn apply_settings(&self, map: &serde_json::Map<String, Value>) {
        if let Some(Value::String(config_path)) = map.get("configPath") {
            if config_path.trim().is_empty() {
                *self.config_path.write().await = None;
            } else {
                let configured = PathBuf::from(config_path);
                if configured.is_absolute() {
                    *self.config_path.write().await = Some(configured);
                } else if let Some(root) = self.workspace_root.read().await.clone() {
                    *self.config_path.write().await = Some(root.join(configured));
                }
            }
        }
        if let Some(Value::Bool(enabled)) = map.get("highlightingEnabled") {
            *self.highlighting.write().await = Some(*enabled);
        }
    }

    async fn open_document(&self, uri: Url, text: String, version: i32) {
        let detector = self.detector.read().await.clone();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (session, _task) = SessionHandle::spawn(detector, text, version, out_tx);
        if let Some(enabled) = *self.highlighting.read().await {
            session.send(SessionEvent::SetHighlighting(enabled));
        }
        tokio::spawn(forward_highlights(self.client.clone(), uri.clone(), out_rx));
        self.documents.insert(uri, DocumentState { session, version });
    }

    async fn words_rhyme(&self, params: WordsRhymeParams) -> Result<WordsRhymeResult> {
        let detector = self.detector.read().await.clone();
        Ok(WordsRhymeResult {
            rhymes: detector.words_rhyme(&params.first, &params.second),
            first_key: phonetic_ending(&params.first),
            second_key: phonetic_ending(&params.second),
        })
    }
}

fn byte_to_position(text: &str, byte_offset: usize) -> Position {
    let byte_offset = byte_offset.min(text.len());
    let mut line: u32 = 0;
    let mut last_newline = 0usize;
    for (idx, ch) in text.char_indices() {
        if idx >= byte_offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            last_newline = idx + 1;
        }
    }
    let character = text[last_newline..byte_offset].encode_utf16().count() as u32;
    Position { line, character }
}

fn to_params(uri: Url, published: &Published) -> RhymeHighlightsParams {
    let text = &published.text;
    let highlights = published
        .update
        .spans
        .iter()
        .map(|span| RhymeHighlight {
            range: Range {
                start: byte_to_position(text, span.start),
                end: byte_to_position(text, span.end()),
            },
            palette_index: span.palette_index,
            color: published.detector.color(span.palette_index).to_string(),
        })
        .collect();
    RhymeHighlightsParams {
        uri,
        version: Some(published.version),
        highlights,
        stats: published.update.stats,
    }
}

fn cleared_params(uri: Url) -> RhymeHighlightsParams {
    RhymeHighlightsParams {
        uri,
        version: None,
        highlights: Vec::new(),
        stats: DocumentStats::default(),
    }
}

/// Relay a document's session output to the client until its session stops,
/// then clear the document's highlights.
async fn forward_highlights(client: Client, uri: Url, mut rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Highlights(published) => {
                let params = to_params(uri.clone(), &published);
                log::debug!(
                    "publishing {} highlights for {uri} v{}",
                    params.highlights.len(),
                    published.version
                );
                client.send_notification::<RhymeHighlights>(params).await;
            }
            Outbound::Stats { version, stats } => {
                client
                    .send_notification::<RhymeStats>(RhymeStatsParams {
                        uri: uri.clone(),
                        version,
                        stats,
                    })
                    .await;
            }
        }
    }
    client
        .send_notification::<RhymeHighlights>(cleared_params(uri))
        .await;
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if let Some(root_uri) = params.root_uri.or_else(|| {
            params
                .workspace_folders
                .as_ref()
                .and_then(|folders| folders.first().map(|f| f.uri.clone()))
        }) {
            if let Ok(path) = root_uri.to_file_path() {
                *self.workspace_root.write().await = Some(path);
            }
        }

        if let Some(Value::Object(map)) = params.initialization_options {
            self.apply_settings(&map).await;
        }

        self.reload_and_report().await;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "Rhyme Language Server".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "Rhyme LSP initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        self.documents.clear();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        self.open_document(doc.uri, doc.text, doc.version).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // With FULL sync, we get the complete new content
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };

        let delivered = match self.documents.get_mut(&uri) {
            Some(mut doc) => {
                doc.version = version;
                doc.session.send(SessionEvent::Edit {
                    text: change.text.clone(),
                    version,
                })
            }
            None => false,
        };
        if !delivered {
            self.open_document(uri, change.text, version).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let saved_path = params.text_document.uri.to_file_path().ok();
        let config_path = self.config_path.read().await.clone();
        let is_config = saved_path
            .as_ref()
            .zip(config_path.as_ref())
            .is_some_and(|(a, b)| a == b);

        if is_config {
            self.reload_and_report().await;
        }
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        if let Value::Object(map) = params.settings {
            self.apply_settings(&map).await;
        }
        self.apply_highlighting_setting().await;
        self.reload_and_report().await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let config_path = self.config_path.read().await.clone();
        let should_reload = params.changes.iter().any(|change| match &config_path {
            Some(config_path) => change
                .uri
                .to_file_path()
                .is_ok_and(|path| &path == config_path),
            None => change.uri.path().ends_with(DEFAULT_CONFIG_FILE),
        });

        if should_reload {
            self.reload_and_report().await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        // Dropping the handle stops the session task; its forwarder then
        // drains what was queued and clears the document.
        match self.documents.remove(&uri) {
            Some((_, doc)) => log::debug!("closed {uri} at v{}", doc.version),
            None => {
                self.client
                    .send_notification::<RhymeHighlights>(cleared_params(uri))
                    .await
            }
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::build(Backend::new)
        .custom_method("rhyme/wordsRhyme", Backend::words_rhyme)
        .finish();
    Server::new(stdin, stdout, socket).serve(service).await;
}

#[cfg(test)]
mod tests {
    use rhyme_core::{HighlightSpan, HighlightUpdate};

    use super::*;

    #[test]
    fn positions_use_utf16_columns() {
        let text = "héllo\nwörld cat";
        assert_eq!(byte_to_position(text, 0), Position::new(0, 0));
        assert_eq!(byte_to_position(text, 7), Position::new(1, 0));
        // "wörld " is 7 bytes but 6 UTF-16 units.
        assert_eq!(byte_to_position(text, 14), Position::new(1, 6));
        assert_eq!(byte_to_position(text, 999), Position::new(1, 9));
    }

    #[test]
    fn published_spans_become_colored_ranges() {
        let detector = Arc::new(RhymeDetector::default());
        let published = Published {
            version: 3,
            text: Arc::from("cat\nhat"),
            detector: Arc::clone(&detector),
            update: HighlightUpdate {
                spans: vec![
                    HighlightSpan {
                        start: 0,
                        len: 3,
                        palette_index: 0,
                    },
                    HighlightSpan {
                        start: 4,
                        len: 3,
                        palette_index: 9,
                    },
                ],
                stats: DocumentStats {
                    words: 2,
                    chars: 7,
                    rhymes: 2,
                },
            },
        };
        let uri = Url::parse("file:///tmp/poem.txt").unwrap();
        let params = to_params(uri, &published);
        assert_eq!(params.version, Some(3));
        assert_eq!(params.highlights[1].range.start, Position::new(1, 0));
        assert_eq!(params.highlights[1].range.end, Position::new(1, 3));
        assert_eq!(params.highlights[1].color, detector.color(1));

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["highlights"][0]["paletteIndex"], 0);
        assert_eq!(json["stats"]["rhymes"], 2);
    }

    #[test]
    fn palette_comes_from_the_publishing_detector() {
        let reloaded = Arc::new(
            RhymeDetector::new(RhymeConfig {
                palette: vec!["#000000".into(), "#ffffff".into()],
                ..RhymeConfig::default()
            })
            .unwrap(),
        );
        let published = Published {
            version: 1,
            text: Arc::from("cat hat"),
            detector: reloaded,
            update: HighlightUpdate {
                spans: vec![HighlightSpan {
                    start: 4,
                    len: 3,
                    palette_index: 1,
                }],
                stats: DocumentStats::default(),
            },
        };
        let params = to_params(Url::parse("file:///tmp/a.txt").unwrap(), &published);
        assert_eq!(params.highlights[0].color, "#ffffff");
    }

    #[test]
    fn close_and_stats_notifications_shape() {
        let uri = Url::parse("file:///tmp/poem.txt").unwrap();
        let cleared = serde_json::to_value(cleared_params(uri.clone())).unwrap();
        assert_eq!(cleared["version"], Value::Null);
        assert_eq!(cleared["highlights"], serde_json::json!([]));

        let stats = serde_json::to_value(RhymeStatsParams {
            uri,
            version: 4,
            stats: DocumentStats {
                words: 3,
                chars: 11,
                rhymes: 0,
            },
        })
        .unwrap();
        assert_eq!(stats["version"], 4);
        assert_eq!(stats["stats"]["chars"], 11);
        assert_eq!(RhymeStats::METHOD, "rhyme/stats");
    }
}
