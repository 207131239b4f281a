//! Turns an archive, a directory tree or JSON files into the ordered document
//! list the index is built from.

use anyhow::{anyhow, bail, Context, Result};
use docsift_core::{Document, IndexConfig};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

pub const CONTENT_FIELD: &str = "content";
pub const FILENAME_FIELD: &str = "filename";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DocumentSource {
    /// Zip archive. `root_prefix` is stripped from entry names; when absent a
    /// single top-level directory shared by all entries is stripped.
    Archive { path: PathBuf, root_prefix: Option<String> },
    Directory { path: PathBuf },
    /// `.json` (object or array of objects) or `.jsonl` (one object per line).
    Json { path: PathBuf },
}

impl DocumentSource {
    /// Pick a source kind from what `path` looks like on disk.
    pub fn detect(path: impl Into<PathBuf>, root_prefix: Option<String>) -> Result<Self> {
        let path = path.into();
        if path.is_dir() {
            return Ok(Self::Directory { path });
        }
        match path.extension().and_then(|s| s.to_str()) {
            Some("zip") => Ok(Self::Archive { path, root_prefix }),
            Some("json" | "jsonl") => Ok(Self::Json { path }),
            _ => bail!("cannot tell what kind of document source {} is", path.display()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// File name suffixes to keep from archives and directories.
    pub extensions: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { extensions: vec![".md".to_string(), ".mdx".to_string()] }
    }
}

impl LoadOptions {
    fn wants(&self, name: &str) -> bool {
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

pub fn load_documents(source: &DocumentSource, opts: &LoadOptions) -> Result<Vec<Document>> {
    let docs = match source {
        DocumentSource::Archive { path, root_prefix } => load_archive(path, root_prefix.as_deref(), opts)?,
        DocumentSource::Directory { path } => load_directory(path, opts)?,
        DocumentSource::Json { path } => load_json(path)?,
    };
    tracing::info!(num_docs = docs.len(), ?source, "loaded documents");
    Ok(docs)
}

fn text_document(filename: String, content: String) -> Document {
    Document::new().with(CONTENT_FIELD, content).with(FILENAME_FIELD, filename)
}

/// Single top-level directory shared by every entry, e.g. `repo-main/`.
fn common_root<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut root: Option<&str> = None;
    for name in names {
        let (first, _) = name.split_once('/')?;
        match root {
            None => root = Some(first),
            Some(r) if r == first => {}
            Some(_) => return None,
        }
    }
    root.map(|r| format!("{r}/"))
}

pub fn load_archive(path: &Path, root_prefix: Option<&str>, opts: &LoadOptions) -> Result<Vec<Document>> {
    let file = File::open(path).with_context(|| format!("opening archive {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file).with_context(|| format!("reading archive {}", path.display()))?;

    let prefix = match root_prefix {
        Some(p) => Some(p.to_string()),
        None => common_root(archive.file_names()),
    };

    let mut docs = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() || !opts.wants(entry.name()) {
            continue;
        }
        let name = entry.name().to_string();
        let filename = match &prefix {
            Some(p) => name.strip_prefix(p.as_str()).unwrap_or(&name).to_string(),
            None => name.clone(),
        };
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        match String::from_utf8(buf) {
            Ok(content) => docs.push(text_document(filename, content)),
            Err(_) => tracing::warn!(entry = %name, "skipping non UTF-8 archive entry"),
        }
    }
    Ok(docs)
}

pub fn load_directory(root: &Path, opts: &LoadOptions) -> Result<Vec<Document>> {
    let mut docs = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        let p = entry.path();
        if !p.is_file() {
            continue;
        }
        let rel = p.strip_prefix(root).unwrap_or(p);
        let filename = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
        if !opts.wants(&filename) {
            continue;
        }
        match fs::read_to_string(p) {
            Ok(content) => docs.push(text_document(filename, content)),
            Err(e) => tracing::warn!(path = %p.display(), error = %e, "skipping unreadable file"),
        }
    }
    Ok(docs)
}

pub fn load_json(path: &Path) -> Result<Vec<Document>> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(f);
    let mut docs = Vec::new();
    if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            let value: serde_json::Value =
                serde_json::from_str(&line).with_context(|| format!("{}:{}", path.display(), lineno + 1))?;
            docs.push(json_document(value)?);
        }
    } else {
        let json: serde_json::Value = serde_json::from_reader(reader)?;
        match json {
            serde_json::Value::Array(arr) => {
                for v in arr {
                    docs.push(json_document(v)?);
                }
            }
            obj @ serde_json::Value::Object(_) => docs.push(json_document(obj)?),
            _ => bail!("{} holds neither an object nor an array", path.display()),
        }
    }
    Ok(docs)
}

/// Scalars become fields; nested values and nulls are dropped.
fn json_document(value: serde_json::Value) -> Result<Document> {
    let serde_json::Value::Object(map) = value else {
        return Err(anyhow!("expected a JSON object per document"));
    };
    Ok(map
        .into_iter()
        .filter_map(|(k, v)| match v {
            serde_json::Value::String(s) => Some((k, s)),
            serde_json::Value::Number(n) => Some((k, n.to_string())),
            serde_json::Value::Bool(b) => Some((k, b.to_string())),
            _ => None,
        })
        .collect())
}

/// Read an [`IndexConfig`] from a JSON file, or the default config when no path is given.
pub fn load_index_config(path: Option<&Path>) -> Result<IndexConfig> {
    let Some(path) = path else { return Ok(IndexConfig::default()) };
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: IndexConfig = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    config.validate().with_context(|| format!("invalid index config in {}", path.display()))?;
    Ok(config)
}

/// Download `url` to `dest` unless it is already there. Returns whether a download happened.
pub async fn download_archive(url: &str, dest: &Path) -> Result<bool> {
    if dest.exists() {
        tracing::info!(dest = %dest.display(), "archive already present");
        return Ok(false);
    }
    if let Some(dir) = dest.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    tracing::info!(url, "downloading archive");
    let resp = reqwest::get(url).await?.error_for_status()?;
    let partial = dest.with_extension("part");
    if let Err(e) = stream_to_file(resp, &partial).await {
        tokio::fs::remove_file(&partial).await.ok();
        return Err(e.context(format!("downloading {url}")));
    }
    tokio::fs::rename(&partial, dest).await?;
    tracing::info!(dest = %dest.display(), "download complete");
    Ok(true)
}

async fn stream_to_file(mut resp: reqwest::Response, path: &Path) -> Result<()> {
    let mut out = tokio::fs::File::create(path).await?;
    while let Some(chunk) = resp.chunk().await? {
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    Ok(())
}
