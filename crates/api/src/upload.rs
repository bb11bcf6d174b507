//! Video upload.
//!
//! Single-shot: ticket → POST file to the ticket endpoint (echoes the MD5)
//! → confirm.
//!
//! Chunked: ticket → split into chunks in a scratch dir → POST each chunk
//! → verifyManifest (reports the assembled MD5) → delete chunks → confirm.
//!
//! Any failure aborts the upload. There is no resume; start again with a
//! new ticket.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use reqwest::blocking::multipart::Form;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{decode_reply, response_ok, HttpMethod, RequestOptions, VimeoClient, RESPONSE_FORMAT};
use crate::envelope::{str_at, Envelope};
use crate::error::{ApiError, IntegrityStage};
use crate::params::ApiParams;

pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

const GET_TICKET: &str = "vimeo.videos.upload.getTicket";
const VERIFY_MANIFEST: &str = "vimeo.videos.upload.verifyManifest";
const CONFIRM: &str = "vimeo.videos.upload.confirm";

/// Outcome of an upload call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upload {
    /// The server confirmed the upload and assigned this video id.
    Confirmed(String),
    /// The source file does not exist. Nothing was sent.
    FileNotFound(PathBuf),
}

impl Upload {
    pub fn video_id(&self) -> Option<&str> {
        match self {
            Self::Confirmed(id) => Some(id),
            Self::FileNotFound(_) => None,
        }
    }
}

/// Handle for one upload session. Consumed by [`Uploader::confirm`].
#[derive(Debug, PartialEq, Eq)]
pub struct UploadTicket {
    pub id: String,
    pub endpoint: String,
}

/// One piece of the source file, materialized on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub path: PathBuf,
    pub offset: u64,
    pub len: u64,
    pub md5: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub md5: String,
}

/// Ordered chunk checksums, sent as `json_manifest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        Self {
            files: chunks
                .iter()
                .map(|c| ManifestEntry { md5: c.md5.clone() })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, ApiError> {
        serde_json::to_string(self).map_err(|e| ApiError::Io(format!("cannot encode manifest: {e}")))
    }
}

// ── Coordinator ─────────────────────────────────────────────────────

/// Drives one upload through its stages using a client's credentials.
pub struct Uploader<'a> {
    client: &'a VimeoClient,
    chunk_size: u64,
}

impl<'a> Uploader<'a> {
    pub fn new(client: &'a VimeoClient) -> Self {
        Self { client, chunk_size: DEFAULT_CHUNK_SIZE }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Upload `path` in a single request.
    pub fn upload(&self, path: &Path) -> Result<Upload, ApiError> {
        if !path.is_file() {
            return Ok(Upload::FileNotFound(path.to_path_buf()));
        }

        let expected = md5_file(path)?;
        let ticket = self.get_ticket()?;
        log::info!("upload {}: ticket {}", path.display(), ticket.id);

        let echoed = self.transfer(&ticket, path)?;
        if !same_md5(&expected, &echoed) {
            return Err(ApiError::IntegrityMismatch {
                stage: IntegrityStage::Transfer,
                expected,
                actual: echoed.trim().to_string(),
            });
        }
        log::info!("upload {}: transferred, md5 {}", path.display(), expected);

        let video_id = self.confirm(ticket, &base_name(path), None)?;
        log::info!("upload {}: confirmed as video {}", path.display(), video_id);
        Ok(Upload::Confirmed(video_id))
    }

    /// Upload `path` in pieces of `chunk_size` bytes.
    pub fn upload_multi(&self, path: &Path) -> Result<Upload, ApiError> {
        if self.chunk_size == 0 {
            return Err(ApiError::Config("chunk size must be greater than zero".into()));
        }
        if !path.is_file() {
            return Ok(Upload::FileNotFound(path.to_path_buf()));
        }

        let expected = md5_file(path)?;
        let ticket = self.get_ticket()?;
        log::info!("upload {}: ticket {}", path.display(), ticket.id);

        // dropping the dir on any early return removes every chunk
        let scratch = self.scratch_dir()?;
        let chunks = split_into_chunks(path, scratch.path(), self.chunk_size)?;
        log::info!(
            "upload {}: {} chunks of up to {} bytes",
            path.display(),
            chunks.len(),
            self.chunk_size
        );

        for chunk in &chunks {
            self.transfer_chunk(&ticket, chunk)?;
            log::debug!("chunk {} ({} bytes) sent", chunk.index, chunk.len);
        }
        log::info!("upload {}: chunks transferred", path.display());

        let manifest = Manifest::from_chunks(&chunks).to_json()?;
        let verified = self.verify_manifest(&ticket, &manifest);

        if let Err(e) = scratch.close() {
            log::warn!("could not remove upload chunks: {e}");
        }

        let reported = verified?;
        if !same_md5(&expected, &reported) {
            return Err(ApiError::IntegrityMismatch {
                stage: IntegrityStage::Manifest,
                expected,
                actual: reported.trim().to_string(),
            });
        }
        log::info!("upload {}: manifest verified, md5 {}", path.display(), expected);

        let video_id = self.confirm(ticket, &base_name(path), Some(&manifest))?;
        log::info!("upload {}: confirmed as video {}", path.display(), video_id);
        Ok(Upload::Confirmed(video_id))
    }

    // ── Stages ──────────────────────────────────────────────────────

    /// Tickets are single-use, so this call never goes through the cache.
    pub fn get_ticket(&self) -> Result<UploadTicket, ApiError> {
        let rsp = self
            .client
            .call(GET_TICKET, ApiParams::new(), &RequestOptions::default().uncached())?;
        Ok(UploadTicket {
            id: str_at(&rsp, &["ticket", "id"])?,
            endpoint: str_at(&rsp, &["ticket", "endpoint"])?,
        })
    }

    /// POST the whole file. Returns what the endpoint echoes back, which is
    /// the MD5 of the received bytes unless the endpoint refused them.
    fn transfer(&self, ticket: &UploadTicket, path: &Path) -> Result<String, ApiError> {
        let (status, body) = self.post_file(ticket, path)?;
        if let Some(err) = refusal(&body) {
            return Err(err);
        }
        if !response_ok(status) {
            return Err(ApiError::Http(status, body));
        }
        Ok(body)
    }

    /// POST one chunk. An echoed checksum must match the chunk's own.
    fn transfer_chunk(&self, ticket: &UploadTicket, chunk: &Chunk) -> Result<(), ApiError> {
        let echoed = self.transfer(ticket, &chunk.path)?;
        let echoed = echoed.trim();
        if is_md5_hex(echoed) && !same_md5(&chunk.md5, echoed) {
            return Err(ApiError::IntegrityMismatch {
                stage: IntegrityStage::Chunk(chunk.index),
                expected: chunk.md5.clone(),
                actual: echoed.to_string(),
            });
        }
        Ok(())
    }

    /// Multipart POST of the signed ticket params plus `file_data`. The
    /// file itself is not part of the signature.
    fn post_file(&self, ticket: &UploadTicket, path: &Path) -> Result<(u16, String), ApiError> {
        let signed = self.client.sign(
            self.client.fresh_oauth(),
            ApiParams::new().with("ticket_id", ticket.id.as_str()),
            HttpMethod::Post,
            &self.client.endpoints().rest_url,
        );

        let mut form = Form::new();
        for (k, v) in signed.merged() {
            form = form.text(k, v);
        }
        let form = form
            .file("file_data", path)
            .map_err(|e| ApiError::Io(format!("{}: {e}", path.display())))?;

        self.client.post_upload(&ticket.endpoint, &[], Some(form))
    }

    /// Submit the manifest. Returns the MD5 the server computed for the
    /// assembled file.
    fn verify_manifest(&self, ticket: &UploadTicket, manifest: &str) -> Result<String, ApiError> {
        let api = ticket_params(ticket, VERIFY_MANIFEST);
        let rsp = self.post_rest(api, Some(manifest))?;
        str_at(&rsp, &["ticket", "md5"])
    }

    /// Finish the session. The ticket cannot be used afterwards.
    pub fn confirm(
        &self,
        ticket: UploadTicket,
        filename: &str,
        manifest: Option<&str>,
    ) -> Result<String, ApiError> {
        let api = ticket_params(&ticket, CONFIRM).with("filename", filename);
        let rsp = self.post_rest(api, manifest)?;
        str_at(&rsp, &["ticket", "video_id"])
    }

    /// Signed POST to the REST endpoint with the params in the URL and the
    /// manifest, if any, as a multipart field.
    fn post_rest(&self, api: ApiParams, manifest: Option<&str>) -> Result<Value, ApiError> {
        let url = self.client.endpoints().rest_url.as_str();
        let signed = self
            .client
            .sign(self.client.fresh_oauth(), api, HttpMethod::Post, url);
        let form = manifest.map(|m| Form::new().text("json_manifest", m.to_string()));

        let (status, body) = self.client.post_upload(url, &signed.merged(), form)?;
        decode_reply(status, &body)
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir, ApiError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("vimeo-upload-");
        let dir = match self.client.chunk_dir() {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        };
        dir.map_err(|e| ApiError::Io(format!("cannot create chunk directory: {e}")))
    }
}

/// The error carried by a ticket endpoint reply that is an API error
/// envelope rather than a checksum.
fn refusal(body: &str) -> Option<ApiError> {
    match Envelope::decode(body) {
        Ok(Envelope::Failure { msg, code }) => Some(ApiError::RemoteApi { code, msg }),
        _ => None,
    }
}

fn is_md5_hex(s: &str) -> bool {
    s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn ticket_params(ticket: &UploadTicket, method: &str) -> ApiParams {
    ApiParams::new()
        .with("ticket_id", ticket.id.as_str())
        .with("method", method)
        .with("format", RESPONSE_FORMAT)
}

// ── Files ───────────────────────────────────────────────────────────

/// Hex MD5 of a file, streamed.
pub fn md5_file(path: &Path) -> Result<String, ApiError> {
    let file = File::open(path).map_err(|e| ApiError::Io(format!("{}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| ApiError::Io(format!("{}: {e}", path.display())))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Write `source` as consecutive `chunk_size` pieces into `dir`.
/// Yields `ceil(len / chunk_size)` chunks; an empty file yields none.
pub fn split_into_chunks(source: &Path, dir: &Path, chunk_size: u64) -> Result<Vec<Chunk>, ApiError> {
    if chunk_size == 0 {
        return Err(ApiError::Config("chunk size must be greater than zero".into()));
    }
    let io_err = |p: &Path, e: std::io::Error| ApiError::Io(format!("{}: {e}", p.display()));

    let mut reader = File::open(source).map_err(|e| io_err(source, e))?;
    let mut chunks = Vec::new();
    let mut offset = 0u64;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        (&mut reader)
            .take(chunk_size)
            .read_to_end(&mut buf)
            .map_err(|e| io_err(source, e))?;
        if buf.is_empty() {
            break;
        }

        let index = chunks.len();
        let path = dir.join(format!("chunk.{index}"));
        let mut out = File::create(&path).map_err(|e| io_err(&path, e))?;
        out.write_all(&buf).map_err(|e| io_err(&path, e))?;

        let len = buf.len() as u64;
        chunks.push(Chunk {
            index,
            path,
            offset,
            len,
            md5: hex::encode(Md5::digest(&buf)),
        });
        offset += len;
    }
    Ok(chunks)
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn same_md5(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
