use super::ErrorCode;
use crate::cache::{CacheError, Fetcher, OfflineCache, Request};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];

struct RemoteMedia {
    base_url: String,
    cache: OfflineCache,
    fetcher: Box<dyn Fetcher + Send + Sync>,
}

/// Turns a media id into encoded audio bytes.
///
/// A file in the media directory whose stem equals the id wins. Otherwise the
/// id is fetched from `<base url>/<id>` through the offline cache.
pub struct MediaResolver {
    media_dir: Option<PathBuf>,
    remote: Option<RemoteMedia>,
}

impl MediaResolver {
    pub fn new(media_dir: Option<PathBuf>) -> Self {
        Self {
            media_dir,
            remote: None,
        }
    }

    pub fn with_remote(
        mut self,
        base_url: &str,
        cache: OfflineCache,
        fetcher: impl Fetcher + Send + Sync + 'static,
    ) -> Self {
        self.remote = Some(RemoteMedia {
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
            fetcher: Box::new(fetcher),
        });
        self
    }

    pub fn media_url(&self, id: &str) -> Option<String> {
        self.remote
            .as_ref()
            .map(|remote| format!("{}/{id}", remote.base_url))
    }

    pub fn resolve(&self, id: &str) -> Result<Vec<u8>, ErrorCode> {
        if let Some(path) = self.find_local(id) {
            debug!("resolved {id} to {}", path.display());
            return fs::read(&path).map_err(|err| {
                warn!("failed to read {}: {err}", path.display());
                ErrorCode::PLAYBACK_FAILURE
            });
        }

        let Some(remote) = &self.remote else {
            debug!("no local file for {id} and no remote media configured");
            return Err(ErrorCode::NOT_FOUND);
        };

        let url = format!("{}/{id}", remote.base_url);
        remote
            .cache
            .fetch(&Request::new(&url), remote.fetcher.as_ref())
            .map_err(|err| {
                warn!("failed to fetch {url}: {err}");
                match err {
                    CacheError::Status {
                        status: 404 | 410, ..
                    } => ErrorCode::NOT_FOUND,
                    CacheError::Status {
                        status: 401 | 403, ..
                    } => ErrorCode::EMBEDDING_FORBIDDEN,
                    _ => ErrorCode::PLAYBACK_FAILURE,
                }
            })
    }

    fn find_local(&self, id: &str) -> Option<PathBuf> {
        let dir = self.media_dir.as_ref()?;
        WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .find(|path| is_audio_file(path) && path.file_stem() == Some(OsStr::new(id)))
    }
}

fn is_audio_file(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}
