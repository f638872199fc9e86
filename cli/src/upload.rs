//! Parallel upload of many files through one shared client.
//!
//! A fixed number of scoped worker threads pull file indices from a shared
//! counter until the list is exhausted. Outcomes are reported in input order
//! regardless of which worker finished first.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use anyhow::{anyhow, Result};
use serde::Serialize;
use telegraph_core::{TelegraphClient, Transport};
use tracing::{debug, warn};

/// Result of uploading one file. Exactly one of `path` and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn is_ok(&self) -> bool {
        self.path.is_some()
    }
}

/// Upload `files` with at most `jobs` concurrent requests.
pub fn upload_all<T: Transport>(
    client: &TelegraphClient<T>,
    files: &[PathBuf],
    jobs: usize,
) -> Result<Vec<UploadOutcome>> {
    let workers = jobs.clamp(1, files.len().max(1));
    let next = AtomicUsize::new(0);

    let mut done: Vec<(usize, UploadOutcome)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let next = &next;
                scope.spawn(move || {
                    let mut outcomes = Vec::new();
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(file) = files.get(index) else {
                            break;
                        };
                        debug!(worker, file = %file.display(), "uploading");
                        outcomes.push((index, upload_one(client, file)));
                    }
                    outcomes
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| anyhow!("upload worker panicked")))
            .collect::<Result<Vec<_>>>()
            .map(|per_worker| per_worker.into_iter().flatten().collect())
    })?;

    done.sort_by_key(|(index, _)| *index);
    Ok(done.into_iter().map(|(_, outcome)| outcome).collect())
}

fn upload_one<T: Transport>(client: &TelegraphClient<T>, file: &Path) -> UploadOutcome {
    let name = file.display().to_string();
    match client.upload_file(file) {
        Ok(path) => UploadOutcome {
            file: name,
            path: Some(path),
            error: None,
        },
        Err(err) => {
            warn!(file = %name, error = %err, "upload failed");
            UploadOutcome {
                file: name,
                path: None,
                error: Some(err.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use telegraph_core::ClientConfig;

    use super::*;

    fn start_server() -> SocketAddr {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                mock_server::run(listener).await
            })
            .unwrap();
        });

        addr
    }

    #[test]
    fn outcomes_keep_input_order() {
        let addr = start_server();
        let client = TelegraphClient::new(
            ClientConfig::default()
                .with_api_url(&format!("http://{addr}"))
                .with_upload_url(&format!("http://{addr}/upload")),
        );

        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for i in 0..7 {
            let file = dir.path().join(format!("img{i}.png"));
            std::fs::write(&file, [i as u8; 32]).unwrap();
            files.push(file);
        }
        // Unreadable entry in the middle.
        files.insert(3, dir.path().join("missing.png"));

        let outcomes = upload_all(&client, &files, 3).unwrap();

        assert_eq!(outcomes.len(), files.len());
        for (outcome, file) in outcomes.iter().zip(&files) {
            assert_eq!(outcome.file, file.display().to_string());
        }
        assert!(!outcomes[3].is_ok());
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 7);
        assert!(outcomes
            .iter()
            .filter_map(|o| o.path.as_deref())
            .all(|p| p.starts_with("/file/") && p.ends_with(".png")));
    }

    #[test]
    fn empty_file_list_uploads_nothing() {
        let client = TelegraphClient::new(ClientConfig::default());
        assert!(upload_all(&client, &[], 4).unwrap().is_empty());
    }
}
