//! Guaranteed release of provider-side files

use std::sync::Arc;

use crate::providers::{DocumentLlm, RemoteFile};

/// Remote files uploaded for one request
///
/// Call [`RemoteFiles::release`] once the pipeline is done. If the guard is
/// dropped first (e.g. the request future was cancelled), the deletions are
/// spawned onto the current runtime instead.
pub struct RemoteFiles {
    llm: Arc<dyn DocumentLlm>,
    files: Vec<RemoteFile>,
}

impl RemoteFiles {
    pub fn new(llm: Arc<dyn DocumentLlm>) -> Self {
        Self {
            llm,
            files: Vec::new(),
        }
    }

    pub fn push(&mut self, file: RemoteFile) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[RemoteFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Delete every held file; failures are logged, never returned
    pub async fn release(mut self) {
        let files = std::mem::take(&mut self.files);
        delete_all(self.llm.as_ref(), files).await;
    }
}

impl Drop for RemoteFiles {
    fn drop(&mut self) {
        if self.files.is_empty() {
            return;
        }

        let files = std::mem::take(&mut self.files);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let llm = Arc::clone(&self.llm);
                handle.spawn(async move {
                    delete_all(llm.as_ref(), files).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    count = files.len(),
                    "no runtime available, remote files left on provider"
                );
            }
        }
    }
}

async fn delete_all(llm: &dyn DocumentLlm, files: Vec<RemoteFile>) {
    for file in files {
        match llm.delete_file(&file).await {
            Ok(()) => tracing::debug!(file = %file.name, "deleted remote file"),
            Err(e) => tracing::warn!(
                file = %file.name,
                error = %e,
                "failed to delete remote file"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::tests::{remote, ScriptedLlm};
    use crate::providers::FileState;

    #[tokio::test]
    async fn test_release_deletes_all() {
        let llm = Arc::new(ScriptedLlm::new(&[]));
        let mut guard = RemoteFiles::new(llm.clone());
        guard.push(remote("a.pdf", FileState::Active));
        guard.push(remote("b.pdf", FileState::Active));
        assert_eq!(guard.len(), 2);

        guard.release().await;

        assert_eq!(*llm.deleted.lock(), vec!["files/a.pdf", "files/b.pdf"]);
    }

    #[tokio::test]
    async fn test_drop_spawns_deletion() {
        let llm = Arc::new(ScriptedLlm::new(&[]));
        {
            let mut guard = RemoteFiles::new(llm.clone());
            guard.push(remote("orphan.png", FileState::Processing));
        }

        for _ in 0..10 {
            if !llm.deleted.lock().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(*llm.deleted.lock(), vec!["files/orphan.png"]);
    }

    #[tokio::test]
    async fn test_empty_guard_is_noop() {
        let llm = Arc::new(ScriptedLlm::new(&[]));
        let guard = RemoteFiles::new(llm.clone());
        assert!(guard.is_empty());
        drop(guard);
        tokio::task::yield_now().await;
        assert!(llm.deleted.lock().is_empty());
    }
}
