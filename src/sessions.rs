/// A file-backed session directory standing in for the hosted identity provider.
///
/// Sessions are read from a JSON file mapping session tokens to authentication contexts. When
/// the file changes the directory is updated in place.
use crate::auth::{AuthLookupError, AuthProvider, AuthenticationContext, ConstantTimeString};
use anyhow::anyhow;
use async_trait::async_trait;
use dashmap::DashMap;
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// The sessions file: a map of session tokens to the context they resolve to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionsFile {
    pub sessions: HashMap<String, AuthenticationContext>,
}

/// The live-updating collection of sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionDirectory {
    pub(crate) sessions: Arc<DashMap<ConstantTimeString, AuthenticationContext>>,
}

#[async_trait]
pub trait SessionsStream {
    async fn receive(
        &self,
    ) -> Result<mpsc::Receiver<Result<SessionDirectory, anyhow::Error>>, anyhow::Error>;
}

pub struct WatchedFile(pub PathBuf);

#[async_trait]
impl SessionsStream for WatchedFile {
    /// Watches a file for changes and returns a stream of directory updates.
    async fn receive(
        &self,
    ) -> Result<mpsc::Receiver<Result<SessionDirectory, anyhow::Error>>, anyhow::Error> {
        let (sessions_tx, sessions_rx) = mpsc::channel(16);
        let (file_tx, mut file_rx) = mpsc::channel(16);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = file_tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )?;

        watcher.watch(&self.0, RecursiveMode::NonRecursive)?;

        let path = self.0.clone();
        tokio::spawn(async move {
            // The watcher stops delivering events once dropped.
            let _watcher = watcher;
            while let Some(res) = file_rx.recv().await {
                let update = match res {
                    Ok(event) if event.kind.is_modify() => {
                        info!("Sessions file changed, reloading...");
                        SessionDirectory::from_file(&path).await
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        error!("Watch error: {}", e);
                        Err(anyhow!("Watch error: {}", e))
                    }
                };
                if sessions_tx.send(update).await.is_err() {
                    break; // Receiver dropped
                }
            }
        });

        Ok(sessions_rx)
    }
}

impl SessionDirectory {
    pub async fn from_file(path: &PathBuf) -> Result<Self, anyhow::Error> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read sessions file {}: {}", path.display(), e))?;

        let file: SessionsFile = serde_json::from_str(&contents)
            .map_err(|e| anyhow!("Failed to parse sessions file {}: {}", path.display(), e))?;

        let directory = Self::from_sessions(file);
        info!(
            "Loaded {} sessions from {}",
            directory.sessions.len(),
            path.display()
        );
        Ok(directory)
    }

    pub fn from_sessions(file: SessionsFile) -> Self {
        let sessions = Arc::new(DashMap::new());
        for (token, context) in file.sessions {
            sessions.insert(ConstantTimeString::from(token), context);
        }
        Self { sessions }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Applies updates from `stream` until it closes. Failed reloads keep the previous sessions.
    pub async fn receive_updates<W: SessionsStream + Send + 'static>(
        &self,
        stream: W,
    ) -> Result<(), anyhow::Error> {
        let sessions = Arc::clone(&self.sessions);
        let mut rx = stream.receive().await?;

        tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                match result {
                    Ok(updated) => {
                        // Remove stale entries before inserting so there is never a moment with
                        // no sessions at all.
                        let current: Vec<ConstantTimeString> =
                            sessions.iter().map(|entry| entry.key().clone()).collect();
                        for token in current {
                            if !updated.sessions.contains_key(&token) {
                                sessions.remove(&token);
                            }
                        }
                        for entry in updated.sessions.iter() {
                            sessions.insert(entry.key().clone(), entry.value().clone());
                        }
                        info!("Session directory now holds {} sessions", sessions.len());
                    }
                    Err(e) => {
                        error!("Failed to reload sessions: {}", e);
                    }
                }
            }
        });

        Ok(())
    }
}

#[async_trait]
impl AuthProvider for SessionDirectory {
    async fn authenticate(
        &self,
        token: Option<&str>,
    ) -> Result<AuthenticationContext, AuthLookupError> {
        let Some(token) = token else {
            return Ok(AuthenticationContext::anonymous());
        };
        match self.sessions.get(&ConstantTimeString::from(token)) {
            Some(context) => Ok(context.clone()),
            None => {
                debug!("Unknown session token");
                Ok(AuthenticationContext::anonymous())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    pub struct MockSessionsWatcher {
        updates: Vec<Result<SessionsFile, String>>,
    }

    #[async_trait]
    impl SessionsStream for MockSessionsWatcher {
        async fn receive(
            &self,
        ) -> Result<mpsc::Receiver<Result<SessionDirectory, anyhow::Error>>, anyhow::Error>
        {
            let (tx, rx) = mpsc::channel(16);
            let updates = self.updates.clone();
            tokio::spawn(async move {
                for update in updates {
                    let result = update
                        .map(SessionDirectory::from_sessions)
                        .map_err(|e| anyhow!(e));
                    if tx.send(result).await.is_err() {
                        break;
                    }
                    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
                }
            });
            Ok(rx)
        }
    }

    fn sessions(entries: &[(&str, Option<&str>, Option<&str>)]) -> SessionsFile {
        SessionsFile {
            sessions: entries
                .iter()
                .map(|(token, user, org)| {
                    (
                        token.to_string(),
                        AuthenticationContext {
                            user_id: user.map(String::from),
                            organization_id: org.map(String::from),
                        },
                    )
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_known_and_unknown_tokens() {
        let directory =
            SessionDirectory::from_sessions(sessions(&[("sess_a", Some("user_a"), Some("org_1"))]));

        let context = directory.authenticate(Some("sess_a")).await.unwrap();
        assert_eq!(context.organization_id.as_deref(), Some("org_1"));

        let context = directory.authenticate(Some("sess_b")).await.unwrap();
        assert_eq!(context, AuthenticationContext::anonymous());

        let context = directory.authenticate(None).await.unwrap();
        assert_eq!(context, AuthenticationContext::anonymous());
    }

    #[tokio::test]
    async fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"sessions": {{"sess_a": {{"user_id": "user_a"}}}}}}"#
        )
        .unwrap();

        let directory = SessionDirectory::from_file(&file.path().to_path_buf())
            .await
            .unwrap();
        let context = directory.authenticate(Some("sess_a")).await.unwrap();
        assert_eq!(context.user_id.as_deref(), Some("user_a"));
        assert_eq!(context.organization_id, None);
    }

    #[tokio::test]
    async fn test_from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = SessionDirectory::from_file(&file.path().to_path_buf())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse sessions file"));
    }

    #[tokio::test]
    async fn test_updates_replace_sessions() {
        let directory =
            SessionDirectory::from_sessions(sessions(&[("sess_a", Some("user_a"), None)]));

        let watcher = MockSessionsWatcher {
            updates: vec![
                Ok(sessions(&[
                    ("sess_a", Some("user_a"), Some("org_1")),
                    ("sess_b", Some("user_b"), None),
                ])),
                Ok(sessions(&[("sess_b", Some("user_b"), Some("org_2"))])),
            ],
        };
        directory.receive_updates(watcher).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        assert_eq!(directory.len(), 1);
        let context = directory.authenticate(Some("sess_b")).await.unwrap();
        assert_eq!(context.organization_id.as_deref(), Some("org_2"));
        let context = directory.authenticate(Some("sess_a")).await.unwrap();
        assert_eq!(context, AuthenticationContext::anonymous());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_sessions() {
        let directory =
            SessionDirectory::from_sessions(sessions(&[("sess_a", Some("user_a"), None)]));
        let watcher = MockSessionsWatcher {
            updates: vec![Err("Invalid sessions file".to_string())],
        };
        directory.receive_updates(watcher).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(directory.len(), 1);
    }
}
