//! Transfer of finished downloads to a remote media host.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use engine_logging::{engine_debug, engine_info};
use tokio::process::Command;
use walkdir::WalkDir;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_REMOTE_PATH: &str = "/mnt/media";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("ssh upload is disabled or incomplete")]
    NotConfigured,
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to list {path}: {message}")]
    Walk { path: PathBuf, message: String },
    #[error("failed to start {tool}: {message}")]
    Launch { tool: String, message: String },
    #[error("{tool} exited with {code:?}: {stderr}")]
    Command {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
pub trait UploadRelay: Send + Sync {
    /// Copies every file under `local_dir` to the remote host. `remote_dir`
    /// defaults to the configured base path plus the local directory name.
    async fn upload_directory(
        &self,
        local_dir: &Path,
        remote_dir: Option<&str>,
    ) -> Result<(), UploadError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub remote_path: String,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: DEFAULT_SSH_PORT,
            username: String::new(),
            remote_path: DEFAULT_REMOTE_PATH.to_string(),
        }
    }
}

impl SshSettings {
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.host.trim().is_empty() && !self.username.trim().is_empty()
    }
}

/// One local file and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub local: PathBuf,
    pub remote: String,
}

/// Uploads with the system `ssh`/`scp` clients (key-based auth), then removes
/// the local copy.
#[derive(Debug, Clone)]
pub struct ScpUploadRelay {
    settings: SshSettings,
    ssh_program: String,
    scp_program: String,
}

impl ScpUploadRelay {
    pub fn new(settings: SshSettings) -> Result<Self, UploadError> {
        if !settings.is_configured() {
            return Err(UploadError::NotConfigured);
        }
        Ok(Self {
            settings,
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
        })
    }

    pub fn with_programs(mut self, ssh: impl Into<String>, scp: impl Into<String>) -> Self {
        self.ssh_program = ssh.into();
        self.scp_program = scp.into();
        self
    }

    pub fn settings(&self) -> &SshSettings {
        &self.settings
    }

    /// Lists the transfers for `local_dir` without touching the network.
    pub fn plan(&self, local_dir: &Path, remote_dir: Option<&str>) -> Result<Vec<Transfer>, UploadError> {
        if !local_dir.is_dir() {
            return Err(UploadError::NotADirectory(local_dir.to_path_buf()));
        }
        let remote_root = match remote_dir {
            Some(dir) => dir.trim_end_matches('/').to_string(),
            None => {
                let name = local_dir
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("{}/{name}", self.settings.remote_path.trim_end_matches('/'))
            }
        };

        let mut transfers = Vec::new();
        for entry in WalkDir::new(local_dir).sort_by_file_name() {
            let entry = entry.map_err(|err| UploadError::Walk {
                path: local_dir.to_path_buf(),
                message: err.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(local_dir)
                .map_err(|err| UploadError::Walk {
                    path: entry.path().to_path_buf(),
                    message: err.to_string(),
                })?;
            let relative: Vec<String> = relative
                .components()
                .map(|part| part.as_os_str().to_string_lossy().into_owned())
                .collect();
            transfers.push(Transfer {
                local: entry.into_path(),
                remote: format!("{remote_root}/{}", relative.join("/")),
            });
        }
        Ok(transfers)
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.settings.username, self.settings.host)
    }

    async fn send(&self, transfer: &Transfer) -> Result<(), UploadError> {
        let remote_parent = transfer
            .remote
            .rsplit_once('/')
            .map(|(parent, _)| parent)
            .filter(|parent| !parent.is_empty())
            .unwrap_or("/");
        let port = self.settings.port.to_string();

        run(
            &self.ssh_program,
            &[
                "-p".to_string(),
                port.clone(),
                self.destination(),
                format!("mkdir -p {}", shell_quote(remote_parent)),
            ],
        )
        .await?;
        run(
            &self.scp_program,
            &[
                "-P".to_string(),
                port,
                transfer.local.to_string_lossy().into_owned(),
                format!("{}:{}", self.destination(), shell_quote(&transfer.remote)),
            ],
        )
        .await
    }
}

#[async_trait::async_trait]
impl UploadRelay for ScpUploadRelay {
    async fn upload_directory(
        &self,
        local_dir: &Path,
        remote_dir: Option<&str>,
    ) -> Result<(), UploadError> {
        let transfers = self.plan(local_dir, remote_dir)?;
        engine_info!(
            "uploading {} files from {} to {}",
            transfers.len(),
            local_dir.display(),
            self.destination()
        );
        for transfer in &transfers {
            engine_debug!("scp {} -> {}", transfer.local.display(), transfer.remote);
            self.send(transfer).await?;
        }
        tokio::fs::remove_dir_all(local_dir).await?;
        Ok(())
    }
}

async fn run(program: &str, args: &[String]) -> Result<(), UploadError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|err| UploadError::Launch {
            tool: program.to_string(),
            message: err.to_string(),
        })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(UploadError::Command {
            tool: program.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Single-quotes `value` for the remote shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings() -> SshSettings {
        SshSettings {
            enabled: true,
            host: "media.lan".into(),
            username: "jelly".into(),
            ..SshSettings::default()
        }
    }

    #[test]
    fn relay_requires_complete_settings() {
        assert!(matches!(
            ScpUploadRelay::new(SshSettings::default()),
            Err(UploadError::NotConfigured)
        ));
        let missing_host = SshSettings {
            host: " ".into(),
            ..settings()
        };
        assert!(ScpUploadRelay::new(missing_host).is_err());
        assert!(ScpUploadRelay::new(settings()).is_ok());
    }

    #[test]
    fn plan_mirrors_directory_tree_under_remote_base() {
        let tmp = tempfile::tempdir().unwrap();
        let show = tmp.path().join("my show");
        std::fs::create_dir_all(show.join("extras")).unwrap();
        std::fs::write(show.join("my show - S01E01 - (German Sub).mp4"), b"1").unwrap();
        std::fs::write(show.join("extras").join("cover.jpg"), b"2").unwrap();

        let relay = ScpUploadRelay::new(settings()).unwrap();
        let remotes: Vec<String> = relay
            .plan(&show, None)
            .unwrap()
            .into_iter()
            .map(|t| t.remote)
            .collect();
        assert_eq!(
            remotes,
            vec![
                "/mnt/media/my show/extras/cover.jpg",
                "/mnt/media/my show/my show - S01E01 - (German Sub).mp4",
            ]
        );

        let custom = relay.plan(&show, Some("/srv/anime/")).unwrap();
        assert_eq!(custom[0].remote, "/srv/anime/extras/cover.jpg");
    }

    #[test]
    fn plan_rejects_missing_directory() {
        let relay = ScpUploadRelay::new(settings()).unwrap();
        let err = relay.plan(Path::new("/definitely/not/here"), None).unwrap_err();
        assert!(matches!(err, UploadError::NotADirectory(_)));
    }

    #[test]
    fn quoting_survives_apostrophes() {
        assert_eq!(shell_quote("/mnt/media/it's"), r"'/mnt/media/it'\''s'");
    }
}
