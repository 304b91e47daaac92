//! MPS control-daemon lifecycle adapter (spec §4.4.2).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use gpu_api::MpsConfig;

use crate::error::HwError;

const STARTUP_MARKER: &str = "startup complete\n";

/// Inputs to `Start` (spec §4.4.2 step 1 validates all four).
#[derive(Clone, Debug)]
pub struct MpsStartRequest {
    pub control_binary: PathBuf,
    pub plugin_root: PathBuf,
    pub control_id: String,
    pub device_uuids: Vec<String>,
    pub config: MpsConfig,
    /// Driver-root directories checked for existence and prefixed onto
    /// `LD_LIBRARY_PATH` (spec §4.4.2 step 4).
    pub driver_library_dirs: Vec<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MpsDirs {
    pub pipe_dir: PathBuf,
    pub log_dir: PathBuf,
}

pub struct MpsAdapter;

impl MpsAdapter {
    pub fn new() -> Self {
        MpsAdapter
    }

    /// Starts (or, if already started, returns the existing state for) the
    /// control daemon named `control_id` (spec §4.4.2 "Start").
    pub async fn start(&self, req: &MpsStartRequest) -> Result<MpsDirs, HwError> {
        if req.control_binary.as_os_str().is_empty() {
            return Err(HwError::InvalidRequest("control binary path is required".into()));
        }
        if req.plugin_root.as_os_str().is_empty() {
            return Err(HwError::InvalidRequest("plugin root is required".into()));
        }
        if req.control_id.is_empty() {
            return Err(HwError::InvalidRequest("control id is required".into()));
        }
        if req.device_uuids.is_empty() {
            return Err(HwError::InvalidRequest("at least one device UUID is required".into()));
        }

        let base = req.plugin_root.join("mps").join(&req.control_id);
        let dirs = MpsDirs {
            pipe_dir: base.join("pipe"),
            log_dir: base.join("log"),
        };
        create_dir_mode_0755(&dirs.pipe_dir).await?;
        create_dir_mode_0755(&dirs.log_dir).await?;

        let startup_marker = dirs.log_dir.join("startup.log");
        if fs::try_exists(&startup_marker).await.unwrap_or(false) {
            return Ok(dirs);
        }

        let cuda_visible_devices = dedup_preserving_order(&req.device_uuids).join(",");
        let ld_library_path = prefixed_existing_dirs(&req.driver_library_dirs).await;

        let mut child = Command::new(&req.control_binary)
            .arg("-d")
            .env("CUDA_VISIBLE_DEVICES", cuda_visible_devices)
            .env("CUDA_MPS_PIPE_DIRECTORY", &dirs.pipe_dir)
            .env("CUDA_MPS_LOG_DIRECTORY", &dirs.log_dir)
            .env("LD_LIBRARY_PATH", ld_library_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| HwError::MpsControl(format!("spawn control daemon: {e}")))?;

        self.apply_config(&mut child, &req.config, &req.device_uuids).await?;

        fs::write(&startup_marker, STARTUP_MARKER)
            .await
            .map_err(|e| sysfs_err(&startup_marker, e))?;

        Ok(dirs)
    }

    async fn apply_config(
        &self,
        child: &mut tokio::process::Child,
        config: &MpsConfig,
        device_uuids: &[String],
    ) -> Result<(), HwError> {
        let Some(mut stdin) = child.stdin.take() else {
            return Err(HwError::MpsControl("control daemon has no stdin".into()));
        };

        if let Some(pct) = config.default_active_thread_percentage {
            let cmd = format!("set_default_active_thread_percentage {pct}\n");
            stdin
                .write_all(cmd.as_bytes())
                .await
                .map_err(|e| HwError::MpsControl(format!("write config command: {e}")))?;
        }

        let mut sorted_uuids: Vec<&String> = device_uuids.iter().collect();
        sorted_uuids.sort();
        for uuid in sorted_uuids {
            let limit = config
                .pinned_mem_limits_mib
                .get(uuid)
                .copied()
                .or(config.default_pinned_mem_limit_mib);
            if let Some(limit) = limit {
                let cmd = format!("set_default_device_pinned_mem_limit {uuid} {limit}\n");
                stdin
                    .write_all(cmd.as_bytes())
                    .await
                    .map_err(|e| HwError::MpsControl(format!("write pinned-limit command: {e}")))?;
            }
        }
        Ok(())
    }

    /// Stops the control daemon and removes its directory tree (spec §4.4.2
    /// "Stop"). Empty `control_id` is a no-op.
    pub async fn stop(&self, control_binary: &Path, plugin_root: &Path, control_id: &str) -> Result<(), HwError> {
        if control_id.is_empty() {
            return Ok(());
        }
        let base = plugin_root.join("mps").join(control_id);
        let pipe_dir = base.join("pipe");

        let mut child = Command::new(control_binary)
            .env("CUDA_MPS_PIPE_DIRECTORY", &pipe_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| HwError::MpsControl(format!("spawn control client: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(b"quit\n").await;
        }
        let _ = child.wait().await;

        match fs::remove_dir_all(&base).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(sysfs_err(&base, e)),
        }
    }
}

impl Default for MpsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

async fn create_dir_mode_0755(dir: &Path) -> Result<(), HwError> {
    fs::create_dir_all(dir).await.map_err(|e| sysfs_err(dir, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        fs::set_permissions(dir, perms)
            .await
            .map_err(|e| sysfs_err(dir, e))?;
    }
    Ok(())
}

fn dedup_preserving_order(values: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        if seen.insert(v.clone()) {
            out.push(v.clone());
        }
    }
    out
}

async fn prefixed_existing_dirs(candidates: &[PathBuf]) -> String {
    let mut existing = Vec::new();
    for dir in candidates {
        if fs::try_exists(dir).await.unwrap_or(false) {
            existing.push(dir.to_string_lossy().to_string());
        }
    }
    let current = std::env::var("LD_LIBRARY_PATH").unwrap_or_default();
    if current.is_empty() {
        existing.join(":")
    } else {
        existing.push(current);
        existing.join(":")
    }
}

fn sysfs_err(path: &Path, source: std::io::Error) -> HwError {
    HwError::Sysfs {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_preserves_first_occurrence_order() {
        let input = vec!["b".to_string(), "a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(dedup_preserving_order(&input), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn start_rejects_missing_control_binary() {
        let adapter = MpsAdapter::new();
        let req = MpsStartRequest {
            control_binary: PathBuf::new(),
            plugin_root: PathBuf::from("/tmp/plugins"),
            control_id: "ctrl-0".into(),
            device_uuids: vec!["GPU-1".into()],
            config: MpsConfig::default(),
            driver_library_dirs: vec![],
        };
        let err = adapter.start(&req).await.unwrap_err();
        assert!(matches!(err, HwError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn start_rejects_empty_device_list() {
        let adapter = MpsAdapter::new();
        let req = MpsStartRequest {
            control_binary: PathBuf::from("/bin/true"),
            plugin_root: PathBuf::from("/tmp/plugins"),
            control_id: "ctrl-0".into(),
            device_uuids: vec![],
            config: MpsConfig::default(),
            driver_library_dirs: vec![],
        };
        let err = adapter.start(&req).await.unwrap_err();
        assert!(matches!(err, HwError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn stop_with_empty_control_id_is_a_noop() {
        let adapter = MpsAdapter::new();
        adapter
            .stop(Path::new("/bin/true"), Path::new("/tmp/plugins"), "")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn directories_are_created_under_plugin_root() {
        let tmp = tempfile::tempdir().unwrap();
        let adapter = MpsAdapter::new();
        let req = MpsStartRequest {
            control_binary: PathBuf::from("/bin/cat"),
            plugin_root: tmp.path().to_path_buf(),
            control_id: "ctrl-1".into(),
            device_uuids: vec!["GPU-1".into()],
            config: MpsConfig::default(),
            driver_library_dirs: vec![],
        };
        let dirs = adapter.start(&req).await.unwrap();
        assert!(dirs.pipe_dir.starts_with(tmp.path()));
        assert!(fs::try_exists(&dirs.pipe_dir).await.unwrap());
        assert!(fs::try_exists(&dirs.log_dir).await.unwrap());
        assert!(fs::try_exists(dirs.log_dir.join("startup.log")).await.unwrap());
    }

    #[tokio::test]
    async fn second_start_with_existing_marker_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let adapter = MpsAdapter::new();
        let req = MpsStartRequest {
            control_binary: PathBuf::from("/bin/cat"),
            plugin_root: tmp.path().to_path_buf(),
            control_id: "ctrl-2".into(),
            device_uuids: vec!["GPU-1".into()],
            config: MpsConfig::default(),
            driver_library_dirs: vec![],
        };
        adapter.start(&req).await.unwrap();
        // Second call must not attempt to spawn again; the control_binary
        // "/bin/true" spawning twice would still succeed, so instead verify
        // the marker-driven fast path returns the same directories.
        let dirs = adapter.start(&req).await.unwrap();
        assert!(dirs.pipe_dir.ends_with("pipe"));
    }
}
