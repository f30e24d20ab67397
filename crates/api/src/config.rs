use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running from the project root.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5173`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Event streams are
    /// exempt.
    pub request_timeout_secs: u64,
    /// Where workers write bakes and the catalog; served under `/bakes`.
    pub bakes_dir: PathBuf,
    /// Static front-end files served at `/`.
    pub public_dir: PathBuf,
    /// Worker executable.
    pub worker_bin: PathBuf,
    /// How long finished tasks stay attachable, in seconds (default: `3600`).
    pub task_retention_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                   |
    /// |------------------------|-------------------------------------------|
    /// | `HOST`                 | `0.0.0.0`                                 |
    /// | `PORT`                 | `5173`                                    |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`                   |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                                      |
    /// | `BAKES_DIR`            | `bakes`                                   |
    /// | `PUBLIC_DIR`           | `public`                                  |
    /// | `WORKER_BIN`           | `hourglass-worker` beside this executable |
    /// | `TASK_RETENTION_SECS`  | `3600`                                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5173".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let bakes_dir = std::env::var("BAKES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("bakes"));

        let public_dir = std::env::var("PUBLIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("public"));

        let worker_bin = std::env::var("WORKER_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_worker_bin());

        let task_retention_secs: u64 = std::env::var("TASK_RETENTION_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("TASK_RETENTION_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            bakes_dir,
            public_dir,
            worker_bin,
            task_retention_secs,
        }
    }
}

/// `hourglass-worker` in the directory of the running executable, or bare
/// (resolved through `PATH`) when that cannot be determined.
fn default_worker_bin() -> PathBuf {
    let name = format!("hourglass-worker{}", std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
        .unwrap_or_else(|| PathBuf::from(name))
}
