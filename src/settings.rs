use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: Server,
    #[serde(default)]
    pub policies: Policies,
    #[serde(default)]
    pub audit: Audit,
    #[serde(default)]
    pub api: Api,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Policies {
    /// Directory of `.kdl` rule templates. The built-in templates are used when unset.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    /// Log every allow/deny decision. Handler faults are logged regardless.
    #[serde(default = "default_audit_decisions")]
    pub decisions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Api {
    /// Serve `/v1/abilities`, which returns the rules of any named principal.
    #[serde(default)]
    pub expose_abilities: bool,
}

fn default_audit_decisions() -> bool {
    true
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8180,
        }
    }
}

impl Default for Audit {
    fn default() -> Self {
        Self {
            decisions: default_audit_decisions(),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("server.host", Server::default().host)
            .into_diagnostic()?
            .set_default("server.port", Server::default().port)
            .into_diagnostic()?
            .set_default("audit.decisions", default_audit_decisions())
            .into_diagnostic()?
            .set_default("api.expose_abilities", false)
            .into_diagnostic()?;

        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: GUIDANCE_AUTHZ__SERVER__PORT=9090, etc.
        builder = builder
            .add_source(config::Environment::with_prefix("GUIDANCE_AUTHZ").separator("__"));

        let cfg = builder.build().into_diagnostic()?;
        let mut s: Settings = cfg.try_deserialize().into_diagnostic()?;

        if let Some(dir) = &s.policies.dir {
            if dir.is_relative() {
                s.policies.dir = Some(std::env::current_dir().into_diagnostic()?.join(dir));
            }
        }

        Ok(s)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
