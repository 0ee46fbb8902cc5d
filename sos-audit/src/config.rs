//! sos-audit 配置，从环境变量读取

use thiserror::Error;

/// Hard upper bound on items handled per invocation
pub const MAX_BATCH_SIZE: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
    /// Settings parsed but the store could not be built from them
    #[error("Audit backend could not be initialised: {0}")]
    Backend(String),
}

/// Where the audit tables live
#[derive(Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Direct PostgreSQL connection (transactional commit)
    Postgres { database_url: String },
    /// Hosted REST backend with a privileged service key
    Rest { url: String, service_key: String },
}

impl std::fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Postgres { .. } => f.write_str("Postgres"),
            StoreBackend::Rest { url, .. } => f.debug_struct("Rest").field("url", url).finish(),
        }
    }
}

/// sos-audit 配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 存储后端 (DATABASE_URL 优先，否则 SUPABASE_URL + SUPABASE_SERVICE_ROLE_KEY)
    pub backend: StoreBackend,
    /// 每次调用处理的最大条数 (1..=100)
    pub batch_size: i64,
    /// 启动时执行迁移 (仅 PostgreSQL)
    pub run_migrations: bool,
    /// 本地调试端口；未设置时以 Lambda 方式运行
    pub local_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// `AUDIT_LOCAL_PORT` on its own, usable when the rest of the
    /// configuration is broken
    pub fn local_port_from_env() -> Result<Option<u16>, ConfigError> {
        parse_local_port(
            std::env::var("AUDIT_LOCAL_PORT")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        )
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let backend = match var("DATABASE_URL") {
            Some(database_url) => StoreBackend::Postgres { database_url },
            None => StoreBackend::Rest {
                url: var("SUPABASE_URL")
                    .ok_or(ConfigError::Missing("SUPABASE_URL"))?
                    .trim_end_matches('/')
                    .to_string(),
                service_key: var("SUPABASE_SERVICE_ROLE_KEY")
                    .ok_or(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?,
            },
        };

        let batch_size = match var("AUDIT_BATCH_SIZE") {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(n) if n >= 1 => n.min(MAX_BATCH_SIZE),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "AUDIT_BATCH_SIZE",
                        value: raw,
                    });
                }
            },
            None => MAX_BATCH_SIZE,
        };

        let run_migrations = match var("AUDIT_RUN_MIGRATIONS") {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "AUDIT_RUN_MIGRATIONS",
                        value: raw,
                    });
                }
            },
            None => true,
        };

        let local_port = parse_local_port(var("AUDIT_LOCAL_PORT"))?;

        Ok(Self {
            backend,
            batch_size,
            run_migrations,
            local_port,
        })
    }
}

fn parse_local_port(raw: Option<String>) -> Result<Option<u16>, ConfigError> {
    raw.map(|raw| {
        raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name: "AUDIT_LOCAL_PORT",
            value: raw.clone(),
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_rest_backend_requires_url_and_key() {
        assert_eq!(
            load(&[]).unwrap_err(),
            ConfigError::Missing("SUPABASE_URL")
        );
        assert_eq!(
            load(&[("SUPABASE_URL", "https://x.supabase.co")]).unwrap_err(),
            ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")
        );
        assert_eq!(
            load(&[("SUPABASE_URL", ""), ("SUPABASE_SERVICE_ROLE_KEY", "k")]).unwrap_err(),
            ConfigError::Missing("SUPABASE_URL")
        );
    }

    #[test]
    fn test_rest_backend_trims_trailing_slash() {
        let config = load(&[
            ("SUPABASE_URL", "https://x.supabase.co/"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
        ])
        .unwrap();
        assert_eq!(
            config.backend,
            StoreBackend::Rest {
                url: "https://x.supabase.co".into(),
                service_key: "service".into(),
            }
        );
        assert_eq!(config.batch_size, MAX_BATCH_SIZE);
        assert!(config.run_migrations);
        assert_eq!(config.local_port, None);
    }

    #[test]
    fn test_database_url_takes_precedence() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/sos"),
            ("SUPABASE_URL", "https://x.supabase.co"),
        ])
        .unwrap();
        assert!(matches!(config.backend, StoreBackend::Postgres { .. }));
    }

    #[test]
    fn test_batch_size_is_clamped() {
        let base = [("DATABASE_URL", "postgres://localhost/sos")];

        let config = load(&[base[0], ("AUDIT_BATCH_SIZE", "500")]).unwrap();
        assert_eq!(config.batch_size, 100);

        let config = load(&[base[0], ("AUDIT_BATCH_SIZE", "25")]).unwrap();
        assert_eq!(config.batch_size, 25);

        assert!(matches!(
            load(&[base[0], ("AUDIT_BATCH_SIZE", "0")]),
            Err(ConfigError::Invalid { name: "AUDIT_BATCH_SIZE", .. })
        ));
        assert!(matches!(
            load(&[base[0], ("AUDIT_BATCH_SIZE", "lots")]),
            Err(ConfigError::Invalid { name: "AUDIT_BATCH_SIZE", .. })
        ));
    }

    #[test]
    fn test_flags_and_port() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/sos"),
            ("AUDIT_RUN_MIGRATIONS", "off"),
            ("AUDIT_LOCAL_PORT", "9000"),
        ])
        .unwrap();
        assert!(!config.run_migrations);
        assert_eq!(config.local_port, Some(9000));
    }

    #[test]
    fn test_local_port_parsing() {
        assert_eq!(parse_local_port(None), Ok(None));
        assert_eq!(parse_local_port(Some(" 8080 ".into())), Ok(Some(8080)));
        assert_eq!(
            parse_local_port(Some("80a".into())),
            Err(ConfigError::Invalid {
                name: "AUDIT_LOCAL_PORT",
                value: "80a".into(),
            })
        );
        assert!(matches!(
            load(&[
                ("DATABASE_URL", "postgres://localhost/sos"),
                ("AUDIT_LOCAL_PORT", "70000"),
            ]),
            Err(ConfigError::Invalid { name: "AUDIT_LOCAL_PORT", .. })
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let backend = StoreBackend::Rest {
            url: "https://x.supabase.co".into(),
            service_key: "super-secret".into(),
        };
        assert!(!format!("{backend:?}").contains("super-secret"));
        let backend = StoreBackend::Postgres {
            database_url: "postgres://user:pw@host/db".into(),
        };
        assert!(!format!("{backend:?}").contains("pw"));
    }
}
