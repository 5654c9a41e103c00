#[cfg(test)]
mod tests {
    use std::io::Write;

    use http::Method;
    use serial_test::serial;

    use crate::config::proc_loader::{file_to_config, parse_config};
    use crate::config::settings::LogFormat;
    use crate::config::sources::CredentialSource;
    use crate::sources::provider::ProviderSettings;
    use crate::utils::logging::{self, LogLevel};

    const VALID: &str = r#"
settings:
  safety_margin_seconds: 120
  assertion_lifetime_seconds: 1800
  retry:
    attempts: 5
    base_delay_ms: 100
    max_delay_ms: 800
  metrics:
    is_enabled: true
  server:
    host: 127.0.0.1
    port: "9100"
  logging:
    level: debug
    format: json
credentials:
  source:
    path: /etc/sa/credentials.json
  scopes:
    - https://www.googleapis.com/auth/drive
api:
  base_url: https://www.googleapis.com
  probes:
    about:
      path: /drive/v3/about
      query:
        fields: user,storageQuota
      expect_fields: [user.displayName, storageQuota.limit]
    create_folder:
      method: POST
      path: /drive/v3/files
      body:
        name: MyTestFolder
        mimeType: application/vnd.google-apps.folder
      expect_fields: [id]
"#;

    #[tokio::test]
    async fn valid_config_parses_with_defaults() {
        let config = parse_config(VALID.to_owned()).await.expect("config is valid");

        assert_eq!(config.credentials.source, CredentialSource::Path { path: "/etc/sa/credentials.json".to_owned() });
        assert_eq!(config.settings.metrics.path, "/metrics");
        let api = config.api.as_ref().unwrap();
        assert_eq!(api.probes.len(), 2);
        assert_eq!(api.probes["about"].method, Method::GET);
        assert_eq!(api.probes["about"].expect_status, 200);
        assert_eq!(api.probes["create_folder"].method, Method::POST);
        assert_eq!(api.probes["create_folder"].body.as_ref().unwrap()["name"], "MyTestFolder");

        let settings = ProviderSettings::from_settings(&config.settings);
        assert_eq!(settings.safety_margin.num_seconds(), 120);
        assert_eq!(settings.assertion_lifetime.num_seconds(), 1800);

        let logging_config = logging::resolve(&config, Some(LogLevel::WARN));
        assert_eq!(logging_config.level, "warn");
        assert_eq!(logging_config.format, LogFormat::Json);
    }

    #[tokio::test]
    async fn minimal_config_gets_default_margin_and_logging() {
        let config = parse_config(
            "credentials:\n  source:\n    from_env: SA_CREDENTIALS_JSON\n  scopes: [\"https://www.googleapis.com/auth/drive.readonly\"]\n"
                .to_owned(),
        )
        .await
        .unwrap();

        assert_eq!(config.settings.safety_margin_seconds, Some(60));
        assert_eq!(config.settings.logging.as_ref().unwrap().level, "info");
        assert!(config.api.is_none());
        assert_eq!(config.credentials.source, CredentialSource::FromEnv { from_env: "SA_CREDENTIALS_JSON".to_owned() });
    }

    #[tokio::test]
    async fn invalid_config_reports_every_issue() {
        let raw = r#"
settings:
  safety_margin_seconds: 7200
  assertion_lifetime_seconds: 0
  retry:
    attempts: 0
    base_delay_ms: 500
    max_delay_ms: 100
  logging:
    level: verbose
    format: compact
credentials:
  source:
    path: ""
  scopes: []
api:
  base_url: ftp://example.test
  probes:
    broken:
      path: drive/v3/about
      expect_status: 42
      expect_fields: [user..name]
"#;
        let err = parse_config(raw.to_owned()).await.unwrap_err().to_string();

        for expected in [
            "settings.safety_margin_seconds",
            "settings.assertion_lifetime_seconds",
            "settings.retry.attempts",
            "settings.retry.max_delay_ms",
            "settings.logging.level",
            "credentials.source.path",
            "credentials.scopes",
            "api.base_url",
            "api.probes['broken'].path",
            "api.probes['broken'].expect_status",
            "api.probes['broken'].expect_fields",
        ] {
            assert!(err.contains(expected), "missing '{expected}' in:\n{err}");
        }
    }

    #[tokio::test]
    #[serial]
    async fn demo_config_covers_drive_operations() {
        let config = parse_config(include_str!("../../demos/sa-token-agent.yaml").to_owned())
            .await
            .expect("demo config is valid");
        let probes = &config.api.as_ref().unwrap().probes;

        assert_eq!(probes.len(), 10);
        assert_eq!(probes["rename_file"].method, Method::PATCH);
        assert_eq!(probes["star_file"].body.as_ref().unwrap()["starred"], true);
        assert_eq!(probes["copy_file"].method, Method::POST);
        assert!(probes["copy_file"].path.ends_with("/copy"));
        assert_eq!(probes["list_files_by_owner"].query["q"], "'me' in owners");
    }

    #[tokio::test]
    #[serial]
    async fn env_placeholders_are_expanded_from_file() {
        std::env::set_var("SA_TOKEN_AGENT_TEST_KEY_PATH", "/run/secrets/sa.json");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "credentials:\n  source:\n    path: ${{SA_TOKEN_AGENT_TEST_KEY_PATH}}\n  scopes: [\"${{SA_TOKEN_AGENT_TEST_SCOPE:https://www.googleapis.com/auth/drive}}\"]\n"
        )
        .unwrap();

        let config = file_to_config(file.path()).await.unwrap();
        std::env::remove_var("SA_TOKEN_AGENT_TEST_KEY_PATH");

        assert_eq!(config.credentials.source, CredentialSource::Path { path: "/run/secrets/sa.json".to_owned() });
        assert_eq!(config.credentials.scopes, vec!["https://www.googleapis.com/auth/drive".to_owned()]);
    }
}
