pub mod models;
pub mod validation;

pub use models::*;
pub use validation::*;

#[cfg(test)]
mod tests {
    use super::*;
    use figment::{Figment, providers::{Format, Toml, Serialized}};
    use garde::Validate;

    fn extract(toml: &str) -> AppConfig {
        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .expect("Should parse config")
    }

    const VALID: &str = r#"
        [server]
        port = 8080
        bind = "0.0.0.0"

        [logging]
        level = "info"
        format = "json"

        [credentials]
        use_managed_identity = false
        tenant_id = "contoso.onmicrosoft.com"
        client_id = "11111111-2222-3333-4444-555555555555"
        client_secret = "s3cr3t"

        [records]
        base_url = "https://contoso.crm4.dynamics.com"
        entity_set = "new_expenses"
        principal_fallback = "either"

        [download]
        default_disposition = "attachment"
        default_site_host = "contoso.sharepoint.com"
        default_site_path = "/sites/finance"
    "#;

    #[test]
    fn test_valid_config_loads() {
        let config = extract(VALID);

        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.records.entity_set, "new_expenses");
        assert_eq!(config.records.principal_fallback, PrincipalFallback::Either);
        assert_eq!(config.download.default_disposition, DispositionMode::Attachment);
        assert_eq!(config.download.default_site_host.as_deref(), Some("contoso.sharepoint.com"));
        assert_eq!(config.graph.record_field, "CrmExpenseId");
        assert_eq!(config.records.scope(), "https://contoso.crm4.dynamics.com/.default");
    }

    #[test]
    fn test_invalid_port_rejected() {
        let config = extract(&VALID.replace("port = 8080", "port = 80"));
        let validation = config.validate();
        assert!(validation.is_err());
        assert!(validation.unwrap_err().to_string().contains("port"));
    }

    #[test]
    fn test_validation_catches_invalid_bind() {
        let config = extract(&VALID.replace("bind = \"0.0.0.0\"", "bind = \"invalid-ip-address\""));
        let validation = config.validate();
        assert!(validation.is_err());
        assert!(validation.unwrap_err().to_string().contains("bind"));
    }

    #[test]
    fn test_cors_origins_validated() {
        let config = extract(&VALID.replace(
            "bind = \"0.0.0.0\"",
            "bind = \"0.0.0.0\"\n        cors_allowed_origins = [\"https://portal.contoso.com\"]",
        ));
        assert!(config.validate().is_ok());
        assert_eq!(config.server.cors_allowed_origins, vec!["https://portal.contoso.com"]);

        let config = extract(&VALID.replace(
            "bind = \"0.0.0.0\"",
            "bind = \"0.0.0.0\"\n        cors_allowed_origins = [\"*\"]",
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_record_store_url_required() {
        let config = extract(&VALID.replace(
            "base_url = \"https://contoso.crm4.dynamics.com\"",
            "base_url = \"\"",
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_values() {
        let config = extract("");

        assert!(config.server.port >= 1024);
        assert!(!config.credentials.use_managed_identity);
        assert_eq!(config.graph.base_url, "https://graph.microsoft.com/v1.0");
        assert_eq!(config.records.api_path, "/api/data/v9.2");
        assert_eq!(config.records.principal_fallback, PrincipalFallback::DomainName);
        assert_eq!(config.download.default_disposition, DispositionMode::Inline);
        assert!(config.http.timeout_seconds.is_none());
    }

    #[test]
    fn test_client_secret_strategy_requires_all_fields() {
        let config = extract(&VALID.replace("client_secret = \"s3cr3t\"", ""));
        let result = config.credentials.strategy();
        assert!(matches!(result, Err(crate::error::AppError::Config(_))));
    }

    #[test]
    fn test_strategy_selection() {
        let config = extract(VALID);
        match config.credentials.strategy().unwrap() {
            CredentialStrategy::ClientSecret { tenant_id, authority_host, .. } => {
                assert_eq!(tenant_id, "contoso.onmicrosoft.com");
                assert_eq!(authority_host, "https://login.microsoftonline.com");
            }
            other => panic!("unexpected strategy {:?}", other),
        }

        let managed = extract("[credentials]\nuse_managed_identity = true");
        assert_eq!(
            managed.credentials.strategy().unwrap(),
            CredentialStrategy::ManagedIdentity { client_id: None }
        );
    }

    #[test]
    fn test_client_secret_is_default_strategy() {
        let config = extract(r#"
            [credentials]
            tenant_id = "contoso.onmicrosoft.com"
            client_id = "11111111-2222-3333-4444-555555555555"
            client_secret = "s3cr3t"
        "#);

        assert!(matches!(
            config.credentials.strategy().unwrap(),
            CredentialStrategy::ClientSecret { .. }
        ));
        assert!(matches!(
            CredentialsConfig::default().strategy(),
            Err(crate::error::AppError::Config(_))
        ));
    }

    #[test]
    fn test_debug_output_hides_secret() {
        let config = extract(VALID);
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("s3cr3t"));
        let strategy = format!("{:?}", config.credentials.strategy().unwrap());
        assert!(!strategy.contains("s3cr3t"));
    }

    #[test]
    fn test_config_hierarchy() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("proxy.toml", r#"
                [server]
                port = 8080

                [records]
                base_url = "https://from-file.crm.dynamics.com"
                entity_set = "new_expenses"
            "#)?;
            jail.set_env("APP_SERVER__PORT", "3000");
            jail.set_env("DATAVERSE_URL", "https://from-legacy-env.crm.dynamics.com");
            jail.set_env("USE_MANAGED_IDENTITY", "true");

            let cli = Cli {
                config: Some("proxy.toml".into()),
                port: None,
                environment: Some("Staging".to_string()),
                debug: true,
            };
            let config = load_config(&cli).expect("Should merge configs");

            // Env var beats the file, legacy names land on nested keys
            assert_eq!(config.server.port, 3000);
            assert_eq!(config.records.base_url, "https://from-legacy-env.crm.dynamics.com");
            assert_eq!(config.logging.level, "debug");
            assert!(matches!(config.environment, Environment::Staging));
            assert!(config.credentials.use_managed_identity);

            let cli = Cli { port: Some(9443), ..cli };
            let config = load_config(&cli).expect("Should merge configs");
            assert_eq!(config.server.port, 9443);
            Ok(())
        });
    }
}
