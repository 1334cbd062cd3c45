use fenris_pa::config::{Backend, DispatchConfig, BACKEND_ENV_VAR, COLLOCATED_ENV_VAR};

#[test]
fn default_config() {
    let config = DispatchConfig::default();
    assert_eq!(config.backend, Backend::Tiled);
    assert!(!config.collocated_gradient);
    assert!(config.runtime_fallback);
    assert_eq!(config.batch_size, None);
}

#[test]
fn backend_parses_case_insensitively() {
    assert_eq!("generic".parse::<Backend>().unwrap(), Backend::Generic);
    assert_eq!(" Tiled ".parse::<Backend>().unwrap(), Backend::Tiled);
    assert_eq!("ACCELERATED".parse::<Backend>().unwrap(), Backend::Accelerated);
    assert!("gpu".parse::<Backend>().is_err());

    for backend in [Backend::Generic, Backend::Tiled, Backend::Accelerated] {
        assert_eq!(backend.to_string().parse::<Backend>().unwrap(), backend);
    }
}

#[test]
fn config_from_env_vars() {
    let config = DispatchConfig::from_env_vars([(BACKEND_ENV_VAR, "generic"), (COLLOCATED_ENV_VAR, "on")]);
    assert_eq!(config.backend, Backend::Generic);
    assert!(config.collocated_gradient);
    assert!(config.runtime_fallback);

    let config = DispatchConfig::from_env_vars([(COLLOCATED_ENV_VAR, "0"), ("PATH", "/usr/bin")]);
    assert_eq!(config, DispatchConfig::default());

    // Invalid backends are ignored
    let config = DispatchConfig::from_env_vars([(BACKEND_ENV_VAR, "quantum")]);
    assert_eq!(config.backend, Backend::Tiled);

    let empty: [(String, String); 0] = [];
    assert_eq!(DispatchConfig::from_env_vars(empty), DispatchConfig::default());
}

#[test]
fn config_builders() {
    let config = DispatchConfig::default()
        .with_backend(Backend::Accelerated)
        .with_collocated_gradient(true)
        .with_runtime_fallback(false)
        .with_batch_size(Some(3));
    assert_eq!(
        config,
        DispatchConfig {
            backend: Backend::Accelerated,
            collocated_gradient: true,
            runtime_fallback: false,
            batch_size: Some(3),
        }
    );
}

#[test]
fn config_serde() {
    let config = DispatchConfig::default()
        .with_backend(Backend::Generic)
        .with_batch_size(Some(4));
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"backend\":\"generic\""));
    let parsed: DispatchConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);

    // Missing fields take their default values
    let parsed: DispatchConfig = serde_json::from_str(r#"{ "collocated_gradient": true }"#).unwrap();
    assert_eq!(parsed, DispatchConfig::default().with_collocated_gradient(true));
}
