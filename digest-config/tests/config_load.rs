use digest_config::{BackendConfig, DigestConfigLoader};
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

const FILE_YAML: &str = r#"
backend:
  kind: twitterapi_io
  api_key: "${TWITTERAPI_IO_KEY}"
  seed_handle: "jack"
digest:
  days: 2
  max_accounts: 30
  timezone: "Europe/Prague"
pacing:
  batch_cooldown_ms: 0
email:
  resend_api_key: "${RESEND_API_KEY}"
  from: "Digest <digest@example.com>"
  to: "ops@example.com"
"#;

#[test]
#[serial]
fn file_with_env_placeholders() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "digest.yaml", FILE_YAML);

    temp_env::with_vars(
        [
            ("TWITTERAPI_IO_KEY", Some("io-key")),
            ("RESEND_API_KEY", Some("re-key")),
        ],
        || {
            let cfg = DigestConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load config");

            cfg.validate().expect("complete config");
            assert_eq!(
                cfg.backend,
                BackendConfig::TwitterapiIo {
                    api_key: "io-key".into(),
                    seed_handle: "jack".into(),
                    base_url: digest_config::DEFAULT_TWITTERAPI_IO_BASE.into(),
                }
            );
            assert_eq!(cfg.digest.days, 2);
            assert_eq!(cfg.digest.max_accounts, 30);
            assert_eq!(cfg.digest.timezone, "Europe/Prague");
            assert_eq!(cfg.pacing.batch_cooldown_ms, 0);
            assert_eq!(cfg.pacing.page_cooldown_ms, 2000);
            assert_eq!(cfg.http.max_attempts, 5);
            assert_eq!(cfg.operator_email(), Some("ops@example.com"));
            assert_eq!(cfg.public_base_url(), None);
        },
    );
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "digest.yaml", FILE_YAML);

    temp_env::with_vars(
        [
            ("TWITTERAPI_IO_KEY", Some("io-key")),
            ("RESEND_API_KEY", Some("re-key")),
            ("DIGEST__DIGEST__MAX_ACCOUNTS", Some("12")),
            ("DIGEST__EMAIL__TO", Some("other@example.com")),
        ],
        || {
            let cfg = DigestConfigLoader::new().with_file(&p).load().unwrap();
            assert_eq!(cfg.digest.max_accounts, 12);
            assert_eq!(cfg.operator_email(), Some("other@example.com"));
        },
    );
}

#[test]
#[serial]
fn missing_secrets_are_all_reported() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "digest.yaml", FILE_YAML);

    temp_env::with_vars_unset(["TWITTERAPI_IO_KEY", "RESEND_API_KEY"], || {
        let cfg = DigestConfigLoader::new().with_file(&p).load().unwrap();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("backend.api_key"), "{err}");
        assert!(err.contains("email.resend_api_key"), "{err}");
        assert!(!err.contains("backend.seed_handle"), "{err}");
    });
}

#[test]
#[serial]
fn optional_file_may_be_absent() {
    let tmp = TempDir::new().unwrap();
    let cfg = DigestConfigLoader::new()
        .without_env()
        .with_optional_file(tmp.path().join("nope.yaml"))
        .with_yaml_str(
            "backend:\n  kind: x_api\n  bearer_token: b\n  handles_file: handles.txt\n",
        )
        .load()
        .expect("inline config is enough");
    match cfg.backend {
        BackendConfig::XApi { handles_file, .. } => {
            assert_eq!(handles_file, PathBuf::from("handles.txt"))
        }
        other => panic!("unexpected backend {other:?}"),
    }
}
