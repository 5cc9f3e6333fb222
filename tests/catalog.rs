use assert_matches::assert_matches;

use panukb_phewas::catalog::PhenotypeCatalog;
use panukb_phewas::config::{Settings, SettingsLoader};
use panukb_phewas::error::PhewasError;

#[test]
fn load_manifest_from_disk() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("panukb-manifest.csv");
    std::fs::write(
        &path,
        "trait_type,phenocode,pheno_sex,coding,modifier,description,aws_link,aws_link_tabix\n\
         continuous,50,both_sexes,,irnt,Standing height,https://h/continuous-50.tsv.bgz,https://h/continuous-50.tsv.bgz.tbi\n\
         icd10,J45,both_sexes,,,\"Asthma, unspecified\",https://h/icd10-J45.tsv.bgz,\n",
    )
    .unwrap();

    let catalog = PhenotypeCatalog::from_path(&path).unwrap();
    assert_eq!(catalog.len(), 2);
    let asthma = catalog.get(&"J45".parse().unwrap()).unwrap();
    assert_eq!(asthma.trait_type, "icd10");
    assert_eq!(asthma.description, "Asthma, unspecified");
    assert_eq!(asthma.remote_link, "https://h/icd10-J45.tsv.bgz");
    assert_eq!(asthma.index_link, None);
}

#[test]
fn missing_manifest_is_reported_with_path() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.csv");
    assert_matches!(
        PhenotypeCatalog::from_path(&path),
        Err(PhewasError::ManifestRead(p)) if p == path
    );
}

#[test]
fn settings_file_overrides_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("panukb-phewas.json");
    std::fs::write(
        &path,
        r#"{"concurrency": 8, "fetch_timeout_secs": 30, "index_dir": "/data/tbi"}"#,
    )
    .unwrap();

    let settings = SettingsLoader::resolve(path.to_str()).unwrap();
    assert_eq!(settings.concurrency, 8);
    assert_eq!(settings.fetch_timeout_secs, 30);
    assert_eq!(settings.index_dir.as_deref(), Some(std::path::Path::new("/data/tbi")));
    assert_eq!(settings.http_timeout_secs, Settings::default().http_timeout_secs);
}

#[test]
fn explicit_settings_path_must_exist() {
    assert_matches!(
        SettingsLoader::resolve(Some("/nonexistent/panukb-phewas.json")),
        Err(PhewasError::ConfigRead(_))
    );
}
