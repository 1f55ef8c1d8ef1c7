//! CLI tests: argument handling, config layering and a full run against a
//! mock avatars API.

use clap::Parser;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use avatar_sheet::cli::{execute, Cli, CliError};
use avatar_sheet::models::Manifest;

fn avatar_base64() -> String {
    use base64::Engine;
    let img = image::RgbaImage::from_pixel(40, 40, image::Rgba([12, 34, 56, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img).write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
    base64::engine::general_purpose::STANDARD.encode(out.into_inner())
}

#[test]
fn test_full_run_through_cli() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/2021/avatars"))
            .and(query_param("page", "1"))
            // base64("me:secret")
            .and(header("Authorization", "Basic bWU6c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "teams": [{"teamNumber": 254, "encodedAvatar": avatar_base64()}],
                "pageTotal": 1
            })))
            .expect(1)
            .mount(&server),
    );

    let work = TempDir::new().unwrap();
    let data = work.path().join("data");
    let out = work.path().join("out");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("teams.json"), r#"[{"team_number":254,"lat":37.3,"lng":-121.9}]"#).unwrap();

    let key_file = work.path().join("FRC_API_KEY");
    fs::write(&key_file, "me:secret").unwrap();
    let year_file = work.path().join("YEAR");
    fs::write(&year_file, "2021\n").unwrap();

    let config = work.path().join("avatars.toml");
    fs::write(
        &config,
        format!(
            "[api]\nbase_url = \"{}\"\nkey_file = \"{}\"\nyear_file = \"{}\"\n",
            server.uri(),
            key_file.display(),
            year_file.display()
        ),
    )
    .unwrap();

    let cli = Cli::try_parse_from([
        "avatar-sheet",
        data.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "--out-dir",
        out.to_str().unwrap(),
    ])
    .unwrap();

    let summary = execute(&cli).unwrap();
    assert_eq!(summary.downloaded, 1);
    assert!(summary.written);

    let manifest: Manifest = serde_json::from_str(&fs::read_to_string(out.join("avatars.json")).unwrap()).unwrap();
    assert_eq!(manifest.sheet_size, 1);
    assert!(manifest.locations.contains(254));

    let sheet = image::open(out.join("avatars.png")).unwrap().to_rgba8();
    assert_eq!(sheet.dimensions(), (42, 42));
    assert_eq!(*sheet.get_pixel(10, 10), image::Rgba([12, 34, 56, 255]));

    drop(server);
}

#[test]
fn test_bad_config_is_invalid_args() {
    let work = TempDir::new().unwrap();
    let config = work.path().join("avatars.toml");
    fs::write(&config, "[api]\nbase_url = \"not a url\"\n").unwrap();

    let cli =
        Cli::try_parse_from(["avatar-sheet", work.path().to_str().unwrap(), "--config", config.to_str().unwrap()])
            .unwrap();

    let err = execute(&cli).unwrap_err();
    assert!(matches!(err, CliError::Config(_)));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_missing_teams_file_is_run_failure() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());

    let work = TempDir::new().unwrap();
    let key_file = work.path().join("FRC_API_KEY");
    fs::write(&key_file, "k").unwrap();
    let config = work.path().join("avatars.toml");
    fs::write(&config, "").unwrap();

    let cli = Cli::try_parse_from([
        "avatar-sheet",
        work.path().to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "--key-file",
        key_file.to_str().unwrap(),
        "--year",
        "2024",
        "--api-url",
        &server.uri(),
    ])
    .unwrap();

    let err = execute(&cli).unwrap_err();
    assert!(matches!(err, CliError::Run(_)));
    assert_eq!(err.exit_code(), 1);
}
