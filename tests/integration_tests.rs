// tests/integration_tests.rs

use std::fs;
use std::path::Path;

#[test]
fn test_sector_file_parsing() {
    let content = r#"
artcc_id = "ZBW"
departure_airports = ["KBOS"]

[[sectors]]
id = "37"
points = [[-72.0, 41.0], [-70.0, 41.0], [-70.0, 43.0], [-72.0, 43.0]]
"#;

    let mut path = std::env::temp_dir();
    path.push(format!("edst-sync-it-{}.toml", std::process::id()));
    fs::write(&path, content).expect("Failed to write test sector file");

    let file = edst_sync::storage::load_sector_file(&path).expect("sector file parses");
    assert_eq!(file.sectors.len(), 1);
    assert_eq!(file.departure_airports, vec!["KBOS"]);

    fs::remove_file(&path).expect("Failed to clean up test sector file");
}

#[test]
fn test_project_structure() {
    let expected_files = vec![
        "src/main.rs",
        "src/lib.rs",
        "src/derive.rs",
        "src/refresh.rs",
        "src/shared.rs",
        "src/store.rs",
        "src/windows.rs",
        "src/plans.rs",
        "src/config.rs",
        "src/net.rs",
        "Cargo.toml",
        "README.md",
    ];

    for file in expected_files {
        assert!(Path::new(file).exists(), "Expected file {} not found", file);
    }
}

#[test]
fn test_cargo_toml_metadata() {
    let cargo_content = fs::read_to_string("Cargo.toml").expect("Failed to read Cargo.toml");

    assert!(cargo_content.contains("name = \"edst-sync\""), "Missing package name");
    assert!(cargo_content.contains("description ="), "Missing description");
    assert!(cargo_content.contains("license ="), "Missing license");
    assert!(cargo_content.contains("readme ="), "Missing readme");
    assert!(cargo_content.contains("repository ="), "Missing repository");
}

#[test]
fn test_readme_exists_and_complete() {
    let readme_content = fs::read_to_string("README.md").expect("Failed to read README.md");

    let required_sections = vec![
        "# edst-sync",
        "## Features",
        "## Quick Start",
        "## Configuration",
        "## Shared UI State",
        "## Development",
    ];

    for section in required_sections {
        assert!(readme_content.contains(section), "README missing section: {}", section);
    }
}
