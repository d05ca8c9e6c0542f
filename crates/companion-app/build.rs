use std::fs;
use std::path::{Path, PathBuf};

fn workspace_version_file() -> PathBuf {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("manifest dir"));
    manifest_dir
        .ancestors()
        .nth(2)
        .expect("workspace root above crates/<name>")
        .join("VERSION")
}

fn read_version(path: &Path) -> String {
    let raw = fs::read_to_string(path).expect("read VERSION file");
    let version = raw.trim();
    assert!(
        !version.is_empty() && !version.contains(char::is_whitespace),
        "VERSION file must hold a single non-empty version"
    );
    version.to_string()
}

fn main() {
    let version_path = workspace_version_file();
    println!("cargo:rerun-if-changed={}", version_path.display());

    let version = read_version(&version_path);
    println!("cargo:rustc-env=COMPANION_ADMIN_VERSION={version}");
}
