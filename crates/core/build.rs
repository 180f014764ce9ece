use std::env;
use std::process::Command;

// Trait objects are not ABI-stable across compilers, so plugins record the
// rustc that built them and the loader refuses a mismatch.
fn main() {
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=MEDIAPLUG_RUSTC_VERSION={version}");
    println!("cargo:rerun-if-env-changed=RUSTC");
}
