fn main() {
    // Stamp the build date so `printbridge --version` can report it
    let build_date = chrono::Utc::now().format("%Y-%m-%d").to_string();
    println!("cargo:rustc-env=PRINTBRIDGE_BUILD_DATE={}", build_date);
    println!("cargo:rerun-if-changed=build.rs");
}
