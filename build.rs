fn main() {
    // Bakes version and git metadata into OUT_DIR/built.rs for lib.rs to include.
    if let Err(err) = built::write_built_file() {
        println!("cargo:warning=failed to write build metadata: {err}");
    }
}
