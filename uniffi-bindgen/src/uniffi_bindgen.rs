//! Generates the foreign-language bindings for `securestore-core`.
//!
//! ```text
//! cargo run -p uniffi-bindgen -- generate --library target/release/libsecurestore_core.so \
//!     --language kotlin --out-dir kotlin/
//! ```

fn main() {
    uniffi::uniffi_bindgen_main();
}
