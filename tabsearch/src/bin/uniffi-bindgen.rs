//! Generate foreign-language bindings for tabsearch
//!
//! Run: cargo run --bin uniffi-bindgen -- generate --library target/release/libtabsearch.so --language kotlin --out-dir bindings

fn main() {
    uniffi::uniffi_bindgen_main()
}
