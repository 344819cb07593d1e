// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Stamps `GATEWAY_VERSION` into the binary. Release pipelines replace the
//! patch segment through `GATEWAY_PATCH_VERSION`.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-env-changed=GATEWAY_PATCH_VERSION");

    let version = env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let patch = env::var("GATEWAY_PATCH_VERSION").ok();

    let stamped = match (version.rsplit_once('.'), patch.as_deref().map(str::trim)) {
        (Some((major_minor, _)), Some(patch)) if !patch.is_empty() => format!("{major_minor}.{patch}"),
        _ => version,
    };

    println!("cargo:rustc-env=GATEWAY_VERSION={stamped}");
}
