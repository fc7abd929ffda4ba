// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#[cfg(unix)]
fn main() {
    println!("cargo:rerun-if-changed=src/crash_info/emit_sicodes.c");
    cc::Build::new()
        .file("src/crash_info/emit_sicodes.c")
        .warnings(true)
        .compile("emit_sicodes");

    // SIGSTKFLT only exists on Linux-likes, and not on every architecture
    // (mirrors where nix exposes it).
    println!("cargo::rustc-check-cfg=cfg(stack_fault_signal)");
    let os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    let linux_like = os == "linux" || os == "android";
    let excluded_arch = arch.starts_with("mips") || arch == "sparc64";
    if linux_like && !excluded_arch {
        println!("cargo:rustc-cfg=stack_fault_signal");
    }
}

#[cfg(not(unix))]
fn main() {
    println!("cargo::rustc-check-cfg=cfg(stack_fault_signal)");
}
