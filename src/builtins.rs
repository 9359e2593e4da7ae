//! Platform builtin tables.
//!
//! The analyzer and the runtime that enforces the policy must agree on the
//! builtin-module list. This snapshot matches Node's `module.builtinModules`;
//! operators extend it through `extra_builtin_modules` in `.capscan.toml`
//! when their runtime exposes more.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;

/// Builtin module specifiers, without the `node:` prefix.
static BUILTIN_MODULES: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    BTreeSet::from([
        "assert",
        "assert/strict",
        "async_hooks",
        "buffer",
        "child_process",
        "cluster",
        "console",
        "constants",
        "crypto",
        "dgram",
        "diagnostics_channel",
        "dns",
        "dns/promises",
        "domain",
        "events",
        "fs",
        "fs/promises",
        "http",
        "http2",
        "https",
        "inspector",
        "inspector/promises",
        "module",
        "net",
        "os",
        "path",
        "path/posix",
        "path/win32",
        "perf_hooks",
        "process",
        "punycode",
        "querystring",
        "readline",
        "readline/promises",
        "repl",
        "stream",
        "stream/consumers",
        "stream/promises",
        "stream/web",
        "string_decoder",
        "sys",
        "timers",
        "timers/promises",
        "tls",
        "trace_events",
        "tty",
        "url",
        "util",
        "util/types",
        "v8",
        "vm",
        "wasi",
        "worker_threads",
        "zlib",
    ])
});

/// Ambient global identifiers a package can reference without importing.
static GLOBAL_NAMES: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    BTreeSet::from([
        "AbortController",
        "AbortSignal",
        "Buffer",
        "MessageChannel",
        "MessageEvent",
        "MessagePort",
        "TextDecoder",
        "TextEncoder",
        "URL",
        "URLSearchParams",
        "WebAssembly",
        "atob",
        "btoa",
        "clearImmediate",
        "clearInterval",
        "clearTimeout",
        "console",
        "crypto",
        "fetch",
        "global",
        "globalThis",
        "navigator",
        "performance",
        "process",
        "queueMicrotask",
        "setImmediate",
        "setInterval",
        "setTimeout",
        "structuredClone",
    ])
});

/// Is `specifier` a builtin module? Accepts both `fs` and `node:fs` forms.
pub fn is_builtin_module(specifier: &str) -> bool {
    let bare = specifier.strip_prefix("node:").unwrap_or(specifier);
    BUILTIN_MODULES.contains(bare)
}

/// Is `name` a known ambient global identifier?
pub fn is_global_name(name: &str) -> bool {
    GLOBAL_NAMES.contains(name)
}
