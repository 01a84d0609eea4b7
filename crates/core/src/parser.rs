// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Extension to parser fallback, used when a forced format hits a buffer the
//! daemon did not claim.

/// Parser for a file extension (with or without the leading dot).
pub fn parser_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.strip_prefix('.').unwrap_or(ext).to_ascii_lowercase();
    let parser = match ext.as_str() {
        "js" | "jsx" | "mjs" | "cjs" => "babel",
        "ts" | "tsx" | "mts" | "cts" => "typescript",
        "json" | "jsonc" | "json5" => "json",
        "css" | "pcss" | "postcss" => "css",
        "scss" => "scss",
        "less" => "less",
        "html" | "htm" | "xhtml" => "html",
        "vue" => "vue",
        "svelte" => "svelte",
        "md" | "markdown" => "markdown",
        "mdx" => "mdx",
        "yaml" | "yml" => "yaml",
        "graphql" | "gql" => "graphql",
        "hbs" | "handlebars" => "glimmer",
        _ => return None,
    };
    Some(parser)
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
