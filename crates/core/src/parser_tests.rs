// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    js = { ".js", Some("babel") },
    bare_ts = { "ts", Some("typescript") },
    upper_md = { ".MD", Some("markdown") },
    yml = { ".yml", Some("yaml") },
    svelte = { ".svelte", Some("svelte") },
    rb = { ".rb", None },
    empty = { "", None },
)]
fn parser_lookup(ext: &str, expected: Option<&str>) {
    assert_eq!(parser_for_extension(ext), expected);
}
