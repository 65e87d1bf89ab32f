// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn styled_header_wraps_with_bold_underline() {
    assert_eq!(styled("JobID"), "\x1b[1m\x1b[4mJobID\x1b[0m");
}
