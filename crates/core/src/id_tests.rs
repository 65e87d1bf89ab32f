// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn label_display() {
    let label = JobLabel::new("sshd");
    assert_eq!(label.to_string(), "sshd");
}

#[test]
fn label_equality() {
    let a = JobLabel::new("web");
    let b = JobLabel::new("web");
    let c = JobLabel::new("db");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a, "web");
}

#[test]
fn label_orders_lexicographically() {
    let mut labels = vec![
        JobLabel::new("web"),
        JobLabel::new("db"),
        JobLabel::new("cache"),
    ];
    labels.sort();
    assert_eq!(labels, vec!["cache", "db", "web"]);
}

#[test]
fn label_serde() {
    let label = JobLabel::new("my-job");
    let json = serde_json::to_string(&label).unwrap();
    assert_eq!(json, "\"my-job\"");

    let parsed: JobLabel = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, label);
}

#[test]
fn row_id_round_trip() {
    let row = RowId::from(42);
    assert_eq!(row.as_i64(), 42);
    assert_eq!(row.to_string(), "42");
}

#[test]
fn pid_round_trip() {
    let pid = Pid::from(1234);
    assert_eq!(pid.as_i32(), 1234);
    assert_eq!(pid.to_string(), "1234");
}
