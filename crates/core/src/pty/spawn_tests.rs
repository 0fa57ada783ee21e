// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::sync::mpsc;

#[tokio::test]
async fn spawns_and_relays_output() {
    let mut backend =
        NativePty::spawn(&["/bin/echo".into(), "hello-pty".into()], 80, 24, &[]).unwrap();

    let (output_tx, mut output_rx) = mpsc::channel(16);
    let (_input_tx, input_rx) = mpsc::channel(16);
    let (_resize_tx, resize_rx) = mpsc::channel(16);

    let status = backend.run(output_tx, input_rx, resize_rx).await.unwrap();
    assert_eq!(status.code, Some(0));

    let mut collected = Vec::new();
    while let Ok(chunk) = output_rx.try_recv() {
        collected.extend_from_slice(&chunk);
    }
    assert!(String::from_utf8_lossy(&collected).contains("hello-pty"));
}

#[tokio::test]
async fn resize_updates_winsize_without_error() {
    let backend = NativePty::spawn(&["/bin/cat".into()], 80, 24, &[]).unwrap();
    backend.resize(100, 40).unwrap();
    assert!(backend.child_pid().is_some());
}
