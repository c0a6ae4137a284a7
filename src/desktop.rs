//! Cross-platform desktop notification delivery.
//!
//! Abstracts over:
//! - **macOS**: `osascript` AppleScript `display notification` command
//! - **Windows / Linux**: the `notify_rust` crate
//!
//! Both paths are fire-and-forget: failures are logged as warnings and the
//! function always returns normally, so the local-notification channel can
//! never interfere with the watch loop.

/// Escape a string for safe embedding inside an AppleScript double-quoted
/// string.
///
/// Backslashes must be escaped *first* so the subsequent replacements do not
/// double-escape them.
#[cfg(target_os = "macos")]
fn escape_for_applescript(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Deliver a native desktop notification.
///
/// `timeout_ms` controls how long the notification is displayed on
/// non-macOS platforms; macOS ignores it (the OS controls duration).
pub fn deliver(title: &str, message: &str, timeout_ms: u32) {
    let title = if title.is_empty() {
        "Pickup Watch"
    } else {
        title
    };

    #[cfg(not(target_os = "macos"))]
    {
        use notify_rust::Notification;
        if let Err(e) = Notification::new()
            .summary(title)
            .body(message)
            .timeout(notify_rust::Timeout::Milliseconds(timeout_ms))
            .show()
        {
            log::warn!("Failed to send desktop notification: {}", e);
        }
    }

    #[cfg(target_os = "macos")]
    {
        let _ = timeout_ms;
        let script = format!(
            r#"display notification "{}" with title "{}""#,
            escape_for_applescript(message),
            escape_for_applescript(title),
        );
        if let Err(e) = std::process::Command::new("osascript")
            .arg("-e")
            .arg(&script)
            .output()
        {
            log::warn!("Failed to send macOS desktop notification: {}", e);
        }
    }
}

#[cfg(all(test, target_os = "macos"))]
mod tests {
    use super::*;

    #[test]
    fn test_applescript_escaping() {
        assert_eq!(escape_for_applescript(r#"a"b"#), r#"a\"b"#);
        assert_eq!(escape_for_applescript(r"a\b"), r"a\\b");
        assert_eq!(escape_for_applescript("a\nb"), r"a\nb");
    }
}
