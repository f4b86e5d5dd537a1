//! Stack trace capture for the `/stacktrace` label.
//!
//! Cloud Trace expects a JSON document of the form
//! `{"stack_frame": [{"method_name", "file_name", "line_number"}]}`.

use serde::Serialize;

/// Frames beyond this are dropped.
const MAX_FRAMES: usize = 64;

#[derive(Debug, Serialize)]
struct StackTrace {
    stack_frame: Vec<StackFrame>,
}

#[derive(Debug, Serialize)]
struct StackFrame {
    method_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line_number: Option<u32>,
}

/// Capture the current call stack as a Cloud Trace stack JSON document.
pub fn capture_stack() -> String {
    let backtrace = backtrace::Backtrace::new();
    let mut frames = Vec::new();

    'outer: for frame in backtrace.frames() {
        let symbols = frame.symbols();
        if symbols.is_empty() {
            frames.push(StackFrame {
                method_name: format!("{:?}", frame.ip()),
                file_name: None,
                line_number: None,
            });
        }
        for symbol in symbols {
            if frames.len() >= MAX_FRAMES {
                break 'outer;
            }
            frames.push(StackFrame {
                method_name: symbol
                    .name()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "<unknown>".to_string()),
                file_name: symbol.filename().map(|p| p.display().to_string()),
                line_number: symbol.lineno(),
            });
        }
        if frames.len() >= MAX_FRAMES {
            break;
        }
    }

    serde_json::to_string(&StackTrace {
        stack_frame: frames,
    })
    .unwrap_or_else(|_| r#"{"stack_frame":[]}"#.to_string())
}
