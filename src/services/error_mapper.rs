//! 错误文案映射
//!
//! 把后端原始错误文本翻译成给用户看的提示。纯函数，不会失败：
//! 没有规则命中时原样返回。

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::JobError;

/// 轮询超时的统一提示，和后端明确失败区分开（建议重试而不是改参数）
pub const TIMEOUT_MESSAGE: &str =
    "Processing is taking longer than expected. Please try again in a moment.";

/// 原始文本为空时的兜底提示
pub const GENERIC_MESSAGE: &str =
    "Something went wrong while processing your file. Please try again.";

struct Rule {
    pattern: Regex,
    render: fn(&Captures) -> String,
}

fn rule(pattern: &str, render: fn(&Captures) -> String) -> Rule {
    Rule {
        // 规则都是字面量，编译失败只可能是代码错误
        pattern: Regex::new(pattern).expect("invalid error-mapper pattern"),
        render,
    }
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(
            r"(?i)\b([a-z_][a-z _]*?)\s+must be between\s+(-?\d+(?:\.\d+)?)\s+and\s+(-?\d+(?:\.\d+)?)",
            |c| {
                format!(
                    "{} is out of range. Please choose a value between {} and {}.",
                    param_label(&c[1]),
                    &c[2],
                    &c[3]
                )
            },
        ),
        rule(
            r"(?i)\b([a-z_]+)\s+must be (?:at least|greater than or equal to|>=)\s*(-?\d+(?:\.\d+)?)",
            |c| format!("{} must be at least {}.", param_label(&c[1]), &c[2]),
        ),
        rule(
            r"(?i)\b([a-z_]+)\s+must be (?:at most|less than or equal to|<=)\s*(-?\d+(?:\.\d+)?)",
            |c| format!("{} must be at most {}.", param_label(&c[1]), &c[2]),
        ),
        rule(
            r"(?i)(invalid segments?|malformed segments?|segments? (?:list )?(?:is|are) (?:invalid|malformed))",
            |_| {
                "The segment list is invalid. Use start-end pairs (for example 0-2.5) \
                 where each start is before its end."
                    .to_string()
            },
        ),
        rule(
            r"(?i)crop (?:area|region|box).*(?:outside|exceeds|out of bounds)",
            |_| "The crop area extends outside the image. Please adjust the selection.".to_string(),
        ),
        rule(
            r"(?i)(file too large|file size exceeds|payload too large|request entity too large)",
            |_| "The file is too large. Please upload a smaller file.".to_string(),
        ),
        rule(
            r"(?i)(unsupported (?:file )?(?:format|type)|not a valid gif|cannot identify image)",
            |_| {
                "This file format is not supported. Please upload a GIF, image or video file."
                    .to_string()
            },
        ),
        rule(
            r"(?i)(failed to (?:download|fetch)(?: the)? (?:url|file from url)|invalid url|url is not reachable)",
            |_| {
                "We couldn't download a file from that URL. Please check the link and try again."
                    .to_string()
            },
        ),
        rule(r"(?i)no (?:file|image|video) (?:provided|uploaded)", |_| {
            "Please upload a file first.".to_string()
        }),
        rule(r"(?i)(too many frames|frame limit)", |_| {
            "This GIF has too many frames to process. Try trimming it first.".to_string()
        }),
    ]
});

/// `font_size` → `Font size`
fn param_label(raw: &str) -> String {
    let words = raw.trim().replace('_', " ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 错误文案映射器
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorMapper;

impl ErrorMapper {
    /// 映射后端原始错误文本
    pub fn map(raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return GENERIC_MESSAGE.to_string();
        }

        RULES
            .iter()
            .find_map(|rule| rule.pattern.captures(trimmed).map(|c| (rule.render)(&c)))
            .unwrap_or_else(|| raw.to_string())
    }

    /// 工作流边界使用：任务错误 → 界面提示；取消不产生提示
    pub fn user_message(error: &JobError) -> Option<String> {
        match error {
            JobError::Cancelled => None,
            JobError::PollTimeout { .. } => Some(TIMEOUT_MESSAGE.to_string()),
            other => Some(Self::map(other.raw_message().unwrap_or_default())),
        }
    }
}
