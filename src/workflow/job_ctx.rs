//! 任务处理上下文
//!
//! 封装"我正在用哪个工具处理第几个任务"这一信息

use std::fmt::Display;

use crate::models::ToolKind;

/// 任务处理上下文
///
/// 只用于日志前缀和输出命名
#[derive(Debug, Clone)]
pub struct JobCtx {
    /// 处理工具
    pub tool: ToolKind,

    /// 任务索引（仅用于日志显示）
    pub job_index: usize,

    /// 任务名称（源文件名或描述文件中的 name）
    pub label: String,
}

impl JobCtx {
    /// 创建新的任务上下文
    pub fn new(tool: ToolKind, job_index: usize, label: impl Into<String>) -> Self {
        Self {
            tool,
            job_index,
            label: label.into(),
        }
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[工具 {} #{} {}]", self.tool, self.job_index, self.label)
    }
}
